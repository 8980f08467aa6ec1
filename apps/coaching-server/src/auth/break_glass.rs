// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Break-glass demo identities.
//!
//! A handful of reserved demo emails override whatever role their profile
//! row says. This is a demo/test-only path: the server only loads it when
//! built with the `demo-accounts` feature and `DEMO_ACCOUNTS=true`.

use std::collections::HashSet;

/// Reserved demo client address.
pub const DEMO_CLIENT_EMAIL: &str = "demo.client@example.com";

/// Reserved demo system-admin address.
pub const DEMO_ADMIN_EMAIL: &str = "demo.admin@example.com";

/// How a break-glass email overrides normal role resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakGlassKind {
    /// Always treated as a client, whatever the stored role.
    DemoClient,
    /// Always granted.
    DemoAdmin,
}

/// Reserved demo emails, matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct BreakGlass {
    client_emails: HashSet<String>,
    admin_emails: HashSet<String>,
}

impl BreakGlass {
    pub fn new<C, A>(client_emails: C, admin_emails: A) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        Self {
            client_emails: client_emails.into_iter().map(normalize).collect(),
            admin_emails: admin_emails.into_iter().map(normalize).collect(),
        }
    }

    /// The stock demo accounts.
    pub fn demo_defaults() -> Self {
        Self::new([DEMO_CLIENT_EMAIL], [DEMO_ADMIN_EMAIL])
    }

    /// Classify an email. Client addresses are checked first.
    pub fn classify(&self, email: &str) -> Option<BreakGlassKind> {
        let email = normalize(email);
        if self.client_emails.contains(&email) {
            Some(BreakGlassKind::DemoClient)
        } else if self.admin_emails.contains(&email) {
            Some(BreakGlassKind::DemoAdmin)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.client_emails.is_empty() && self.admin_emails.is_empty()
    }
}

fn normalize(email: impl AsRef<str>) -> String {
    email.as_ref().trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_case_insensitive() {
        let bg = BreakGlass::demo_defaults();
        assert_eq!(bg.classify("Demo.Admin@Example.com"), Some(BreakGlassKind::DemoAdmin));
        assert_eq!(bg.classify(" demo.client@example.com"), Some(BreakGlassKind::DemoClient));
        assert_eq!(bg.classify("someone@example.com"), None);
    }

    #[test]
    fn client_list_wins_when_an_email_is_in_both() {
        let bg = BreakGlass::new(["x@example.com"], ["x@example.com"]);
        assert_eq!(bg.classify("x@example.com"), Some(BreakGlassKind::DemoClient));
    }

    #[test]
    fn default_is_empty() {
        let bg = BreakGlass::default();
        assert!(bg.is_empty());
        assert_eq!(bg.classify(DEMO_ADMIN_EMAIL), None);
    }
}
