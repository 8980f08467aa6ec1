// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Coaching Server - role-based access gateway for the multi-tenant
//! health-coaching application.
//!
//! Clinics (tenants) employ coaches who work with clients; platform staff
//! administer the whole system. This crate decides who the signed-in user
//! is and which views they may open.
//!
//! ## Modules
//!
//! - `auth` - Roles, identities and the role resolver
//! - `session` - Session state per browser session, recovered from the backend
//! - `guard` - Route guard for every view navigation
//! - `provider` - Auth and profile backends (hosted REST or in-memory)
//! - `audit` - Security event trail
//! - `api` - HTTP API handlers (Axum)

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod provider;
pub mod session;
pub mod state;
pub mod telemetry;
