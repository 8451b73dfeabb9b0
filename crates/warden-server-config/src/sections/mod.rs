// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each has a partial `*ConfigLayer` and a resolved form.

mod auth;
mod database;
mod http;
mod logging;
mod password;
mod rate_limit;
mod rbac;

pub use auth::{AuthConfig, AuthConfigLayer, PRODUCTION_ENVIRONMENT};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use password::PasswordConfigLayer;
pub use rate_limit::RateLimitConfigLayer;
pub use rbac::RbacConfigLayer;
