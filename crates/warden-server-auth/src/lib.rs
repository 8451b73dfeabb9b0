// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication and role-based authorization for Warden.
//!
//! - [`password`]: complexity policy and Argon2 hashing
//! - [`token`]: HMAC-signed access tokens (issue, decode, refresh)
//! - [`rbac`]: permission/role catalog and effective-permission resolution
//! - [`rate_limit`]: registration sliding-window state machine
//! - [`gate`]: permission, role and self-or-superuser checks
//! - [`middleware`]: request-scoped [`AuthContext`] and bearer extraction
//! - [`audit`]: audit log entries
//!
//! Storage lives in `warden-server-db`; HTTP wiring in `warden-server`.

pub mod argon2_config;
pub mod audit;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod rbac;
pub mod token;
pub mod types;
pub mod user;

pub use argon2_config::HasherParams;
pub use audit::{AuditEventType, AuditLogBuilder, AuditLogEntry};
pub use error::AuthError;
pub use gate::{authorize, check_can_update_user, PrivilegedChanges, Requirement};
pub use middleware::{extract_bearer_token, AuthContext, CurrentUser};
pub use password::{PasswordHasher, PasswordPolicy, PolicyViolation};
pub use rate_limit::{AttemptRecord, RateLimitDecision, RateLimitPolicy, WindowState};
pub use rbac::{
	effective_permissions, CatalogError, PermissionDef, RbacCatalog, Role, RoleDef, ADMIN_ROLE,
	AUTH_PERMISSION, DEFAULT_ROLE,
};
pub use token::{token_fingerprint, Claims, SigningAlgorithm, TokenService, TOKEN_TYPE_BEARER};
pub use types::{AuditLogId, UserId};
pub use user::{validate_email, validate_username, User, UserProfile};
