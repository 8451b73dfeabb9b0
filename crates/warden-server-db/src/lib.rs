// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite storage for Warden.
//!
//! Each table group has a `*Store` trait and a `*Repository` implementing it
//! over a [`SqlitePool`]. Handlers depend on the concrete repositories; the
//! traits exist so callers can substitute their own storage.

pub mod audit;
pub mod error;
pub mod pool;
pub mod registration;
pub mod role;
pub mod testing;
mod time;
pub mod user;

pub use audit::{AuditQuery, AuditRepository, AuditStore};
pub use error::{DbError, Result};
pub use pool::{create_pool, ping};
pub use registration::{RegistrationAttemptRepository, RegistrationAttemptStore};
pub use role::{RoleRepository, RoleStore, SeedReport};
pub use user::{NewUser, UserRepository, UserStore, UserUpdate};

use sqlx::sqlite::SqlitePool;

const MIGRATIONS: &[(&str, &str)] = &[
	(
		"001_users_roles_permissions",
		include_str!("../migrations/001_users_roles_permissions.sql"),
	),
	(
		"002_registration_attempts",
		include_str!("../migrations/002_registration_attempts.sql"),
	),
	("003_audit_logs", include_str!("../migrations/003_audit_logs.sql")),
];

/// Applies every migration. Statements are idempotent, so this runs on each start.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	for (name, sql) in MIGRATIONS {
		for statement in sql.split(';') {
			let statement = statement.trim();
			if statement.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with("--")) {
				continue;
			}
			sqlx::query(statement).execute(pool).await?;
		}
		tracing::debug!(migration = name, "migration applied");
	}
	Ok(())
}
