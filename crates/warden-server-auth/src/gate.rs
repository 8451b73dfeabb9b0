// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization decisions over an already-authenticated user.
//!
//! Authentication failures are 401 and never originate here. Every function
//! in this module assumes a resolved identity and answers with
//! `Ok(())` or a 403-class [`AuthError`].

use std::fmt;

use crate::error::AuthError;
use crate::types::UserId;
use crate::user::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
	Permission(String),
	Role(String),
}

impl Requirement {
	pub fn permission(name: impl Into<String>) -> Self {
		Requirement::Permission(name.into())
	}

	pub fn role(name: impl Into<String>) -> Self {
		Requirement::Role(name.into())
	}
}

impl fmt::Display for Requirement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Requirement::Permission(p) => write!(f, "permission:{p}"),
			Requirement::Role(r) => write!(f, "role:{r}"),
		}
	}
}

/// Checks `user` against a permission or role requirement.
pub fn authorize(user: &User, requirement: &Requirement) -> Result<(), AuthError> {
	let allowed = match requirement {
		Requirement::Permission(p) => user.has_permission(p),
		Requirement::Role(r) => user.has_role(r),
	};
	if allowed {
		return Ok(());
	}

	tracing::info!(
		user_id = %user.id,
		requirement = %requirement,
		"authorization denied"
	);
	Err(match requirement {
		Requirement::Permission(p) => AuthError::MissingPermission(p.clone()),
		Requirement::Role(r) => AuthError::MissingRole(r.clone()),
	})
}

/// Fields of an update that only a superuser may touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrivilegedChanges {
	pub roles: bool,
	pub is_active: bool,
	pub is_superuser: bool,
}

impl PrivilegedChanges {
	pub fn any(&self) -> bool {
		self.roles || self.is_active || self.is_superuser
	}
}

/// Self-or-superuser rule for updating user `target`.
///
/// A non-superuser may update their own record but may not change their
/// roles or flags.
pub fn check_can_update_user(
	actor: &User,
	target: UserId,
	changes: PrivilegedChanges,
) -> Result<(), AuthError> {
	if actor.is_superuser {
		return Ok(());
	}
	if actor.id != target {
		return Err(AuthError::Forbidden(
			"not enough permissions to update this user".to_string(),
		));
	}
	if changes.any() {
		return Err(AuthError::Forbidden(
			"only a superuser may change roles or account flags".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rbac::Role;
	use chrono::Utc;

	fn user(is_superuser: bool, permissions: &[&str]) -> User {
		let now = Utc::now();
		User {
			id: UserId::generate(),
			username: "someone".to_string(),
			email: "someone@example.com".to_string(),
			password_hash: String::new(),
			is_active: true,
			is_superuser,
			roles: vec![Role {
				name: "user".to_string(),
				description: String::new(),
				permissions: permissions.iter().map(|p| p.to_string()).collect(),
			}],
			created_at: now,
			updated_at: now,
		}
	}

	mod authorize {
		use super::*;

		#[test]
		fn allows_held_permission_and_role() {
			let u = user(false, &["models"]);
			assert!(authorize(&u, &Requirement::permission("models")).is_ok());
			assert!(authorize(&u, &Requirement::role("user")).is_ok());
		}

		#[test]
		fn missing_permission_is_forbidden_not_unauthorized() {
			let u = user(false, &["models"]);
			let err = authorize(&u, &Requirement::permission("db")).unwrap_err();
			assert!(matches!(err, AuthError::MissingPermission(ref p) if p == "db"));
			assert_eq!(err.status_code(), 403);
		}

		#[test]
		fn missing_role_is_forbidden() {
			let u = user(false, &[]);
			let err = authorize(&u, &Requirement::role("admin")).unwrap_err();
			assert_eq!(err.status_code(), 403);
		}
	}

	mod self_or_superuser {
		use super::*;

		#[test]
		fn non_superuser_cannot_update_someone_else() {
			let a = user(false, &[]);
			let b = user(false, &[]);
			let err = check_can_update_user(&a, b.id, PrivilegedChanges::default()).unwrap_err();
			assert!(matches!(err, AuthError::Forbidden(_)));
		}

		#[test]
		fn user_can_update_self() {
			let a = user(false, &[]);
			assert!(check_can_update_user(&a, a.id, PrivilegedChanges::default()).is_ok());
		}

		#[test]
		fn superuser_can_update_anyone() {
			let admin = user(true, &[]);
			let b = user(false, &[]);
			let everything = PrivilegedChanges {
				roles: true,
				is_active: true,
				is_superuser: true,
			};
			assert!(check_can_update_user(&admin, b.id, everything).is_ok());
		}

		#[test]
		fn user_cannot_escalate_own_roles() {
			let a = user(false, &[]);
			let changes = PrivilegedChanges {
				roles: true,
				..Default::default()
			};
			assert!(matches!(
				check_can_update_user(&a, a.id, changes),
				Err(AuthError::Forbidden(_))
			));
		}
	}
}
