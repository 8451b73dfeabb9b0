// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User entity, its public projection, and input validation.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::rbac::{effective_permissions, Role};
use crate::types::UserId;

pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 50;
pub const EMAIL_MAX_LENGTH: usize = 254;

static EMAIL_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// A stored account. `password_hash` never leaves the server; convert to
/// [`UserProfile`] before serializing into a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
	pub id: UserId,
	pub username: String,
	pub email: String,
	pub password_hash: String,
	pub is_active: bool,
	pub is_superuser: bool,
	pub roles: Vec<Role>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl User {
	pub fn effective_permissions(&self) -> BTreeSet<String> {
		effective_permissions(&self.roles)
	}

	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|r| r.name == role)
	}

	pub fn has_permission(&self, permission: &str) -> bool {
		self.roles.iter().any(|r| r.permissions.contains(permission))
	}

	pub fn role_names(&self) -> Vec<String> {
		self.roles.iter().map(|r| r.name.clone()).collect()
	}
}

/// The public fields of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	pub id: UserId,
	pub username: String,
	pub email: String,
	pub roles: Vec<String>,
	pub is_active: bool,
	pub is_superuser: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
	fn from(user: &User) -> Self {
		Self {
			id: user.id,
			username: user.username.clone(),
			email: user.email.clone(),
			roles: user.role_names(),
			is_active: user.is_active,
			is_superuser: user.is_superuser,
			created_at: user.created_at,
			updated_at: user.updated_at,
		}
	}
}

impl From<User> for UserProfile {
	fn from(user: User) -> Self {
		Self::from(&user)
	}
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
	let length = username.chars().count();
	if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&length) {
		return Err(AuthError::Validation(format!(
			"username must be between {USERNAME_MIN_LENGTH} and {USERNAME_MAX_LENGTH} characters"
		)));
	}
	if username.chars().any(char::is_whitespace) {
		return Err(AuthError::Validation(
			"username must not contain whitespace".to_string(),
		));
	}
	Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
	if email.len() > EMAIL_MAX_LENGTH || !EMAIL_REGEX.is_match(email) {
		return Err(AuthError::Validation("invalid email address".to_string()));
	}
	Ok(())
}
