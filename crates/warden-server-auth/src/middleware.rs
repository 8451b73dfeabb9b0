// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-scoped authentication state.
//!
//! ```text
//! Request → Authorization: Bearer <jwt> → decode → user lookup → AuthContext
//! ```
//!
//! The server's auth layer stores an [`AuthContext`] in the request
//! extensions; handlers and route layers read it from there. Token values are
//! never logged, only their [`crate::token_fingerprint`].

use http::header::AUTHORIZATION;
use http::HeaderMap;
use tracing::instrument;

use crate::error::AuthError;
use crate::token::token_fingerprint;
use crate::user::User;
use crate::UserId;

/// The authenticated caller of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
	pub user: User,
	/// Fingerprint of the bearer token the caller presented.
	pub token_fingerprint: String,
}

impl CurrentUser {
	pub fn from_bearer(user: User, token: &str) -> Self {
		Self {
			user,
			token_fingerprint: token_fingerprint(token),
		}
	}

	pub fn id(&self) -> UserId {
		self.user.id
	}
}

#[derive(Debug, Clone, Default)]
pub struct AuthContext {
	pub current_user: Option<CurrentUser>,
}

impl AuthContext {
	pub fn unauthenticated() -> Self {
		Self { current_user: None }
	}

	pub fn authenticated(current_user: CurrentUser) -> Self {
		Self {
			current_user: Some(current_user),
		}
	}

	pub fn is_authenticated(&self) -> bool {
		self.current_user.is_some()
	}

	pub fn user(&self) -> Option<&CurrentUser> {
		self.current_user.as_ref()
	}

	pub fn require_user(&self) -> Result<&CurrentUser, AuthError> {
		self.current_user
			.as_ref()
			.ok_or(AuthError::AuthenticationRequired)
	}
}

/// Returns the token from `Authorization: Bearer <token>`, if present.
///
/// The scheme name is matched case-insensitively.
#[instrument(level = "trace", skip_all)]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.split_once(' ')?;
	let token = token.trim();
	if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
		return None;
	}
	Some(token.to_string())
}
