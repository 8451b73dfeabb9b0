// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication and authorization error types.

use thiserror::Error;

use crate::password::PolicyViolation;

#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Input Errors
	// =========================================================================
	/// Malformed input such as a bad email address or username length.
	#[error("{0}")]
	Validation(String),

	#[error(transparent)]
	WeakPassword(#[from] PolicyViolation),

	/// Username or email collides with an existing account.
	#[error("{0} already registered")]
	Duplicate(String),

	// =========================================================================
	// Authentication Errors
	// =========================================================================
	#[error("authentication required")]
	AuthenticationRequired,

	/// Username/password mismatch, unknown user, or inactive account.
	#[error("incorrect username or password")]
	InvalidCredentials,

	/// Bad signature, malformed structure or expired token.
	#[error("could not validate credentials")]
	InvalidToken,

	// =========================================================================
	// Authorization Errors
	// =========================================================================
	#[error("forbidden: {0}")]
	Forbidden(String),

	#[error("missing required permission: {0}")]
	MissingPermission(String),

	#[error("missing required role: {0}")]
	MissingRole(String),

	#[error("too many registration attempts, try again later")]
	RateLimited,

	// =========================================================================
	// Infrastructure Errors
	// =========================================================================
	#[error("password hashing error: {0}")]
	HashingError(String),

	#[error("token signing error: {0}")]
	SigningError(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl AuthError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			AuthError::HashingError(_) | AuthError::SigningError(_) | AuthError::Internal(_)
		)
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			AuthError::Validation(_) | AuthError::WeakPassword(_) | AuthError::Duplicate(_) => 400,

			AuthError::AuthenticationRequired
			| AuthError::InvalidCredentials
			| AuthError::InvalidToken => 401,

			AuthError::Forbidden(_) | AuthError::MissingPermission(_) | AuthError::MissingRole(_) => {
				403
			}

			AuthError::RateLimited => 429,

			AuthError::HashingError(_) | AuthError::SigningError(_) | AuthError::Internal(_) => 500,
		}
	}

	/// Stable machine-readable code used as the `error` field of response bodies.
	pub fn code(&self) -> &'static str {
		match self {
			AuthError::Validation(_) => "validation_error",
			AuthError::WeakPassword(v) => v.code(),
			AuthError::Duplicate(_) => "duplicate",
			AuthError::AuthenticationRequired | AuthError::InvalidCredentials | AuthError::InvalidToken => {
				"unauthorized"
			}
			AuthError::Forbidden(_) | AuthError::MissingPermission(_) | AuthError::MissingRole(_) => {
				"forbidden"
			}
			AuthError::RateLimited => "rate_limited",
			AuthError::HashingError(_) | AuthError::SigningError(_) | AuthError::Internal(_) => {
				"internal_error"
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn duplicate_is_400() {
		assert_eq!(AuthError::Duplicate("email".into()).status_code(), 400);
	}

	#[test]
	fn weak_password_is_400_with_specific_code() {
		let err = AuthError::from(PolicyViolation::MissingDigit);
		assert_eq!(err.status_code(), 400);
		assert_eq!(err.code(), "password_missing_digit");
	}

	#[test]
	fn unauthorized_and_forbidden_are_distinct() {
		assert_eq!(AuthError::InvalidToken.status_code(), 401);
		assert_eq!(AuthError::MissingPermission("db".into()).status_code(), 403);
	}

	#[test]
	fn rate_limited_is_429() {
		assert_eq!(AuthError::RateLimited.status_code(), 429);
	}

	#[test]
	fn internal_errors_are_flagged() {
		assert!(AuthError::Internal("boom".into()).is_internal());
		assert!(AuthError::HashingError("boom".into()).is_internal());
		assert!(!AuthError::Forbidden("nope".into()).is_internal());
		assert_eq!(AuthError::Internal("boom".into()).status_code(), 500);
	}

	#[test]
	fn token_failures_share_one_message() {
		assert_eq!(
			AuthError::InvalidToken.to_string(),
			"could not validate credentials"
		);
	}
}
