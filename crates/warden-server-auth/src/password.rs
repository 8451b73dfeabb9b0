// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password complexity policy and Argon2 hashing.
//!
//! [`PasswordPolicy::validate`] reports the first rule a password breaks so
//! the registration handler can tell the user exactly what to fix. Checks run
//! in a fixed order: length, special character, digit, letter case.
//!
//! [`PasswordHasher`] produces self-describing PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so verification needs
//! nothing beyond the stored hash.

use argon2::password_hash::{
	rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_common_secret::SecretString;

use crate::argon2_config::HasherParams;
use crate::error::AuthError;

/// Characters that satisfy the special-character rule.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

pub const DEFAULT_MIN_LENGTH: usize = 8;
pub const DEFAULT_MAX_LENGTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
	#[error("password must be at least {min} characters long")]
	TooShort { min: usize },

	#[error("password must be at most {max} characters long")]
	TooLong { max: usize },

	#[error("password must contain at least one special character (!@#$%^&*()_+-=[]{{}}|;:,.<>?)")]
	MissingSpecial,

	#[error("password must contain at least one number")]
	MissingDigit,

	#[error("password must contain both uppercase and lowercase letters")]
	MissingCase,
}

impl PolicyViolation {
	pub fn code(&self) -> &'static str {
		match self {
			PolicyViolation::TooShort { .. } => "password_too_short",
			PolicyViolation::TooLong { .. } => "password_too_long",
			PolicyViolation::MissingSpecial => "password_missing_special",
			PolicyViolation::MissingDigit => "password_missing_digit",
			PolicyViolation::MissingCase => "password_missing_case",
		}
	}
}

/// Configurable complexity rules. Length bounds count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
	pub min_length: usize,
	pub max_length: usize,
	pub require_special: bool,
	pub require_digit: bool,
	pub require_case: bool,
}

impl Default for PasswordPolicy {
	fn default() -> Self {
		Self {
			min_length: DEFAULT_MIN_LENGTH,
			max_length: DEFAULT_MAX_LENGTH,
			require_special: true,
			require_digit: true,
			require_case: true,
		}
	}
}

impl PasswordPolicy {
	pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
		let length = password.chars().count();
		if length < self.min_length {
			return Err(PolicyViolation::TooShort {
				min: self.min_length,
			});
		}
		if length > self.max_length {
			return Err(PolicyViolation::TooLong {
				max: self.max_length,
			});
		}
		if self.require_special && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
			return Err(PolicyViolation::MissingSpecial);
		}
		if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
			return Err(PolicyViolation::MissingDigit);
		}
		if self.require_case
			&& !(password.chars().any(char::is_uppercase) && password.chars().any(char::is_lowercase))
		{
			return Err(PolicyViolation::MissingCase);
		}
		Ok(())
	}
}

/// Argon2id hasher with configurable cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHasher {
	params: HasherParams,
}

impl PasswordHasher {
	pub fn new(params: HasherParams) -> Self {
		Self { params }
	}

	pub fn params(&self) -> HasherParams {
		self.params
	}

	/// Hashes with a fresh random salt. CPU-bound; see [`Self::hash_blocking`].
	pub fn hash(&self, password: &SecretString) -> Result<String, AuthError> {
		let argon2 = self
			.params
			.argon2()
			.map_err(|e| AuthError::HashingError(e.to_string()))?;
		let salt = SaltString::generate(&mut OsRng);
		argon2
			.hash_password(password.expose().as_bytes(), &salt)
			.map(|hash| hash.to_string())
			.map_err(|e| AuthError::HashingError(e.to_string()))
	}

	/// Runs [`Self::hash`] on the blocking thread pool.
	pub async fn hash_blocking(&self, password: SecretString) -> Result<String, AuthError> {
		let hasher = *self;
		tokio::task::spawn_blocking(move || hasher.hash(&password))
			.await
			.map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
	}

	/// Returns false for a wrong password and for a hash that does not parse.
	pub fn verify(&self, password: &str, hash: &str) -> bool {
		let parsed = match PasswordHash::new(hash) {
			Ok(parsed) => parsed,
			Err(e) => {
				tracing::warn!(error = %e, "stored password hash is malformed");
				return false;
			}
		};
		argon2::Argon2::default()
			.verify_password(password.as_bytes(), &parsed)
			.is_ok()
	}

	/// Runs [`Self::verify`] on the blocking thread pool.
	pub async fn verify_blocking(&self, password: SecretString, hash: String) -> bool {
		let hasher = *self;
		match tokio::task::spawn_blocking(move || hasher.verify(password.expose(), &hash)).await {
			Ok(matched) => matched,
			Err(e) => {
				tracing::error!(error = %e, "password verification task failed");
				false
			}
		}
	}

	/// Does the Argon2 work of a verification when there is no stored hash,
	/// so a missing account takes as long to reject as a wrong password.
	/// Always returns false.
	pub async fn verify_unknown_blocking(&self, password: SecretString) -> bool {
		let hasher = *self;
		if let Err(e) = tokio::task::spawn_blocking(move || hasher.hash(&password)).await {
			tracing::error!(error = %e, "password verification task failed");
		}
		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	const VALID: &str = "Str0ng!Pass";

	mod policy {
		use super::*;

		#[test]
		fn accepts_password_meeting_every_rule() {
			assert_eq!(PasswordPolicy::default().validate(VALID), Ok(()));
		}

		#[test]
		fn rejects_too_short() {
			assert_eq!(
				PasswordPolicy::default().validate("S0r!t"),
				Err(PolicyViolation::TooShort { min: 8 })
			);
		}

		#[test]
		fn rejects_too_long() {
			let long = format!("Aa1!{}", "x".repeat(61));
			assert_eq!(
				PasswordPolicy::default().validate(&long),
				Err(PolicyViolation::TooLong { max: 64 })
			);
		}

		#[test]
		fn rejects_missing_special() {
			assert_eq!(
				PasswordPolicy::default().validate("Str0ngPass"),
				Err(PolicyViolation::MissingSpecial)
			);
		}

		#[test]
		fn rejects_missing_digit() {
			assert_eq!(
				PasswordPolicy::default().validate("Strong!Pass"),
				Err(PolicyViolation::MissingDigit)
			);
		}

		#[test]
		fn rejects_missing_uppercase() {
			assert_eq!(
				PasswordPolicy::default().validate("str0ng!pass"),
				Err(PolicyViolation::MissingCase)
			);
		}

		#[test]
		fn rejects_missing_lowercase() {
			assert_eq!(
				PasswordPolicy::default().validate("STR0NG!PASS"),
				Err(PolicyViolation::MissingCase)
			);
		}

		#[test]
		fn disabled_toggles_are_skipped() {
			let policy = PasswordPolicy {
				require_special: false,
				require_digit: false,
				require_case: false,
				..PasswordPolicy::default()
			};
			assert_eq!(policy.validate("plainpassword"), Ok(()));
		}

		#[test]
		fn length_counts_characters_not_bytes() {
			let policy = PasswordPolicy {
				min_length: 4,
				..PasswordPolicy::default()
			};
			assert_eq!(policy.validate("Éé1!"), Ok(()));
		}

		proptest! {
			#[test]
			fn any_password_below_min_is_too_short(password in "[A-Za-z0-9!@#]{0,7}") {
				prop_assert_eq!(
					PasswordPolicy::default().validate(&password),
					Err(PolicyViolation::TooShort { min: 8 })
				);
			}

			#[test]
			fn composed_passwords_are_accepted(
				upper in "[A-Z]{1,4}",
				lower in "[a-z]{1,4}",
				digit in "[0-9]{1,4}",
				special in "[!@#$%^&*]{1,4}",
			) {
				let password = format!("{upper}{lower}{digit}{special}xxxx");
				prop_assert_eq!(PasswordPolicy::default().validate(&password), Ok(()));
			}
		}
	}

	mod hashing {
		use super::*;

		fn hasher() -> PasswordHasher {
			PasswordHasher::new(HasherParams::insecure_fast())
		}

		#[test]
		fn hash_is_self_describing_phc_string() {
			let hash = hasher().hash(&SecretString::from(VALID)).unwrap();
			assert!(hash.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
		}

		#[test]
		fn same_password_gets_different_salts() {
			let a = hasher().hash(&SecretString::from(VALID)).unwrap();
			let b = hasher().hash(&SecretString::from(VALID)).unwrap();
			assert_ne!(a, b);
		}

		#[test]
		fn verify_accepts_correct_password() {
			let hash = hasher().hash(&SecretString::from(VALID)).unwrap();
			assert!(hasher().verify(VALID, &hash));
		}

		#[test]
		fn verify_rejects_wrong_password() {
			let hash = hasher().hash(&SecretString::from(VALID)).unwrap();
			assert!(!hasher().verify("Wr0ng!Pass", &hash));
		}

		#[test]
		fn verify_returns_false_on_malformed_hash() {
			assert!(!hasher().verify(VALID, "not-a-phc-string"));
			assert!(!hasher().verify(VALID, ""));
			assert!(!hasher().verify(VALID, "$argon2id$v=19$garbage"));
		}

		#[test]
		fn hashes_verify_across_cost_settings() {
			let hash = hasher().hash(&SecretString::from(VALID)).unwrap();
			assert!(PasswordHasher::default().verify(VALID, &hash));
		}

		#[tokio::test]
		async fn blocking_variants_round_trip() {
			let hash = hasher()
				.hash_blocking(SecretString::from(VALID))
				.await
				.unwrap();
			assert!(
				hasher()
					.verify_blocking(SecretString::from(VALID), hash)
					.await
			);
		}

		#[tokio::test]
		async fn unknown_account_never_verifies() {
			assert!(
				!hasher()
					.verify_unknown_blocking(SecretString::from(VALID))
					.await
			);
		}
	}
}
