// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signed access tokens.
//!
//! Tokens are compact HMAC-signed JWTs carrying `{sub, exp, iat}`. Nothing is
//! stored server-side: a token is valid while its signature checks out and
//! `now < exp`. Every decode failure is reported to callers as
//! [`AuthError::InvalidToken`]; the concrete cause is only logged.
//!
//! Refresh requires a token that is still valid. An expired token cannot be
//! exchanged for a new one.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use warden_common_secret::SecretString;

use crate::error::AuthError;

pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 30;

/// Upper bound on configured token lifetimes (one year).
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 525_600;

pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// HMAC algorithms accepted for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SigningAlgorithm {
	#[default]
	HS256,
	HS384,
	HS512,
}

impl SigningAlgorithm {
	fn as_jwt(self) -> Algorithm {
		match self {
			SigningAlgorithm::HS256 => Algorithm::HS256,
			SigningAlgorithm::HS384 => Algorithm::HS384,
			SigningAlgorithm::HS512 => Algorithm::HS512,
		}
	}
}

impl FromStr for SigningAlgorithm {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"HS256" => Ok(SigningAlgorithm::HS256),
			"HS384" => Ok(SigningAlgorithm::HS384),
			"HS512" => Ok(SigningAlgorithm::HS512),
			other => Err(format!(
				"unsupported signing algorithm '{other}' (expected HS256, HS384 or HS512)"
			)),
		}
	}
}

impl std::fmt::Display for SigningAlgorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			SigningAlgorithm::HS256 => "HS256",
			SigningAlgorithm::HS384 => "HS384",
			SigningAlgorithm::HS512 => "HS512",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Subject username.
	pub sub: String,
	/// Expiry, unix seconds.
	pub exp: i64,
	/// Issued at, unix seconds.
	pub iat: i64,
}

/// Why a token was rejected. Logged, never returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RejectReason {
	Malformed,
	BadSignature,
	Expired,
}

impl RejectReason {
	fn as_str(self) -> &'static str {
		match self {
			RejectReason::Malformed => "malformed",
			RejectReason::BadSignature => "bad_signature",
			RejectReason::Expired => "expired",
		}
	}
}

#[derive(Clone)]
pub struct TokenService {
	algorithm: SigningAlgorithm,
	encoding_key: Arc<EncodingKey>,
	decoding_key: Arc<DecodingKey>,
	validation: Arc<Validation>,
	default_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenService")
			.field("algorithm", &self.algorithm)
			.field("default_ttl", &self.default_ttl)
			.finish_non_exhaustive()
	}
}

impl TokenService {
	pub fn new(secret: &SecretString, algorithm: SigningAlgorithm, default_ttl: Duration) -> Self {
		let key = secret.expose().as_bytes();

		// Expiry is checked against an explicit clock in `decode_at`.
		let mut validation = Validation::new(algorithm.as_jwt());
		validation.validate_exp = false;
		validation.leeway = 0;
		validation.set_required_spec_claims(&["exp", "sub"]);

		Self {
			algorithm,
			encoding_key: Arc::new(EncodingKey::from_secret(key)),
			decoding_key: Arc::new(DecodingKey::from_secret(key)),
			validation: Arc::new(validation),
			default_ttl,
		}
	}

	pub fn default_ttl(&self) -> Duration {
		self.default_ttl
	}

	pub fn algorithm(&self) -> SigningAlgorithm {
		self.algorithm
	}

	/// Issues a token for `subject` that expires after the default TTL.
	pub fn issue(&self, subject: &str) -> Result<String, AuthError> {
		self.issue_at(subject, self.default_ttl, Utc::now())
	}

	pub fn issue_at(
		&self,
		subject: &str,
		ttl: Duration,
		now: DateTime<Utc>,
	) -> Result<String, AuthError> {
		let expires_at = now
			.checked_add_signed(ttl)
			.ok_or_else(|| AuthError::SigningError(format!("token lifetime {ttl} overflows")))?;
		let claims = Claims {
			sub: subject.to_string(),
			exp: expires_at.timestamp(),
			iat: now.timestamp(),
		};
		encode(&Header::new(self.algorithm.as_jwt()), &claims, &self.encoding_key)
			.map_err(|e| AuthError::SigningError(e.to_string()))
	}

	pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
		self.decode_at(token, Utc::now())
	}

	pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
		self.inspect(token, now).map_err(|reason| {
			tracing::debug!(reason = reason.as_str(), "rejected access token");
			AuthError::InvalidToken
		})
	}

	pub(crate) fn inspect(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, RejectReason> {
		let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
			match e.kind() {
				ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => RejectReason::BadSignature,
				_ => RejectReason::Malformed,
			}
		})?;
		if now.timestamp() >= data.claims.exp {
			return Err(RejectReason::Expired);
		}
		Ok(data.claims)
	}

	/// Exchanges a still-valid token for a fresh one.
	///
	/// `resolve` looks the subject up again; `Ok(None)` means the account is
	/// gone or disabled and the refresh is refused. The resolved value is
	/// handed back with the new token.
	pub async fn refresh<T, F, Fut>(&self, token: &str, resolve: F) -> Result<(String, T), AuthError>
	where
		F: FnOnce(String) -> Fut,
		Fut: Future<Output = Result<Option<T>, AuthError>>,
	{
		self.refresh_at(token, Utc::now(), resolve).await
	}

	pub async fn refresh_at<T, F, Fut>(
		&self,
		token: &str,
		now: DateTime<Utc>,
		resolve: F,
	) -> Result<(String, T), AuthError>
	where
		F: FnOnce(String) -> Fut,
		Fut: Future<Output = Result<Option<T>, AuthError>>,
	{
		let claims = self.decode_at(token, now)?;
		let Some(resolved) = resolve(claims.sub.clone()).await? else {
			tracing::debug!("refresh refused: subject no longer resolvable");
			return Err(AuthError::InvalidToken);
		};
		let fresh = self.issue_at(&claims.sub, self.default_ttl, now)?;
		Ok((fresh, resolved))
	}
}

/// Short SHA-256 fingerprint for correlating a token in audit logs.
pub fn token_fingerprint(token: &str) -> String {
	let digest = Sha256::digest(token.as_bytes());
	hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn service() -> TokenService {
		TokenService::new(
			&SecretString::from("test-signing-secret-with-enough-bytes"),
			SigningAlgorithm::HS256,
			Duration::minutes(DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
		)
	}

	mod issue_and_decode {
		use super::*;

		#[test]
		fn decodes_subject_before_expiry() {
			let svc = service();
			let token = svc.issue("alice").unwrap();
			let claims = svc.decode(&token).unwrap();
			assert_eq!(claims.sub, "alice");
			assert_eq!(claims.exp - claims.iat, 30 * 60);
		}

		#[test]
		fn token_is_url_safe() {
			let token = service().issue("alice").unwrap();
			assert!(token
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
			assert_eq!(token.matches('.').count(), 2);
		}

		#[test]
		fn zero_ttl_is_expired_immediately() {
			let svc = service();
			let now = Utc::now();
			let token = svc.issue_at("alice", Duration::zero(), now).unwrap();
			assert_eq!(svc.inspect(&token, now), Err(RejectReason::Expired));
			assert!(matches!(
				svc.decode_at(&token, now),
				Err(AuthError::InvalidToken)
			));
		}

		#[test]
		fn expires_after_clock_advance() {
			let svc = service();
			let now = Utc::now();
			let token = svc.issue_at("alice", Duration::minutes(5), now).unwrap();
			assert!(svc.decode_at(&token, now + Duration::minutes(4)).is_ok());
			assert_eq!(
				svc.inspect(&token, now + Duration::minutes(5)),
				Err(RejectReason::Expired)
			);
		}

		#[test]
		fn overflowing_lifetime_is_an_error() {
			let svc = service();
			let result = svc.issue_at("alice", Duration::MAX, Utc::now());
			assert!(matches!(result, Err(AuthError::SigningError(_))));

			let huge = Duration::try_minutes(1_000_000_000_000).unwrap();
			assert!(svc.issue_at("alice", huge, Utc::now()).is_err());
		}

		#[test]
		fn foreign_secret_is_bad_signature() {
			let other = TokenService::new(
				&SecretString::from("a-completely-different-signing-secret"),
				SigningAlgorithm::HS256,
				Duration::minutes(30),
			);
			let token = other.issue("alice").unwrap();
			assert_eq!(
				service().inspect(&token, Utc::now()),
				Err(RejectReason::BadSignature)
			);
		}

		#[test]
		fn garbage_is_malformed() {
			assert_eq!(
				service().inspect("not.a.jwt", Utc::now()),
				Err(RejectReason::Malformed)
			);
			assert_eq!(
				service().inspect("", Utc::now()),
				Err(RejectReason::Malformed)
			);
		}

		#[test]
		fn all_failures_collapse_to_invalid_token() {
			let svc = service();
			let now = Utc::now();
			let expired = svc.issue_at("alice", Duration::seconds(-1), now).unwrap();
			for token in [expired.as_str(), "garbage", "a.b.c"] {
				let err = svc.decode_at(token, now).unwrap_err();
				assert!(matches!(err, AuthError::InvalidToken));
				assert_eq!(err.status_code(), 401);
			}
		}

		#[test]
		fn algorithm_mismatch_is_rejected() {
			let hs512 = TokenService::new(
				&SecretString::from("test-signing-secret-with-enough-bytes"),
				SigningAlgorithm::HS512,
				Duration::minutes(30),
			);
			let token = hs512.issue("alice").unwrap();
			assert!(service().decode(&token).is_err());
		}
	}

	mod refresh {
		use super::*;

		#[tokio::test]
		async fn issues_token_with_fresh_expiry() {
			let svc = service();
			let issued_at = Utc::now() - Duration::minutes(20);
			let old = svc.issue_at("alice", Duration::minutes(30), issued_at).unwrap();
			let now = Utc::now();

			let (fresh, id) = svc
				.refresh_at(&old, now, |sub| async move {
					assert_eq!(sub, "alice");
					Ok(Some(7_u32))
				})
				.await
				.unwrap();

			assert_eq!(id, 7);
			let claims = svc.decode_at(&fresh, now).unwrap();
			assert_eq!(claims.exp, (now + Duration::minutes(30)).timestamp());
		}

		#[tokio::test]
		async fn rejects_expired_token() {
			let svc = service();
			let now = Utc::now();
			let old = svc.issue_at("alice", Duration::minutes(1), now).unwrap();
			let result = svc
				.refresh_at(&old, now + Duration::minutes(2), |_| async { Ok(Some(())) })
				.await;
			assert!(matches!(result, Err(AuthError::InvalidToken)));
		}

		#[test]
		fn rejects_vanished_subject() {
			let svc = service();
			let token = svc.issue("ghost").unwrap();
			let result = tokio_test::block_on(
				svc.refresh(&token, |_| async { Ok::<Option<()>, AuthError>(None) }),
			);
			assert!(matches!(result, Err(AuthError::InvalidToken)));
		}
	}

	#[test]
	fn algorithm_parses_case_insensitively() {
		assert_eq!("hs384".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::HS384));
		assert!("RS256".parse::<SigningAlgorithm>().is_err());
	}

	#[test]
	fn fingerprint_is_stable_and_short() {
		assert_eq!(token_fingerprint("abc"), token_fingerprint("abc"));
		assert_eq!(token_fingerprint("abc").len(), 16);
		assert_ne!(token_fingerprint("abc"), token_fingerprint("abd"));
	}

	proptest! {
		#[test]
		fn subject_survives_issue_then_decode(
			subject in "[a-zA-Z0-9_.-]{3,50}",
			ttl_secs in 1i64..86_400,
		) {
			let svc = service();
			let now = Utc::now();
			let token = svc.issue_at(&subject, Duration::seconds(ttl_secs), now).unwrap();
			let claims = svc.decode_at(&token, now).unwrap();
			prop_assert_eq!(claims.sub, subject);
			prop_assert!(svc.decode_at(&token, now + Duration::seconds(ttl_secs)).is_err());
		}
	}
}
