// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token signing and password hashing configuration.
//!
//! Outside production a missing signing secret is replaced by a random one
//! generated at startup. Tokens signed with it do not survive a restart.

use serde::Deserialize;
use warden_common_secret::{Secret, SecretString};
use warden_server_auth::token::{DEFAULT_ACCESS_TOKEN_TTL_MINUTES, MAX_ACCESS_TOKEN_TTL_MINUTES};
use warden_server_auth::{HasherParams, SigningAlgorithm};

use crate::error::ConfigError;

pub const PRODUCTION_ENVIRONMENT: &str = "production";

const DEFAULT_ENVIRONMENT: &str = "development";
const MIN_SECRET_BYTES: usize = 32;

/// Authentication configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct AuthConfig {
	pub secret: SecretString,
	/// True when `secret` was generated because none was configured.
	pub secret_generated: bool,
	pub algorithm: SigningAlgorithm,
	pub access_token_ttl_minutes: i64,
	pub environment: String,
	pub hasher: HasherParams,
}

impl AuthConfig {
	pub fn is_production(&self) -> bool {
		self.environment.eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT)
	}
}

/// Authentication configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub secret: Option<SecretString>,
	#[serde(default)]
	pub algorithm: Option<String>,
	#[serde(default)]
	pub access_token_ttl_minutes: Option<i64>,
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub argon2_memory_kib: Option<u32>,
	#[serde(default)]
	pub argon2_iterations: Option<u32>,
	#[serde(default)]
	pub argon2_parallelism: Option<u32>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: AuthConfigLayer) {
		if other.secret.is_some() {
			self.secret = other.secret;
		}
		if other.algorithm.is_some() {
			self.algorithm = other.algorithm;
		}
		if other.access_token_ttl_minutes.is_some() {
			self.access_token_ttl_minutes = other.access_token_ttl_minutes;
		}
		if other.environment.is_some() {
			self.environment = other.environment;
		}
		if other.argon2_memory_kib.is_some() {
			self.argon2_memory_kib = other.argon2_memory_kib;
		}
		if other.argon2_iterations.is_some() {
			self.argon2_iterations = other.argon2_iterations;
		}
		if other.argon2_parallelism.is_some() {
			self.argon2_parallelism = other.argon2_parallelism;
		}
	}

	pub fn finalize(self) -> Result<AuthConfig, ConfigError> {
		let environment = self
			.environment
			.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
		let production = environment.eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT);

		let algorithm = match self.algorithm {
			Some(name) => name
				.parse::<SigningAlgorithm>()
				.map_err(|message| ConfigError::InvalidValue {
					key: "auth.algorithm".to_string(),
					message,
				})?,
			None => SigningAlgorithm::HS256,
		};

		let access_token_ttl_minutes = self
			.access_token_ttl_minutes
			.unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_MINUTES);
		if access_token_ttl_minutes <= 0 {
			return Err(ConfigError::Validation(
				"auth.access_token_ttl_minutes must be greater than zero".to_string(),
			));
		}
		if access_token_ttl_minutes > MAX_ACCESS_TOKEN_TTL_MINUTES {
			return Err(ConfigError::InvalidValue {
				key: "auth.access_token_ttl_minutes".to_string(),
				message: format!("must be at most {MAX_ACCESS_TOKEN_TTL_MINUTES} minutes"),
			});
		}

		let configured = self.secret.filter(|s| !s.expose().is_empty());
		let (secret, secret_generated) = match configured {
			Some(secret) => {
				if production && secret.expose().len() < MIN_SECRET_BYTES {
					return Err(ConfigError::Validation(format!(
						"WARDEN_SERVER_AUTH_SECRET must be at least {MIN_SECRET_BYTES} bytes in production"
					)));
				}
				(secret, false)
			}
			None if production => {
				return Err(ConfigError::Validation(
					"WARDEN_SERVER_AUTH_SECRET is required in production".to_string(),
				));
			}
			None => {
				tracing::warn!(
					environment = %environment,
					"no signing secret configured, generated an ephemeral one; tokens will not survive a restart"
				);
				(generate_secret(), true)
			}
		};

		let defaults = HasherParams::default();
		let hasher = HasherParams {
			memory_kib: self.argon2_memory_kib.unwrap_or(defaults.memory_kib),
			iterations: self.argon2_iterations.unwrap_or(defaults.iterations),
			parallelism: self.argon2_parallelism.unwrap_or(defaults.parallelism),
		};
		hasher.argon2().map_err(|e| ConfigError::InvalidValue {
			key: "auth.argon2".to_string(),
			message: e.to_string(),
		})?;

		Ok(AuthConfig {
			secret,
			secret_generated,
			algorithm,
			access_token_ttl_minutes,
			environment,
			hasher,
		})
	}
}

fn generate_secret() -> SecretString {
	let bytes: [u8; 32] = rand::random();
	Secret::new(hex::encode(bytes))
}
