// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};
use warden_common_secret::{load_secret_env, SecretString};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuthConfigLayer, DatabaseConfigLayer, HttpConfigLayer, LogFormat, LoggingConfigLayer,
	PasswordConfigLayer, RateLimitConfigLayer,
};

/// Variable naming an alternative config file.
pub const CONFIG_FILE_ENV: &str = "WARDEN_SERVER_CONFIG_FILE";

const SYSTEM_CONFIG_PATH: &str = "/etc/warden/server.toml";
const AUTH_SECRET_ENV: &str = "WARDEN_SERVER_AUTH_SECRET";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `$WARDEN_SERVER_CONFIG_FILE`, else `/etc/warden/server.toml`.
	pub fn system() -> Self {
		match env_var(CONFIG_FILE_ENV) {
			Some(path) => Self::new(path),
			None => Self::new(SYSTEM_CONFIG_PATH),
		}
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `WARDEN_SERVER_<SECTION>_<FIELD>`. The signing secret also
/// accepts `WARDEN_SERVER_AUTH_SECRET_FILE`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		let secret =
			load_secret_env(AUTH_SECRET_ENV).map_err(|e| ConfigError::Secret(e.to_string()))?;
		layer_from_vars(&env_var, secret)
	}
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Builds the environment layer from an arbitrary variable lookup.
fn layer_from_vars(
	vars: Lookup<'_>,
	secret: Option<SecretString>,
) -> Result<ServerConfigLayer, ConfigError> {
	Ok(ServerConfigLayer {
		http: Some(HttpConfigLayer {
			host: vars("WARDEN_SERVER_HOST"),
			port: parse_var(vars, "WARDEN_SERVER_PORT")?,
			trust_proxy_headers: bool_var(vars, "WARDEN_SERVER_TRUST_PROXY_HEADERS"),
		}),
		database: Some(DatabaseConfigLayer {
			url: vars("WARDEN_SERVER_DATABASE_URL"),
		}),
		auth: Some(AuthConfigLayer {
			secret,
			algorithm: vars("WARDEN_SERVER_AUTH_ALGORITHM"),
			access_token_ttl_minutes: parse_var(vars, "WARDEN_SERVER_ACCESS_TOKEN_TTL_MINUTES")?,
			environment: vars("WARDEN_SERVER_ENVIRONMENT"),
			argon2_memory_kib: None,
			argon2_iterations: None,
			argon2_parallelism: None,
		}),
		password: Some(PasswordConfigLayer {
			min_length: parse_var(vars, "WARDEN_SERVER_PASSWORD_MIN_LENGTH")?,
			max_length: parse_var(vars, "WARDEN_SERVER_PASSWORD_MAX_LENGTH")?,
			require_special: bool_var(vars, "WARDEN_SERVER_PASSWORD_REQUIRE_SPECIAL"),
			require_digit: bool_var(vars, "WARDEN_SERVER_PASSWORD_REQUIRE_DIGIT"),
			require_case: bool_var(vars, "WARDEN_SERVER_PASSWORD_REQUIRE_CASE"),
		}),
		rate_limit: Some(RateLimitConfigLayer {
			max_attempts: parse_var(vars, "WARDEN_SERVER_RATE_LIMIT_MAX_ATTEMPTS")?,
			window_secs: parse_var(vars, "WARDEN_SERVER_RATE_LIMIT_WINDOW_SECS")?,
		}),
		logging: Some(LoggingConfigLayer {
			level: vars("WARDEN_SERVER_LOG_LEVEL"),
			format: parse_var::<LogFormat>(vars, "WARDEN_SERVER_LOG_FORMAT")?,
		}),
		rbac: None,
	})
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn bool_var(vars: Lookup<'_>, name: &str) -> Option<bool> {
	vars(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn parse_var<T>(vars: Lookup<'_>, name: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match vars(name) {
		Some(v) => v.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}': {e}"),
		}),
		None => Ok(None),
	}
}
