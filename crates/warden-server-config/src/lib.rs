// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Warden server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`WARDEN_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use warden_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, CONFIG_FILE_ENV};

use tracing::{debug, info};
use warden_server_auth::{PasswordPolicy, RateLimitPolicy, RbacCatalog};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub auth: AuthConfig,
	pub password: PasswordPolicy,
	pub rate_limit: RateLimitPolicy,
	pub logging: LoggingConfig,
	pub rbac: RbacCatalog,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WARDEN_SERVER_*`)
/// 2. Config file (`$WARDEN_SERVER_CONFIG_FILE` or `/etc/warden/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved, validated config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let auth = layer.auth.unwrap_or_default().finalize()?;
	let password = layer.password.unwrap_or_default().finalize()?;
	let rate_limit = layer.rate_limit.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();
	let rbac = layer.rbac.unwrap_or_default().finalize()?;

	info!(
		host = %http.host,
		port = http.port,
		database = %database.url,
		environment = %auth.environment,
		algorithm = %auth.algorithm,
		secret_generated = auth.secret_generated,
		rate_limit_max_attempts = rate_limit.max_attempts,
		rate_limit_window_secs = rate_limit.window_secs,
		roles = rbac.roles.len(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		auth,
		password,
		rate_limit,
		logging,
		rbac,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_socket_addr() {
		let mut layer = ServerConfigLayer::default();
		layer.http = Some(HttpConfigLayer {
			host: Some("127.0.0.1".to_string()),
			port: Some(9000),
			trust_proxy_headers: None,
		});
		let config = finalize(layer).unwrap();
		assert_eq!(config.socket_addr(), "127.0.0.1:9000");
	}

	#[test]
	fn test_defaults_resolve() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.database.url, "sqlite:./warden.db");
		assert_eq!(config.password, PasswordPolicy::default());
		assert_eq!(config.rate_limit, RateLimitPolicy::default());
		assert_eq!(config.rbac, RbacCatalog::default());
		assert!(config.auth.secret_generated);
	}

	#[test]
	fn test_file_layer_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
			[database]
			url = "sqlite:/tmp/warden-test.db"

			[auth]
			access_token_ttl_minutes = 5
			argon2_memory_kib = 1024
			argon2_iterations = 1
			argon2_parallelism = 1
			"#
		)
		.unwrap();

		let mut merged = DefaultsSource.load().unwrap();
		merged.merge(TomlSource::new(file.path()).load().unwrap());
		let config = finalize(merged).unwrap();

		assert_eq!(config.database.url, "sqlite:/tmp/warden-test.db");
		assert_eq!(config.auth.access_token_ttl_minutes, 5);
		assert_eq!(config.auth.hasher.memory_kib, 1024);
	}

	#[test]
	fn test_invalid_section_fails_whole_load() {
		let layer = ServerConfigLayer {
			rate_limit: Some(RateLimitConfigLayer {
				max_attempts: Some(0),
				window_secs: None,
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}
}
