// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registration rate limit.

use serde::Deserialize;
use warden_server_auth::RateLimitPolicy;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitConfigLayer {
	#[serde(default)]
	pub max_attempts: Option<u32>,
	#[serde(default)]
	pub window_secs: Option<u64>,
}

impl RateLimitConfigLayer {
	pub fn merge(&mut self, other: RateLimitConfigLayer) {
		if other.max_attempts.is_some() {
			self.max_attempts = other.max_attempts;
		}
		if other.window_secs.is_some() {
			self.window_secs = other.window_secs;
		}
	}

	pub fn finalize(self) -> Result<RateLimitPolicy, ConfigError> {
		let defaults = RateLimitPolicy::default();
		let policy = RateLimitPolicy {
			max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
			window_secs: self.window_secs.unwrap_or(defaults.window_secs),
		};
		if policy.max_attempts == 0 {
			return Err(ConfigError::Validation(
				"rate_limit.max_attempts must be at least 1".to_string(),
			));
		}
		if policy.window_secs == 0 {
			return Err(ConfigError::Validation(
				"rate_limit.window_secs must be greater than zero".to_string(),
			));
		}
		Ok(policy)
	}
}
