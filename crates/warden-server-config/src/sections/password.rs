// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password complexity rules.

use serde::Deserialize;
use warden_server_auth::PasswordPolicy;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordConfigLayer {
	#[serde(default)]
	pub min_length: Option<usize>,
	#[serde(default)]
	pub max_length: Option<usize>,
	#[serde(default)]
	pub require_special: Option<bool>,
	#[serde(default)]
	pub require_digit: Option<bool>,
	#[serde(default)]
	pub require_case: Option<bool>,
}

impl PasswordConfigLayer {
	pub fn merge(&mut self, other: PasswordConfigLayer) {
		if other.min_length.is_some() {
			self.min_length = other.min_length;
		}
		if other.max_length.is_some() {
			self.max_length = other.max_length;
		}
		if other.require_special.is_some() {
			self.require_special = other.require_special;
		}
		if other.require_digit.is_some() {
			self.require_digit = other.require_digit;
		}
		if other.require_case.is_some() {
			self.require_case = other.require_case;
		}
	}

	pub fn finalize(self) -> Result<PasswordPolicy, ConfigError> {
		let defaults = PasswordPolicy::default();
		let policy = PasswordPolicy {
			min_length: self.min_length.unwrap_or(defaults.min_length),
			max_length: self.max_length.unwrap_or(defaults.max_length),
			require_special: self.require_special.unwrap_or(defaults.require_special),
			require_digit: self.require_digit.unwrap_or(defaults.require_digit),
			require_case: self.require_case.unwrap_or(defaults.require_case),
		};

		if policy.min_length == 0 {
			return Err(ConfigError::Validation(
				"password.min_length must be at least 1".to_string(),
			));
		}
		if policy.max_length < policy.min_length {
			return Err(ConfigError::Validation(format!(
				"password.max_length ({}) is below password.min_length ({})",
				policy.max_length, policy.min_length
			)));
		}
		Ok(policy)
	}
}
