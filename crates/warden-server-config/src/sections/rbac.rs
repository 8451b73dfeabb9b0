// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role catalog. TOML only:
//!
//! ```toml
//! [[rbac.permissions]]
//! name = "reports"
//!
//! [[rbac.roles]]
//! name = "user"
//! permissions = ["reports"]
//! ```
//!
//! Each list replaces the built-in one when present.

use serde::Deserialize;
use warden_server_auth::{PermissionDef, RbacCatalog, RoleDef};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RbacConfigLayer {
	#[serde(default)]
	pub permissions: Option<Vec<PermissionDef>>,
	#[serde(default)]
	pub roles: Option<Vec<RoleDef>>,
}

impl RbacConfigLayer {
	pub fn merge(&mut self, other: RbacConfigLayer) {
		if other.permissions.is_some() {
			self.permissions = other.permissions;
		}
		if other.roles.is_some() {
			self.roles = other.roles;
		}
	}

	pub fn finalize(self) -> Result<RbacCatalog, ConfigError> {
		let defaults = RbacCatalog::default();
		let catalog = RbacCatalog {
			permissions: self.permissions.unwrap_or(defaults.permissions),
			roles: self.roles.unwrap_or(defaults.roles),
		};
		catalog
			.validate()
			.map_err(|e| ConfigError::Validation(format!("rbac: {e}")))?;
		Ok(catalog)
	}
}
