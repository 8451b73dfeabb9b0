// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role and permission model.
//!
//! The catalog of permissions and roles is a typed structure loaded once at
//! startup and validated: every permission a role references must be
//! declared, names are unique, and the default `user` role exists. Storage
//! seeds itself from the catalog idempotently.
//!
//! A user's effective permissions are the set union across all held roles.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role assigned when registration names no roles.
pub const DEFAULT_ROLE: &str = "user";
pub const ADMIN_ROLE: &str = "admin";

/// Permission required by the user-administration endpoints.
pub const AUTH_PERMISSION: &str = "auth";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDef {
	pub name: String,
	#[serde(default)]
	pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDef {
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
	#[error("duplicate permission '{0}'")]
	DuplicatePermission(String),

	#[error("duplicate role '{0}'")]
	DuplicateRole(String),

	#[error("role '{role}' references undeclared permission '{permission}'")]
	UndeclaredPermission { role: String, permission: String },

	#[error("default role '{0}' is not declared")]
	MissingDefaultRole(String),

	#[error("empty name in catalog")]
	EmptyName,
}

/// The closed set of permissions and the roles built from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacCatalog {
	pub permissions: Vec<PermissionDef>,
	pub roles: Vec<RoleDef>,
}

impl Default for RbacCatalog {
	fn default() -> Self {
		let permission = |name: &str, description: &str| PermissionDef {
			name: name.to_string(),
			description: description.to_string(),
		};
		let permissions = vec![
			permission(AUTH_PERMISSION, "Manage authentication and users"),
			permission("db", "Access and modify database"),
			permission("models", "Access and train models"),
			permission("cmd", "Execute system commands"),
		];
		let roles = vec![
			RoleDef {
				name: ADMIN_ROLE.to_string(),
				description: "Administrator".to_string(),
				permissions: permissions.iter().map(|p| p.name.clone()).collect(),
			},
			RoleDef {
				name: DEFAULT_ROLE.to_string(),
				description: "Standard user".to_string(),
				permissions: vec!["models".to_string()],
			},
		];
		Self { permissions, roles }
	}
}

impl RbacCatalog {
	pub fn validate(&self) -> Result<(), CatalogError> {
		let mut declared = HashSet::new();
		for permission in &self.permissions {
			if permission.name.trim().is_empty() {
				return Err(CatalogError::EmptyName);
			}
			if !declared.insert(permission.name.as_str()) {
				return Err(CatalogError::DuplicatePermission(permission.name.clone()));
			}
		}

		let mut roles = HashSet::new();
		for role in &self.roles {
			if role.name.trim().is_empty() {
				return Err(CatalogError::EmptyName);
			}
			if !roles.insert(role.name.as_str()) {
				return Err(CatalogError::DuplicateRole(role.name.clone()));
			}
			if let Some(missing) = role
				.permissions
				.iter()
				.find(|p| !declared.contains(p.as_str()))
			{
				return Err(CatalogError::UndeclaredPermission {
					role: role.name.clone(),
					permission: missing.clone(),
				});
			}
		}

		if !roles.contains(DEFAULT_ROLE) {
			return Err(CatalogError::MissingDefaultRole(DEFAULT_ROLE.to_string()));
		}
		Ok(())
	}

	pub fn role(&self, name: &str) -> Option<&RoleDef> {
		self.roles.iter().find(|r| r.name == name)
	}
}

/// A stored role with its resolved permission names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub name: String,
	pub description: String,
	pub permissions: BTreeSet<String>,
}

/// Union of the permissions granted by `roles`.
pub fn effective_permissions<'a>(roles: impl IntoIterator<Item = &'a Role>) -> BTreeSet<String> {
	roles
		.into_iter()
		.flat_map(|role| role.permissions.iter().cloned())
		.collect()
}
