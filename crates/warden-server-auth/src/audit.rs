// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit trail for authentication and authorization events.
//!
//! Entries are emitted on the `audit` tracing target and persisted by the
//! storage layer. Logout produces an entry and nothing else: issued tokens
//! stay valid until they expire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AuditLogId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
	Registration,
	RegistrationRateLimited,
	Login,
	LoginFailed,
	Logout,
	TokenRefreshed,
	AccessDenied,
	UserUpdated,
	UserDeleted,
}

impl AuditEventType {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditEventType::Registration => "registration",
			AuditEventType::RegistrationRateLimited => "registration_rate_limited",
			AuditEventType::Login => "login",
			AuditEventType::LoginFailed => "login_failed",
			AuditEventType::Logout => "logout",
			AuditEventType::TokenRefreshed => "token_refreshed",
			AuditEventType::AccessDenied => "access_denied",
			AuditEventType::UserUpdated => "user_updated",
			AuditEventType::UserDeleted => "user_deleted",
		}
	}
}

impl std::fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for AuditEventType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		serde_json::from_value(serde_json::Value::String(s.to_string()))
			.map_err(|_| format!("unknown audit event type: {s}"))
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
	pub id: AuditLogId,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	/// Who performed the action, when known.
	pub actor_user_id: Option<UserId>,
	pub resource_type: Option<String>,
	pub resource_id: Option<String>,
	pub action: String,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub details: serde_json::Value,
}

impl AuditLogEntry {
	pub fn builder(event_type: AuditEventType) -> AuditLogBuilder {
		AuditLogBuilder::new(event_type)
	}

	/// Writes the entry to the `audit` tracing target.
	pub fn emit(&self) {
		tracing::info!(
			target: "audit",
			audit_id = %self.id,
			event_type = %self.event_type,
			actor_user_id = ?self.actor_user_id.map(|id| id.to_string()),
			resource_type = ?self.resource_type,
			resource_id = ?self.resource_id,
			ip_address = ?self.ip_address,
			details = %self.details,
			"{}",
			self.action
		);
	}
}

#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
	event_type: AuditEventType,
	actor_user_id: Option<UserId>,
	resource_type: Option<String>,
	resource_id: Option<String>,
	action: Option<String>,
	ip_address: Option<String>,
	user_agent: Option<String>,
	details: serde_json::Value,
}

impl AuditLogBuilder {
	pub fn new(event_type: AuditEventType) -> Self {
		Self {
			event_type,
			actor_user_id: None,
			resource_type: None,
			resource_id: None,
			action: None,
			ip_address: None,
			user_agent: None,
			details: serde_json::Value::Null,
		}
	}

	pub fn actor(mut self, user_id: UserId) -> Self {
		self.actor_user_id = Some(user_id);
		self
	}

	pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
		self.resource_type = Some(resource_type.into());
		self.resource_id = Some(resource_id.into());
		self
	}

	pub fn action(mut self, action: impl Into<String>) -> Self {
		self.action = Some(action.into());
		self
	}

	pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
		self.ip_address = Some(ip.into());
		self
	}

	pub fn user_agent(mut self, user_agent: Option<String>) -> Self {
		self.user_agent = user_agent;
		self
	}

	pub fn details(mut self, details: serde_json::Value) -> Self {
		self.details = details;
		self
	}

	pub fn build(self) -> AuditLogEntry {
		AuditLogEntry {
			id: AuditLogId::generate(),
			timestamp: Utc::now(),
			event_type: self.event_type,
			actor_user_id: self.actor_user_id,
			resource_type: self.resource_type,
			resource_id: self.resource_id,
			action: self.action.unwrap_or_else(|| self.event_type.to_string()),
			ip_address: self.ip_address,
			user_agent: self.user_agent,
			details: self.details,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn event_type_string_matches_serde_name() {
		for event in [
			AuditEventType::Registration,
			AuditEventType::RegistrationRateLimited,
			AuditEventType::Login,
			AuditEventType::LoginFailed,
			AuditEventType::Logout,
			AuditEventType::TokenRefreshed,
			AuditEventType::AccessDenied,
			AuditEventType::UserUpdated,
			AuditEventType::UserDeleted,
		] {
			let json = serde_json::to_string(&event).unwrap();
			assert_eq!(json, format!("\"{}\"", event.as_str()));
			assert_eq!(event.as_str().parse::<AuditEventType>(), Ok(event));
		}
	}

	#[test]
	fn builder_defaults_action_to_event_name() {
		let entry = AuditLogEntry::builder(AuditEventType::Logout).build();
		assert_eq!(entry.action, "logout");
		assert!(entry.actor_user_id.is_none());
		assert_eq!(entry.details, serde_json::Value::Null);
	}

	#[test]
	fn builder_sets_all_fields() {
		let actor = UserId::generate();
		let entry = AuditLogEntry::builder(AuditEventType::UserUpdated)
			.actor(actor)
			.resource("user", actor.to_string())
			.action("updated email")
			.ip_address("10.0.0.1")
			.user_agent(Some("curl/8".to_string()))
			.details(serde_json::json!({"fields": ["email"]}))
			.build();

		assert_eq!(entry.actor_user_id, Some(actor));
		assert_eq!(entry.resource_type.as_deref(), Some("user"));
		assert_eq!(entry.action, "updated email");
		assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
		assert_eq!(entry.details["fields"][0], "email");
	}
}
