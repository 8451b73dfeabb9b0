// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use warden_server_auth::{AuditEventType, AuditLogEntry, AuditLogId, UserId};

use crate::error::{DbError, Result};
use crate::time::{format_timestamp, parse_timestamp};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 1000;

/// Filters for [`AuditStore::query_logs`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
	pub event_type: Option<AuditEventType>,
	pub actor_user_id: Option<UserId>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
	async fn insert_log(&self, entry: &AuditLogEntry) -> Result<()>;

	/// Returns matching entries, newest first, with the total match count.
	async fn query_logs(&self, query: &AuditQuery) -> Result<(Vec<AuditLogEntry>, i64)>;
}

#[derive(Clone)]
pub struct AuditRepository {
	pool: SqlitePool,
}

impl AuditRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, entry), fields(audit_id = %entry.id, event_type = %entry.event_type))]
	pub async fn insert_log(&self, entry: &AuditLogEntry) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO audit_logs (
				id, timestamp, event_type, actor_user_id, resource_type,
				resource_id, action, ip_address, user_agent, details
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(entry.id.to_string())
		.bind(format_timestamp(entry.timestamp))
		.bind(entry.event_type.as_str())
		.bind(entry.actor_user_id.map(|id| id.to_string()))
		.bind(&entry.resource_type)
		.bind(&entry.resource_id)
		.bind(&entry.action)
		.bind(&entry.ip_address)
		.bind(&entry.user_agent)
		.bind(serde_json::to_string(&entry.details)?)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn query_logs(&self, query: &AuditQuery) -> Result<(Vec<AuditLogEntry>, i64)> {
		let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
		let offset = query.offset.unwrap_or(0).max(0);

		let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS cnt FROM audit_logs WHERE 1=1");
		push_filters(&mut count, query);
		let total: i64 = count.build().fetch_one(&self.pool).await?.get("cnt");

		let mut select = QueryBuilder::<Sqlite>::new(
			"SELECT id, timestamp, event_type, actor_user_id, resource_type, resource_id, \
			 action, ip_address, user_agent, details FROM audit_logs WHERE 1=1",
		);
		push_filters(&mut select, query);
		select
			.push(" ORDER BY timestamp DESC, id LIMIT ")
			.push_bind(limit)
			.push(" OFFSET ")
			.push_bind(offset);

		let rows = select.build().fetch_all(&self.pool).await?;
		let logs = rows.iter().map(row_to_entry).collect::<Result<Vec<_>>>()?;
		Ok((logs, total))
	}
}

#[async_trait]
impl AuditStore for AuditRepository {
	async fn insert_log(&self, entry: &AuditLogEntry) -> Result<()> {
		self.insert_log(entry).await
	}

	async fn query_logs(&self, query: &AuditQuery) -> Result<(Vec<AuditLogEntry>, i64)> {
		self.query_logs(query).await
	}
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &AuditQuery) {
	if let Some(event_type) = query.event_type {
		builder.push(" AND event_type = ").push_bind(event_type.as_str());
	}
	if let Some(actor) = query.actor_user_id {
		builder.push(" AND actor_user_id = ").push_bind(actor.to_string());
	}
}

fn row_to_entry(row: &SqliteRow) -> Result<AuditLogEntry> {
	let id: String = row.get("id");
	let event_type: String = row.get("event_type");
	let timestamp: String = row.get("timestamp");
	let actor: Option<String> = row.get("actor_user_id");
	let details: String = row.get("details");

	Ok(AuditLogEntry {
		id: id
			.parse::<AuditLogId>()
			.map_err(|e| DbError::Internal(format!("Invalid audit log id: {e}")))?,
		timestamp: parse_timestamp(&timestamp, "timestamp")?,
		event_type: event_type.parse().map_err(DbError::Internal)?,
		actor_user_id: actor
			.map(|s| s.parse::<UserId>())
			.transpose()
			.map_err(|e| DbError::Internal(format!("Invalid actor_user_id: {e}")))?,
		resource_type: row.get("resource_type"),
		resource_id: row.get("resource_id"),
		action: row.get("action"),
		ip_address: row.get("ip_address"),
		user_agent: row.get("user_agent"),
		details: serde_json::from_str(&details)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	fn entry(event_type: AuditEventType, actor: Option<UserId>) -> AuditLogEntry {
		let mut builder = AuditLogEntry::builder(event_type)
			.ip_address("192.0.2.1")
			.user_agent(Some("curl/8.0".to_string()))
			.details(serde_json::json!({ "username": "alice" }));
		if let Some(actor) = actor {
			builder = builder.actor(actor);
		}
		builder.build()
	}

	#[tokio::test]
	async fn empty_table_returns_nothing() {
		let repo = AuditRepository::new(create_test_pool().await);
		let (logs, total) = repo.query_logs(&AuditQuery::default()).await.unwrap();
		assert!(logs.is_empty());
		assert_eq!(total, 0);
	}

	#[tokio::test]
	async fn stored_entry_reads_back() {
		let repo = AuditRepository::new(create_test_pool().await);
		let actor = UserId::generate();
		let original = entry(AuditEventType::Login, Some(actor));
		repo.insert_log(&original).await.unwrap();

		let (logs, total) = repo.query_logs(&AuditQuery::default()).await.unwrap();
		assert_eq!(total, 1);
		let stored = &logs[0];
		assert_eq!(stored.id, original.id);
		assert_eq!(stored.event_type, AuditEventType::Login);
		assert_eq!(stored.actor_user_id, Some(actor));
		assert_eq!(stored.user_agent.as_deref(), Some("curl/8.0"));
		assert_eq!(stored.details["username"], "alice");
	}

	#[tokio::test]
	async fn filters_by_event_type_and_actor() {
		let repo = AuditRepository::new(create_test_pool().await);
		let alice = UserId::generate();
		let bob = UserId::generate();
		repo.insert_log(&entry(AuditEventType::Login, Some(alice))).await.unwrap();
		repo.insert_log(&entry(AuditEventType::Logout, Some(alice))).await.unwrap();
		repo.insert_log(&entry(AuditEventType::Login, Some(bob))).await.unwrap();
		repo.insert_log(&entry(AuditEventType::LoginFailed, None)).await.unwrap();

		let logins = AuditQuery {
			event_type: Some(AuditEventType::Login),
			..Default::default()
		};
		assert_eq!(repo.query_logs(&logins).await.unwrap().1, 2);

		let alice_only = AuditQuery {
			actor_user_id: Some(alice),
			..Default::default()
		};
		let (logs, total) = repo.query_logs(&alice_only).await.unwrap();
		assert_eq!(total, 2);
		assert!(logs.iter().all(|l| l.actor_user_id == Some(alice)));
	}

	#[tokio::test]
	async fn pagination_reports_full_total() {
		let repo = AuditRepository::new(create_test_pool().await);
		for _ in 0..5 {
			repo.insert_log(&entry(AuditEventType::Registration, None)).await.unwrap();
		}
		let page = AuditQuery {
			limit: Some(2),
			offset: Some(4),
			..Default::default()
		};
		let (logs, total) = repo.query_logs(&page).await.unwrap();
		assert_eq!(logs.len(), 1);
		assert_eq!(total, 5);
	}
}
