// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-address registration attempt records.
//!
//! `check_and_record` runs the whole read-decide-write cycle in one
//! transaction. Its first statement is a write (`INSERT OR IGNORE` of a
//! zero-count placeholder), so the transaction holds SQLite's write lock
//! before it reads the count. Concurrent attempts from the same address wait
//! on the busy timeout and then observe the committed state.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use warden_server_auth::{AttemptRecord, RateLimitDecision, RateLimitPolicy};

use crate::error::{DbError, Result};
use crate::time::{format_timestamp, parse_timestamp};

#[async_trait]
pub trait RegistrationAttemptStore: Send + Sync {
	/// Decides an attempt from `ip` at `now` and persists the allowed outcome.
	async fn check_and_record(
		&self,
		ip: &str,
		now: DateTime<Utc>,
		policy: &RateLimitPolicy,
	) -> Result<RateLimitDecision>;

	async fn get_attempt(&self, ip: &str) -> Result<Option<AttemptRecord>>;
}

#[derive(Clone)]
pub struct RegistrationAttemptRepository {
	pool: SqlitePool,
}

impl RegistrationAttemptRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, now, policy))]
	pub async fn check_and_record<Tz: TimeZone>(
		&self,
		ip: &str,
		now: DateTime<Tz>,
		policy: &RateLimitPolicy,
	) -> Result<RateLimitDecision> {
		let now = now.with_timezone(&Utc);
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			"INSERT OR IGNORE INTO registration_attempts (ip_address, last_attempt_at, attempt_count) \
			 VALUES (?, ?, 0)",
		)
		.bind(ip)
		.bind(format_timestamp(now))
		.execute(&mut *tx)
		.await?;

		let row = sqlx::query(
			"SELECT last_attempt_at, attempt_count FROM registration_attempts WHERE ip_address = ?",
		)
		.bind(ip)
		.fetch_one(&mut *tx)
		.await?;
		let record = row_to_record(&row)?;

		let decision = policy.evaluate(record.as_ref(), now);
		match decision {
			RateLimitDecision::Allow { record } => {
				sqlx::query(
					"UPDATE registration_attempts SET last_attempt_at = ?, attempt_count = ? \
					 WHERE ip_address = ?",
				)
				.bind(format_timestamp(record.last_attempt_at))
				.bind(i64::from(record.attempt_count))
				.bind(ip)
				.execute(&mut *tx)
				.await?;
				tx.commit().await?;
				tracing::debug!(attempt_count = record.attempt_count, "registration attempt recorded");
			}
			RateLimitDecision::Deny { retry_after } => {
				tx.rollback().await?;
				tracing::debug!(
					retry_after_secs = retry_after.num_seconds(),
					"registration attempt over limit"
				);
			}
		}
		Ok(decision)
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_attempt(&self, ip: &str) -> Result<Option<AttemptRecord>> {
		let row = sqlx::query(
			"SELECT last_attempt_at, attempt_count FROM registration_attempts WHERE ip_address = ?",
		)
		.bind(ip)
		.fetch_optional(&self.pool)
		.await?;
		match row {
			Some(row) => row_to_record(&row),
			None => Ok(None),
		}
	}
}

#[async_trait]
impl RegistrationAttemptStore for RegistrationAttemptRepository {
	async fn check_and_record(
		&self,
		ip: &str,
		now: DateTime<Utc>,
		policy: &RateLimitPolicy,
	) -> Result<RateLimitDecision> {
		self.check_and_record(ip, now, policy).await
	}

	async fn get_attempt(&self, ip: &str) -> Result<Option<AttemptRecord>> {
		self.get_attempt(ip).await
	}
}

/// A zero count is the placeholder written before the first decision.
fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<Option<AttemptRecord>> {
	let count: i64 = row.get("attempt_count");
	if count <= 0 {
		return Ok(None);
	}
	let attempt_count = u32::try_from(count)
		.map_err(|_| DbError::Internal(format!("attempt_count out of range: {count}")))?;
	let last: String = row.get("last_attempt_at");
	Ok(Some(AttemptRecord {
		last_attempt_at: parse_timestamp(&last, "last_attempt_at")?,
		attempt_count,
	}))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use chrono::{Duration, FixedOffset};

	fn policy() -> RateLimitPolicy {
		RateLimitPolicy {
			max_attempts: 3,
			window_secs: 24 * 60 * 60,
		}
	}

	fn t0() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
	}

	#[tokio::test]
	async fn fourth_attempt_in_window_is_denied_without_touching_record() {
		let repo = RegistrationAttemptRepository::new(create_test_pool().await);
		let ip = "203.0.113.7";

		for i in 0..3 {
			let decision = repo
				.check_and_record(ip, t0() + Duration::minutes(i), &policy())
				.await
				.unwrap();
			assert!(decision.is_allowed(), "attempt {i} should pass");
		}
		let before = repo.get_attempt(ip).await.unwrap().unwrap();
		assert_eq!(before.attempt_count, 3);

		let decision = repo
			.check_and_record(ip, t0() + Duration::hours(1), &policy())
			.await
			.unwrap();
		assert!(matches!(decision, RateLimitDecision::Deny { .. }));
		assert_eq!(repo.get_attempt(ip).await.unwrap(), Some(before));
	}

	#[tokio::test]
	async fn window_expiry_resets_count() {
		let repo = RegistrationAttemptRepository::new(create_test_pool().await);
		let ip = "203.0.113.8";
		for _ in 0..3 {
			repo.check_and_record(ip, t0(), &policy()).await.unwrap();
		}

		let exactly_window = t0() + Duration::hours(24);
		assert!(!repo
			.check_and_record(ip, exactly_window, &policy())
			.await
			.unwrap()
			.is_allowed());

		let later = t0() + Duration::hours(24) + Duration::seconds(1);
		assert!(repo.check_and_record(ip, later, &policy()).await.unwrap().is_allowed());
		let record = repo.get_attempt(ip).await.unwrap().unwrap();
		assert_eq!(record.attempt_count, 1);
		assert_eq!(record.last_attempt_at, later);
	}

	#[tokio::test]
	async fn addresses_are_independent() {
		let repo = RegistrationAttemptRepository::new(create_test_pool().await);
		for _ in 0..3 {
			repo.check_and_record("198.51.100.1", t0(), &policy()).await.unwrap();
		}
		assert!(repo
			.check_and_record("198.51.100.2", t0(), &policy())
			.await
			.unwrap()
			.is_allowed());
		assert!(repo.get_attempt("198.51.100.3").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn offset_timestamps_are_stored_as_utc() {
		let repo = RegistrationAttemptRepository::new(create_test_pool().await);
		let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
		let local = t0().with_timezone(&tokyo);
		repo.check_and_record("192.0.2.1", local, &policy()).await.unwrap();

		let record = repo.get_attempt("192.0.2.1").await.unwrap().unwrap();
		assert_eq!(record.last_attempt_at, t0());
	}

	#[tokio::test]
	async fn concurrent_attempts_never_exceed_limit() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}?mode=rwc", dir.path().join("limit.db").display());
		let pool = crate::pool::create_pool(&url).await.unwrap();
		crate::run_migrations(&pool).await.unwrap();
		let repo = RegistrationAttemptRepository::new(pool);

		let now = Utc::now();
		let attempts = (0..10).map(|_| {
			let repo = repo.clone();
			async move { repo.check_and_record("192.0.2.50", now, &policy()).await }
		});
		let results = futures::future::join_all(attempts).await;

		let allowed = results
			.into_iter()
			.map(|r| r.unwrap())
			.filter(RateLimitDecision::is_allowed)
			.count();
		assert_eq!(allowed, 3);
		let record = repo.get_attempt("192.0.2.50").await.unwrap().unwrap();
		assert_eq!(record.attempt_count, 3);
	}
}
