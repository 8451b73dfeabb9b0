// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sliding-window limit on registrations per source address.
//!
//! This module holds the pure transition function. Storage applies it inside
//! a transaction that holds the write lock for the address's row, so two
//! concurrent attempts can never both see the same count.
//!
//! ```text
//! NoRecord ───────────────────────────────► allow, count = 1
//! WindowExpired (now - last > window) ────► allow, count = 1
//! WithinWindowUnderLimit (count < max) ───► allow, count += 1
//! WithinWindowAtLimit (count >= max) ─────► deny, record unchanged
//! ```
//!
//! All instants are converted to UTC before comparison.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
	pub max_attempts: u32,
	pub window_secs: u64,
}

impl Default for RateLimitPolicy {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			window_secs: DEFAULT_WINDOW_SECS,
		}
	}
}

/// Stored state for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
	pub last_attempt_at: DateTime<Utc>,
	pub attempt_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
	NoRecord,
	WithinWindowUnderLimit,
	WithinWindowAtLimit,
	WindowExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// Proceed, and persist `record` as the new state.
	Allow { record: AttemptRecord },
	/// Refuse; the stored record must not change.
	Deny { retry_after: Duration },
}

impl RateLimitDecision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, RateLimitDecision::Allow { .. })
	}
}

impl RateLimitPolicy {
	pub fn window(&self) -> Duration {
		i64::try_from(self.window_secs)
			.ok()
			.and_then(Duration::try_seconds)
			.unwrap_or(Duration::MAX)
	}

	pub fn classify(&self, record: Option<&AttemptRecord>, now: DateTime<Utc>) -> WindowState {
		match record {
			None => WindowState::NoRecord,
			Some(r) if now - r.last_attempt_at > self.window() => WindowState::WindowExpired,
			Some(r) if r.attempt_count < self.max_attempts => WindowState::WithinWindowUnderLimit,
			Some(_) => WindowState::WithinWindowAtLimit,
		}
	}

	/// Decides an attempt made at `now`, in any timezone.
	pub fn evaluate<Tz: TimeZone>(
		&self,
		record: Option<&AttemptRecord>,
		now: DateTime<Tz>,
	) -> RateLimitDecision {
		let now = now.with_timezone(&Utc);
		let fresh = AttemptRecord {
			last_attempt_at: now,
			attempt_count: 1,
		};

		match (self.classify(record, now), record) {
			(WindowState::NoRecord | WindowState::WindowExpired, _) => {
				RateLimitDecision::Allow { record: fresh }
			}
			(WindowState::WithinWindowUnderLimit, Some(r)) => RateLimitDecision::Allow {
				record: AttemptRecord {
					last_attempt_at: now,
					attempt_count: r.attempt_count.saturating_add(1),
				},
			},
			(WindowState::WithinWindowAtLimit, Some(r)) => {
				// The window closes once strictly more than `window` has passed.
				let elapsed = now - r.last_attempt_at;
				let retry_after = self
					.window()
					.checked_sub(&elapsed)
					.and_then(|d| d.checked_add(&Duration::seconds(1)))
					.unwrap_or(Duration::MAX);
				RateLimitDecision::Deny {
					retry_after: retry_after.max(Duration::seconds(1)),
				}
			}
			(_, None) => RateLimitDecision::Allow { record: fresh },
		}
	}
}
