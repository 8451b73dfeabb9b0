// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Timestamp encoding for TEXT columns.
//!
//! Values are written as RFC 3339 in UTC. On read, any offset is converted to
//! UTC and offset-less values are taken to already be UTC.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::DbError;

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>, DbError> {
	if let Ok(at) = DateTime::parse_from_rfc3339(value) {
		return Ok(at.with_timezone(&Utc));
	}
	NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
		.or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
		.map(|naive| naive.and_utc())
		.map_err(|e| DbError::Internal(format!("Invalid {field}: {e}")))
}
