// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	/// A unique column collided; the payload names the column.
	#[error("Conflict: {0} already exists")]
	Conflict(String),

	#[error("Protected: {0}")]
	Protected(String),

	#[error("Unknown role: {0}")]
	UnknownRole(String),

	#[error("Unknown permission: {0}")]
	UnknownPermission(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Maps a UNIQUE violation on `table.column` to [`DbError::Conflict`].
pub(crate) fn map_unique_violation(err: sqlx::Error, table: &str, columns: &[&str]) -> DbError {
	if let sqlx::Error::Database(db_err) = &err {
		if db_err.is_unique_violation() {
			let message = db_err.message();
			let column = columns
				.iter()
				.find(|c| message.contains(&format!("{table}.{c}")))
				.copied()
				.unwrap_or("record");
			return DbError::Conflict(column.to_string());
		}
	}
	DbError::Sqlx(err)
}
