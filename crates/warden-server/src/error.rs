// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server error types and HTTP response conversions.
//!
//! Every error body is `{"error": <snake_case code>, "message": <text>}`.
//! Storage and infrastructure failures are logged in full and reach the
//! client only as a generic message.

use axum::{
	extract::rejection::JsonRejection,
	http::{header, HeaderValue, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};
use warden_server_auth::AuthError;
use warden_server_db::DbError;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error(transparent)]
	Auth(#[from] AuthError),

	#[error(transparent)]
	Db(#[from] DbError),

	/// Registration limit reached for the caller's address.
	#[error("rate limited, retry after {retry_after_secs}s")]
	RateLimited { retry_after_secs: i64 },

	#[error("Invalid request: {0}")]
	BadRequest(String),

	#[error("Internal error: {0}")]
	Internal(String),
}

impl From<JsonRejection> for ServerError {
	fn from(rejection: JsonRejection) -> Self {
		tracing::debug!(status = %rejection.status(), "rejected request body");
		ServerError::Auth(AuthError::Validation(rejection.body_text()))
	}
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl ErrorResponse {
	pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			error: error.into(),
			message: message.into(),
		}
	}
}

impl ServerError {
	fn parts(&self) -> (StatusCode, ErrorResponse) {
		match self {
			ServerError::Auth(e) => {
				let status = StatusCode::from_u16(e.status_code())
					.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
				if e.is_internal() {
					tracing::error!(error = %e, "internal auth error");
					return (status, ErrorResponse::new(e.code(), INTERNAL_MESSAGE));
				}
				(status, ErrorResponse::new(e.code(), e.to_string()))
			}
			ServerError::Db(e) => match e {
				DbError::Conflict(column) => (
					StatusCode::BAD_REQUEST,
					ErrorResponse::new("duplicate", format!("{column} already registered")),
				),
				DbError::NotFound(what) => (
					StatusCode::NOT_FOUND,
					ErrorResponse::new("not_found", format!("{what} not found")),
				),
				DbError::UnknownRole(role) => (
					StatusCode::BAD_REQUEST,
					ErrorResponse::new("validation_error", format!("unknown role: {role}")),
				),
				DbError::UnknownPermission(permission) => (
					StatusCode::BAD_REQUEST,
					ErrorResponse::new(
						"validation_error",
						format!("unknown permission: {permission}"),
					),
				),
				DbError::Protected(message) => (
					StatusCode::BAD_REQUEST,
					ErrorResponse::new("validation_error", message.clone()),
				),
				DbError::Sqlx(_) | DbError::Internal(_) | DbError::Serialization(_) => {
					tracing::error!(error = %e, "database error");
					(
						StatusCode::INTERNAL_SERVER_ERROR,
						ErrorResponse::new("internal_error", INTERNAL_MESSAGE),
					)
				}
			},
			ServerError::RateLimited { .. } => (
				StatusCode::TOO_MANY_REQUESTS,
				ErrorResponse::new("rate_limited", AuthError::RateLimited.to_string()),
			),
			ServerError::BadRequest(message) => (
				StatusCode::BAD_REQUEST,
				ErrorResponse::new("bad_request", message.clone()),
			),
			ServerError::Internal(message) => {
				tracing::error!(error = %message, "internal error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					ErrorResponse::new("internal_error", INTERNAL_MESSAGE),
				)
			}
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, body) = self.parts();
		let mut response = (status, Json(body)).into_response();
		let headers = response.headers_mut();
		if status == StatusCode::UNAUTHORIZED {
			headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
		}
		if let ServerError::RateLimited { retry_after_secs } = self {
			if let Ok(value) = HeaderValue::from_str(&retry_after_secs.max(1).to_string()) {
				headers.insert(header::RETRY_AFTER, value);
			}
		}
		response
	}
}
