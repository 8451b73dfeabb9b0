// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health check endpoint.

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::api::AppState;

const DB_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Overall status reported to callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
	Ok,
	Degraded,
}

/// Per-component status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceHealth {
	pub database: HealthStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: OverallStatus,
	pub services: ServiceHealth,
	pub message: String,
}

pub async fn check_database(state: &AppState) -> HealthStatus {
	match timeout(DB_CHECK_TIMEOUT, warden_server_db::ping(&state.pool)).await {
		Ok(Ok(())) => HealthStatus::Healthy,
		Ok(Err(e)) => {
			tracing::error!(error = %e, "database health check failed");
			HealthStatus::Unhealthy
		}
		Err(_) => {
			tracing::error!("database health check timed out");
			HealthStatus::Unhealthy
		}
	}
}

/// GET /health/check - 200 when storage answers, 503 otherwise.
#[tracing::instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
	let database = check_database(&state).await;
	let (status_code, status, message) = match database {
		HealthStatus::Healthy => (StatusCode::OK, OverallStatus::Ok, "All services are healthy"),
		HealthStatus::Unhealthy => (
			StatusCode::SERVICE_UNAVAILABLE,
			OverallStatus::Degraded,
			"Database is unavailable",
		),
	};

	(
		status_code,
		Json(HealthResponse {
			status,
			services: ServiceHealth { database },
			message: message.to_string(),
		}),
	)
}
