// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only view of the role catalog. Requires the `auth` permission.

use axum::{extract::State, Json};
use warden_server_auth::{PermissionDef, Role};

use crate::api::AppState;
use crate::error::ServerError;

/// GET /roles - every role with its permissions, ordered by name.
#[tracing::instrument(skip(state))]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ServerError> {
	Ok(Json(state.role_repo.list_roles().await?))
}

/// GET /permissions - every declared permission, ordered by name.
#[tracing::instrument(skip(state))]
pub async fn list_permissions(
	State(state): State<AppState>,
) -> Result<Json<Vec<PermissionDef>>, ServerError> {
	Ok(Json(state.role_repo.list_permissions().await?))
}
