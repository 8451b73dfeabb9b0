// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Current-user and user administration endpoints.

use axum::{
	extract::{Path, Query, State},
	Json,
};
use serde::{Deserialize, Serialize};
use warden_common_secret::SecretString;
use warden_server_auth::{
	check_can_update_user, validate_email, validate_username, AuditEventType, AuditLogEntry,
	AuthError, PrivilegedChanges, UserId, UserProfile,
};
use warden_server_db::UserUpdate;

use crate::api::AppState;
use crate::audit;
use crate::auth_middleware::RequireAuth;
use crate::client_info::ClientInfo;
use crate::error::ServerError;
use crate::extract::ApiJson;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
	#[serde(flatten)]
	pub profile: UserProfile,
	/// Union of the permissions granted by the user's roles, sorted.
	pub permissions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
	pub username: Option<String>,
	pub email: Option<String>,
	pub password: Option<SecretString>,
	pub roles: Option<Vec<String>>,
	pub is_active: Option<bool>,
	pub is_superuser: Option<bool>,
}

impl UpdateUserRequest {
	fn privileged_changes(&self) -> PrivilegedChanges {
		PrivilegedChanges {
			roles: self.roles.is_some(),
			is_active: self.is_active.is_some(),
			is_superuser: self.is_superuser.is_some(),
		}
	}

	fn is_empty(&self) -> bool {
		self.username.is_none()
			&& self.email.is_none()
			&& self.password.is_none()
			&& !self.privileged_changes().any()
	}
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
	pub offset: Option<i64>,
	pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListUsersResponse {
	pub users: Vec<UserProfile>,
	pub total: i64,
	pub offset: i64,
	pub limit: i64,
}

fn parse_user_id(raw: &str) -> Result<UserId, ServerError> {
	raw.parse::<UserId>()
		.map_err(|_| ServerError::BadRequest(format!("invalid user id: {raw}")))
}

/// GET /me - the caller's public fields and effective permissions.
#[tracing::instrument(skip_all)]
pub async fn me(RequireAuth(current): RequireAuth) -> Json<MeResponse> {
	let permissions = current.user.effective_permissions().into_iter().collect();
	Json(MeResponse {
		profile: UserProfile::from(&current.user),
		permissions,
	})
}

/// PUT /users/{id} - partial update.
///
/// A user may update their own username, email and password. Roles and
/// account flags, and other users' records, need a superuser.
///
/// # Errors
/// - 400: Invalid id, invalid field, empty update, duplicate, unknown role
/// - 401: Not authenticated
/// - 403: Neither the target nor a superuser, or a privileged field changed
/// - 404: User not found
#[tracing::instrument(skip(state, current, client, payload), fields(%id))]
pub async fn update_user(
	State(state): State<AppState>,
	RequireAuth(current): RequireAuth,
	client: ClientInfo,
	Path(id): Path<String>,
	ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserProfile>, ServerError> {
	let target = parse_user_id(&id)?;

	if let Err(e) = check_can_update_user(&current.user, target, payload.privileged_changes()) {
		let entry = AuditLogEntry::builder(AuditEventType::AccessDenied)
			.actor(current.id())
			.resource("user", target.to_string())
			.action("update_user")
			.ip_address(client.ip_address)
			.user_agent(client.user_agent)
			.details(serde_json::json!({ "reason": e.to_string() }))
			.build();
		audit::record(&state, entry).await;
		return Err(e.into());
	}

	if payload.is_empty() {
		return Err(ServerError::BadRequest("no fields to update".to_string()));
	}
	if let Some(username) = &payload.username {
		validate_username(username)?;
	}
	if let Some(email) = &payload.email {
		validate_email(email)?;
	}

	let password_hash = match payload.password {
		Some(password) => {
			state
				.password_policy
				.validate(password.expose())
				.map_err(AuthError::from)?;
			Some(state.hasher.hash_blocking(password).await?)
		}
		None => None,
	};

	let update = UserUpdate {
		username: payload.username,
		email: payload.email,
		password_hash,
		roles: payload.roles,
		is_active: payload.is_active,
		is_superuser: payload.is_superuser,
	};
	let fields = update.changed_fields();
	let user = state.user_repo.update_user(&target, update).await?;

	let entry = AuditLogEntry::builder(AuditEventType::UserUpdated)
		.actor(current.id())
		.resource("user", user.id.to_string())
		.action("update_user")
		.ip_address(client.ip_address)
		.user_agent(client.user_agent)
		.details(serde_json::json!({ "fields": fields }))
		.build();
	audit::record(&state, entry).await;

	Ok(Json(UserProfile::from(&user)))
}

/// DELETE /users/{id} - remove an account. Requires the `auth` permission.
#[tracing::instrument(skip(state, current, client), fields(%id))]
pub async fn delete_user(
	State(state): State<AppState>,
	RequireAuth(current): RequireAuth,
	client: ClientInfo,
	Path(id): Path<String>,
) -> Result<Json<UserProfile>, ServerError> {
	let target = parse_user_id(&id)?;
	let user = state.user_repo.delete_user(&target).await?;

	let entry = AuditLogEntry::builder(AuditEventType::UserDeleted)
		.actor(current.id())
		.resource("user", user.id.to_string())
		.action("delete_user")
		.ip_address(client.ip_address)
		.user_agent(client.user_agent)
		.details(serde_json::json!({ "username": user.username }))
		.build();
	audit::record(&state, entry).await;

	tracing::info!(user_id = %user.id, deleted_by = %current.id(), "user deleted");
	Ok(Json(UserProfile::from(&user)))
}

/// GET /users - paginated listing. Requires the `auth` permission.
#[tracing::instrument(skip(state, _current))]
pub async fn list_users(
	State(state): State<AppState>,
	RequireAuth(_current): RequireAuth,
	Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListUsersResponse>, ServerError> {
	let offset = query.offset.unwrap_or(0).max(0);
	let limit = query
		.limit
		.unwrap_or(DEFAULT_PAGE_SIZE)
		.clamp(1, MAX_PAGE_SIZE);

	let users = state.user_repo.list_users(offset, limit).await?;
	let total = state.user_repo.count_users().await?;

	Ok(Json(ListUsersResponse {
		users: users.iter().map(UserProfile::from).collect(),
		total,
		offset,
		limit,
	}))
}
