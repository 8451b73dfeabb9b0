// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registration, token issuance and logout.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use warden_common_secret::SecretString;
use warden_server_auth::{
	validate_email, validate_username, AuditEventType, AuditLogEntry, AuthError, RateLimitDecision,
	User, UserId, UserProfile, TOKEN_TYPE_BEARER,
};
use warden_server_db::NewUser;

use crate::api::AppState;
use crate::audit;
use crate::auth_middleware::{OptionalAuth, RequireAuth};
use crate::client_info::ClientInfo;
use crate::error::ServerError;
use crate::extract::ApiJson;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
	pub username: String,
	pub email: String,
	pub password: SecretString,
	/// Only honored when the caller is an authenticated superuser.
	#[serde(default)]
	pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub username: String,
	pub password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
	pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
	pub access_token: String,
	pub token_type: String,
	pub id: UserId,
}

impl TokenResponse {
	fn bearer(access_token: String, user: &User) -> Self {
		Self {
			access_token,
			token_type: TOKEN_TYPE_BEARER.to_string(),
			id: user.id,
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
	pub message: String,
}

/// POST /register - create an account.
///
/// # Errors
/// - 400: Invalid username, email or password, duplicate account, unknown role
/// - 403: Roles requested by a caller who is not a superuser
/// - 429: Too many registrations from this address
#[tracing::instrument(
	skip(state, caller, client, payload),
	fields(username = %payload.username, ip = %client.ip_address)
)]
pub async fn register(
	State(state): State<AppState>,
	OptionalAuth(caller): OptionalAuth,
	client: ClientInfo,
	ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ServerError> {
	let decision = state
		.registration_repo
		.check_and_record(&client.ip_address, Utc::now(), &state.rate_limit)
		.await?;
	if let RateLimitDecision::Deny { retry_after } = decision {
		tracing::info!(retry_after_secs = retry_after.num_seconds(), "registration rate limited");
		let entry = AuditLogEntry::builder(AuditEventType::RegistrationRateLimited)
			.action("register")
			.ip_address(client.ip_address)
			.user_agent(client.user_agent)
			.details(serde_json::json!({ "username": payload.username }))
			.build();
		audit::record(&state, entry).await;
		return Err(ServerError::RateLimited {
			retry_after_secs: retry_after.num_seconds(),
		});
	}

	let caller_is_superuser = caller.as_ref().is_some_and(|c| c.user.is_superuser);
	if !payload.roles.is_empty() && !caller_is_superuser {
		return Err(
			AuthError::Forbidden("only a superuser may assign roles at registration".to_string())
				.into(),
		);
	}

	validate_username(&payload.username)?;
	validate_email(&payload.email)?;
	state
		.password_policy
		.validate(payload.password.expose())
		.map_err(AuthError::from)?;

	let password_hash = state.hasher.hash_blocking(payload.password).await?;
	let user = state
		.user_repo
		.create_user(NewUser {
			username: payload.username,
			email: payload.email,
			password_hash,
			roles: payload.roles,
			is_superuser: false,
		})
		.await?;

	let entry = AuditLogEntry::builder(AuditEventType::Registration)
		.actor(caller.as_ref().map_or(user.id, |c| c.id()))
		.resource("user", user.id.to_string())
		.action("register")
		.ip_address(client.ip_address)
		.user_agent(client.user_agent)
		.details(serde_json::json!({ "roles": user.role_names() }))
		.build();
	audit::record(&state, entry).await;

	tracing::info!(user_id = %user.id, "user registered");
	Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

/// POST /token - exchange a username and password for an access token.
///
/// Unknown users, wrong passwords and inactive accounts all produce the same
/// 401 body.
#[tracing::instrument(skip(state, client, payload), fields(username = %payload.username))]
pub async fn login(
	State(state): State<AppState>,
	client: ClientInfo,
	ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ServerError> {
	if payload.username.is_empty() || payload.password.expose().is_empty() {
		return Err(AuthError::Validation("username and password are required".to_string()).into());
	}

	let user = state.user_repo.get_user_by_username(&payload.username).await?;
	let failure = match &user {
		None => {
			state.hasher.verify_unknown_blocking(payload.password).await;
			Some("unknown_user")
		}
		Some(user) => {
			let verified = state
				.hasher
				.verify_blocking(payload.password, user.password_hash.clone())
				.await;
			if !verified {
				Some("bad_password")
			} else if !user.is_active {
				Some("inactive")
			} else {
				None
			}
		}
	};

	let user = match (user, failure) {
		(Some(user), None) => user,
		(user, reason) => {
			let mut builder = AuditLogEntry::builder(AuditEventType::LoginFailed)
				.action("login")
				.ip_address(client.ip_address)
				.user_agent(client.user_agent)
				.details(serde_json::json!({
					"username": payload.username,
					"reason": reason,
				}));
			if let Some(user) = user {
				builder = builder.actor(user.id);
			}
			audit::record(&state, builder.build()).await;
			return Err(AuthError::InvalidCredentials.into());
		}
	};

	let access_token = state.tokens.issue(&user.username)?;
	let entry = AuditLogEntry::builder(AuditEventType::Login)
		.actor(user.id)
		.resource("user", user.id.to_string())
		.action("login")
		.ip_address(client.ip_address)
		.user_agent(client.user_agent)
		.build();
	audit::record(&state, entry).await;

	Ok(Json(TokenResponse::bearer(access_token, &user)))
}

/// POST /token/refresh - trade a still-valid token for a fresh one.
///
/// # Errors
/// - 401: Expired or invalid token, or the account is gone or inactive
#[tracing::instrument(skip(state, client, payload))]
pub async fn refresh(
	State(state): State<AppState>,
	client: ClientInfo,
	ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<TokenResponse>, ServerError> {
	let user_repo = state.user_repo.clone();
	let (access_token, user) = state
		.tokens
		.refresh(&payload.token, move |subject| async move {
			match user_repo.get_user_by_username(&subject).await {
				Ok(Some(user)) if user.is_active => Ok(Some(user)),
				Ok(_) => Ok(None),
				Err(e) => Err(AuthError::Internal(e.to_string())),
			}
		})
		.await?;

	let entry = AuditLogEntry::builder(AuditEventType::TokenRefreshed)
		.actor(user.id)
		.resource("user", user.id.to_string())
		.action("refresh")
		.ip_address(client.ip_address)
		.user_agent(client.user_agent)
		.build();
	audit::record(&state, entry).await;

	Ok(Json(TokenResponse::bearer(access_token, &user)))
}

/// POST /logout - record the logout.
///
/// Tokens are stateless; the presented token stays valid until it expires.
#[tracing::instrument(skip_all, fields(user_id = %current.id()))]
pub async fn logout(
	State(state): State<AppState>,
	RequireAuth(current): RequireAuth,
	client: ClientInfo,
) -> Json<MessageResponse> {
	let entry = AuditLogEntry::builder(AuditEventType::Logout)
		.actor(current.id())
		.resource("user", current.id().to_string())
		.action("logout")
		.ip_address(client.ip_address)
		.user_agent(client.user_agent)
		.details(serde_json::json!({ "token_fingerprint": current.token_fingerprint }))
		.build();
	audit::record(&state, entry).await;

	Json(MessageResponse {
		message: "Successfully logged out".to_string(),
	})
}
