// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router construction.

use std::sync::Arc;

use axum::{
	middleware::from_fn_with_state,
	routing::{delete, get, post, put},
	Router,
};
use sqlx::SqlitePool;
use warden_server_auth::token::MAX_ACCESS_TOKEN_TTL_MINUTES;
use warden_server_auth::{
	PasswordHasher, PasswordPolicy, RateLimitPolicy, TokenService, AUTH_PERMISSION,
};
use warden_server_config::ServerConfig;
use warden_server_db::{
	AuditRepository, RegistrationAttemptRepository, RoleRepository, UserRepository,
};

use crate::auth_middleware::{auth_layer, require_layer, RouteRequirement};
use crate::routes;

#[derive(Clone)]
pub struct AppState {
	pub pool: SqlitePool,
	pub user_repo: Arc<UserRepository>,
	pub role_repo: Arc<RoleRepository>,
	pub registration_repo: Arc<RegistrationAttemptRepository>,
	pub audit_repo: Arc<AuditRepository>,
	pub tokens: Arc<TokenService>,
	pub password_policy: Arc<PasswordPolicy>,
	pub hasher: PasswordHasher,
	pub rate_limit: RateLimitPolicy,
	/// Whether forwarding headers may be used as the client address.
	pub trust_proxy_headers: bool,
}

/// Builds the shared state from a pool that already has migrations applied.
pub fn create_app_state(pool: SqlitePool, config: &ServerConfig) -> AppState {
	let tokens = TokenService::new(
		&config.auth.secret,
		config.auth.algorithm,
		chrono::Duration::minutes(
			config
				.auth
				.access_token_ttl_minutes
				.clamp(0, MAX_ACCESS_TOKEN_TTL_MINUTES),
		),
	);

	AppState {
		user_repo: Arc::new(UserRepository::new(pool.clone())),
		role_repo: Arc::new(RoleRepository::new(pool.clone())),
		registration_repo: Arc::new(RegistrationAttemptRepository::new(pool.clone())),
		audit_repo: Arc::new(AuditRepository::new(pool.clone())),
		pool,
		tokens: Arc::new(tokens),
		password_policy: Arc::new(config.password.clone()),
		hasher: PasswordHasher::new(config.auth.hasher),
		rate_limit: config.rate_limit,
		trust_proxy_headers: config.http.trust_proxy_headers,
	}
}

pub fn create_router(state: AppState) -> Router {
	let user_admin = RouteRequirement::permission(&state, AUTH_PERMISSION);

	Router::new()
		.route("/health/check", get(routes::health::health_check))
		.route("/register", post(routes::auth::register))
		.route("/token", post(routes::auth::login))
		.route("/token/refresh", post(routes::auth::refresh))
		.route("/logout", post(routes::auth::logout))
		.route("/me", get(routes::users::me))
		.route(
			"/users",
			get(routes::users::list_users)
				.route_layer(from_fn_with_state(user_admin.clone(), require_layer)),
		)
		.route(
			"/roles",
			get(routes::roles::list_roles)
				.route_layer(from_fn_with_state(user_admin.clone(), require_layer)),
		)
		.route(
			"/permissions",
			get(routes::roles::list_permissions)
				.route_layer(from_fn_with_state(user_admin.clone(), require_layer)),
		)
		.route(
			"/users/{id}",
			put(routes::users::update_user).merge(
				delete(routes::users::delete_user)
					.route_layer(from_fn_with_state(user_admin, require_layer)),
			),
		)
		.layer(from_fn_with_state(state.clone(), auth_layer))
		.with_state(state)
}
