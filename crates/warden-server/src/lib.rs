// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden HTTP server.
//!
//! Wires the auth primitives from `warden-server-auth` and the stores from
//! `warden-server-db` into an axum router.

pub mod api;
pub mod audit;
pub mod auth_middleware;
pub mod client_info;
pub mod error;
pub mod extract;
pub mod routes;

pub use api::{create_app_state, create_router, AppState};
pub use error::{ErrorResponse, ServerError};
pub use warden_server_config::ServerConfig;

#[cfg(test)]
pub(crate) mod test_support {
	use warden_server_auth::{HasherParams, User};
	use warden_server_config::ServerConfigLayer;
	use warden_server_db::NewUser;

	use crate::api::{create_app_state, AppState};

	pub const TEST_PASSWORD: &str = "Corr3ct-Horse!";

	pub async fn test_state() -> AppState {
		let pool = warden_server_db::testing::create_seeded_test_pool().await;
		let mut config = warden_server_config::finalize(ServerConfigLayer::default()).unwrap();
		config.auth.hasher = HasherParams::insecure_fast();
		create_app_state(pool, &config)
	}

	pub async fn create_user(state: &AppState, username: &str, roles: &[&str]) -> User {
		let password_hash = state.hasher.hash(&TEST_PASSWORD.into()).unwrap();
		state
			.user_repo
			.create_user(NewUser {
				username: username.to_string(),
				email: format!("{username}@example.com"),
				password_hash,
				roles: roles.iter().map(|r| r.to_string()).collect(),
				is_superuser: false,
			})
			.await
			.unwrap()
	}
}
