// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
	body::Body,
	extract::ConnectInfo,
	http::{header, HeaderMap, Method, Request, StatusCode},
	Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use warden_server::{create_app_state, create_router, AppState};
use warden_server_auth::{HasherParams, User};
use warden_server_config::ServerConfigLayer;
use warden_server_db::{NewUser, RoleRepository};

pub const PASSWORD: &str = "Corr3ct-Horse!";
pub const DEFAULT_IP: &str = "198.51.100.1";

pub struct TestApp {
	pub router: Router,
	pub state: AppState,
	_dir: TempDir,
}

pub struct TestResponse {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Value,
}

impl TestApp {
	pub async fn new() -> Self {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite://{}", dir.path().join("warden.db").display());
		let pool = warden_server_db::create_pool(&url).await.unwrap();
		warden_server_db::run_migrations(&pool).await.unwrap();

		let mut config = warden_server_config::finalize(ServerConfigLayer::default()).unwrap();
		config.auth.hasher = HasherParams::insecure_fast();
		RoleRepository::new(pool.clone())
			.initialize_defaults(&config.rbac)
			.await
			.unwrap();

		let state = create_app_state(pool, &config);
		Self {
			router: create_router(state.clone()),
			state,
			_dir: dir,
		}
	}

	pub async fn request(
		&self,
		method: Method,
		uri: &str,
		token: Option<&str>,
		body: Option<Value>,
		ip: &str,
	) -> TestResponse {
		let mut builder = Request::builder().method(method).uri(uri);
		if let Some(token) = token {
			builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
		}
		let body = match body {
			Some(json) => {
				builder = builder.header(header::CONTENT_TYPE, "application/json");
				Body::from(json.to_string())
			}
			None => Body::empty(),
		};
		let mut request = builder.body(body).unwrap();
		let peer: SocketAddr = format!("{ip}:40000").parse().unwrap();
		request.extensions_mut().insert(ConnectInfo(peer));

		let response = self.router.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let headers = response.headers().clone();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let body = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		TestResponse {
			status,
			headers,
			body,
		}
	}

	pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
		self.request(Method::GET, uri, token, None, DEFAULT_IP).await
	}

	pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
		self.request(Method::POST, uri, token, Some(body), DEFAULT_IP)
			.await
	}

	pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
		self.request(Method::PUT, uri, token, Some(body), DEFAULT_IP)
			.await
	}

	pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
		self.request(Method::DELETE, uri, token, None, DEFAULT_IP)
			.await
	}

	/// Registers through the HTTP surface from `ip`.
	pub async fn register(&self, username: &str, ip: &str) -> TestResponse {
		let body = serde_json::json!({
			"username": username,
			"email": format!("{username}@example.com"),
			"password": PASSWORD,
		});
		self.request(Method::POST, "/register", None, Some(body), ip)
			.await
	}

	/// Creates a user directly in storage, bypassing the limiter.
	pub async fn seed_user(&self, username: &str, roles: &[&str], is_superuser: bool) -> User {
		let password_hash = self.state.hasher.hash(&PASSWORD.into()).unwrap();
		self.state
			.user_repo
			.create_user(NewUser {
				username: username.to_string(),
				email: format!("{username}@example.com"),
				password_hash,
				roles: roles.iter().map(|r| r.to_string()).collect(),
				is_superuser,
			})
			.await
			.unwrap()
	}

	pub async fn login(&self, username: &str) -> String {
		let response = self
			.post(
				"/token",
				None,
				serde_json::json!({ "username": username, "password": PASSWORD }),
			)
			.await;
		assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
		response.body["access_token"].as_str().unwrap().to_string()
	}
}
