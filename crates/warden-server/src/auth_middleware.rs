// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication middleware and extractors.
//!
//! [`auth_layer`] runs on every request. It resolves a bearer token into an
//! [`AuthContext`] and stores it in the request extensions; it never rejects.
//! Handlers then decide with [`RequireAuth`] (401 when absent) or
//! [`OptionalAuth`]. Route-level permission and role checks are applied with
//! [`require_layer`], which answers 401 without an identity and 403 when the
//! identity lacks the requirement.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
	body::Body,
	extract::{ConnectInfo, FromRequestParts, State},
	http::{request::Parts, Request},
	middleware::Next,
	response::{IntoResponse, Response},
};
use tracing::instrument;
use warden_server_auth::{
	authorize, extract_bearer_token, AuditEventType, AuditLogEntry, AuthContext, AuthError,
	CurrentUser, Requirement, User,
};

use crate::api::AppState;
use crate::audit;
use crate::client_info::ClientInfo;
use crate::error::ServerError;

/// Resolves the caller's identity, if any, for downstream handlers.
#[instrument(
	name = "auth_layer",
	skip_all,
	fields(method = %request.method(), path = %request.uri().path(), user_id)
)]
pub async fn auth_layer(
	State(state): State<AppState>,
	mut request: Request<Body>,
	next: Next,
) -> Response {
	let auth_ctx = match extract_bearer_token(request.headers()) {
		Some(token) => match authenticate(&state, &token).await {
			Ok(user) => {
				tracing::Span::current().record("user_id", tracing::field::display(&user.id));
				AuthContext::authenticated(CurrentUser::from_bearer(user, &token))
			}
			Err(e) if e.is_internal() => {
				tracing::error!(error = %e, "bearer authentication failed");
				AuthContext::unauthenticated()
			}
			Err(e) => {
				tracing::debug!(error = %e, "bearer token rejected");
				AuthContext::unauthenticated()
			}
		},
		None => AuthContext::unauthenticated(),
	};

	request.extensions_mut().insert(auth_ctx);
	next.run(request).await
}

/// Decodes `token` and loads its subject.
///
/// Unknown subjects and inactive accounts are indistinguishable from a bad
/// token.
#[instrument(skip_all)]
pub async fn authenticate(state: &AppState, token: &str) -> Result<User, AuthError> {
	let claims = state.tokens.decode(token)?;
	let user = state
		.user_repo
		.get_user_by_username(&claims.sub)
		.await
		.map_err(|e| AuthError::Internal(e.to_string()))?;

	match user {
		Some(user) if user.is_active => Ok(user),
		Some(user) => {
			tracing::debug!(user_id = %user.id, "token subject is inactive");
			Err(AuthError::InvalidToken)
		}
		None => {
			tracing::debug!("token subject no longer exists");
			Err(AuthError::InvalidToken)
		}
	}
}

fn auth_context(parts: &Parts) -> AuthContext {
	parts
		.extensions
		.get::<AuthContext>()
		.cloned()
		.unwrap_or_else(AuthContext::unauthenticated)
}

/// Extractor that requires an authenticated caller.
///
/// # Example
///
/// ```ignore
/// async fn protected_handler(RequireAuth(current): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", current.user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
	S: Send + Sync,
{
	type Rejection = ServerError;

	#[instrument(name = "RequireAuth::from_request_parts", skip_all)]
	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		match auth_context(parts).current_user {
			Some(user) => Ok(RequireAuth(user)),
			None => {
				tracing::debug!("Authentication required: no valid credentials");
				Err(AuthError::AuthenticationRequired.into())
			}
		}
	}
}

/// Extractor for handlers that work with or without authentication.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
	S: Send + Sync,
{
	type Rejection = Infallible;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		Ok(OptionalAuth(auth_context(parts).current_user))
	}
}

/// State for [`require_layer`]: what a route demands of its caller.
#[derive(Clone)]
pub struct RouteRequirement {
	state: AppState,
	requirement: Requirement,
}

impl RouteRequirement {
	pub fn permission(state: &AppState, name: impl Into<String>) -> Self {
		Self {
			state: state.clone(),
			requirement: Requirement::permission(name),
		}
	}

	pub fn role(state: &AppState, name: impl Into<String>) -> Self {
		Self {
			state: state.clone(),
			requirement: Requirement::role(name),
		}
	}

	pub fn requirement(&self) -> &Requirement {
		&self.requirement
	}
}

/// Route layer enforcing a [`RouteRequirement`].
///
/// Must run inside [`auth_layer`]. Denials are written to the audit log.
///
/// ```ignore
/// get(list_users).route_layer(from_fn_with_state(
///     RouteRequirement::permission(&state, "auth"),
///     require_layer,
/// ))
/// ```
pub async fn require_layer(
	State(guard): State<RouteRequirement>,
	request: Request<Body>,
	next: Next,
) -> Response {
	let auth_ctx = request
		.extensions()
		.get::<AuthContext>()
		.cloned()
		.unwrap_or_else(AuthContext::unauthenticated);
	let Some(current) = auth_ctx.current_user else {
		return ServerError::from(AuthError::AuthenticationRequired).into_response();
	};

	if let Err(e) = authorize(&current.user, &guard.requirement) {
		let peer = request
			.extensions()
			.get::<ConnectInfo<SocketAddr>>()
			.map(|ConnectInfo(addr)| *addr);
		let client = ClientInfo::resolve(request.headers(), peer, guard.state.trust_proxy_headers);
		let path = request.uri().path().to_string();

		let entry = AuditLogEntry::builder(AuditEventType::AccessDenied)
			.actor(current.id())
			.resource("route", path.clone())
			.action(format!("{} {}", request.method(), path))
			.ip_address(client.ip_address)
			.user_agent(client.user_agent)
			.details(serde_json::json!({
				"requirement": guard.requirement.to_string(),
				"token_fingerprint": current.token_fingerprint,
			}))
			.build();
		audit::record(&guard.state, entry).await;

		return ServerError::from(e).into_response();
	}

	next.run(request).await
}
