// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client address and user agent extraction.
//!
//! The address keys the registration limiter and is recorded on audit
//! entries. Forwarding headers are client-controlled, so they are read only
//! when `trust_proxy_headers` is enabled; otherwise the peer address of the
//! TCP connection is used.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
	extract::{ConnectInfo, FromRequestParts},
	http::{header::USER_AGENT, request::Parts, HeaderMap},
};

use crate::api::AppState;

/// Recorded when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
	pub ip_address: String,
	pub user_agent: Option<String>,
}

impl ClientInfo {
	#[tracing::instrument(level = "debug", skip(headers, peer))]
	pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> Self {
		let forwarded = if trust_proxy_headers {
			extract_client_ip(headers)
		} else {
			None
		};
		let ip_address = forwarded
			.or_else(|| peer.map(|addr| addr.ip().to_string()))
			.unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
		let user_agent = headers
			.get(USER_AGENT)
			.and_then(|v| v.to_str().ok())
			.map(|s| s.to_string());

		tracing::debug!(ip = %ip_address, "client info extracted");
		Self {
			ip_address,
			user_agent,
		}
	}
}

impl FromRequestParts<AppState> for ClientInfo {
	type Rejection = Infallible;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let peer = parts
			.extensions
			.get::<ConnectInfo<SocketAddr>>()
			.map(|ConnectInfo(addr)| *addr);
		Ok(Self::resolve(&parts.headers, peer, state.trust_proxy_headers))
	}
}

/// Extract client IP from request headers.
///
/// Checks headers in order of preference:
/// 1. `X-Forwarded-For` (first IP in chain, for reverse proxies)
/// 2. `X-Real-IP` (nginx style)
/// 3. `CF-Connecting-IP` (Cloudflare)
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
	if let Some(first_ip) = header_str(headers, "x-forwarded-for").and_then(|v| v.split(',').next()) {
		let ip = first_ip.trim();
		if !ip.is_empty() {
			return Some(ip.to_string());
		}
	}

	["x-real-ip", "cf-connecting-ip"]
		.into_iter()
		.filter_map(|name| header_str(headers, name))
		.map(str::trim)
		.find(|ip| !ip.is_empty())
		.map(str::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|v| v.to_str().ok())
}
