// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden server binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_server::{create_app_state, create_router};
use warden_server_config::{LogFormat, ServerConfig, CONFIG_FILE_ENV};
use warden_server_db::RoleRepository;

mod version;

/// Warden server - role-based authentication over HTTP.
#[derive(Parser, Debug)]
#[command(
	name = "warden-server",
	about = "Role-based authentication server",
	version
)]
struct Args {
	/// Path to a TOML config file
	#[arg(long, env = CONFIG_FILE_ENV)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the HTTP server (default)
	Serve,
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	// Load .env before parsing so clap sees variables defined there
	dotenvy::dotenv().ok();

	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => warden_server_config::load_config_with_file(path),
		None => warden_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config);

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting warden-server"
	);
	if config.auth.secret_generated {
		tracing::warn!("using a generated signing secret; tokens will not survive a restart");
	}

	let pool = warden_server_db::create_pool(&config.database.url)
		.await
		.context("failed to open database")?;
	warden_server_db::run_migrations(&pool)
		.await
		.context("failed to run migrations")?;

	let seeded = RoleRepository::new(pool.clone())
		.initialize_defaults(&config.rbac)
		.await
		.context("failed to seed roles and permissions")?;
	tracing::info!(
		permissions_created = seeded.permissions_created,
		roles_created = seeded.roles_created,
		"role catalog ready"
	);

	let state = create_app_state(pool, &config);
	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	tracing::info!(%addr, "listening");

	// Peer addresses feed the registration limiter.
	let service = app.into_make_service_with_connect_info::<SocketAddr>();

	tokio::select! {
		result = axum::serve(listener, service) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}

fn init_tracing(config: &ServerConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	match config.logging.format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}
