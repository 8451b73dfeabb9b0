// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pools for tests. Each call returns a fresh, migrated in-memory database.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use warden_server_auth::RbacCatalog;

use crate::role::RoleRepository;

/// An in-memory database lives only as long as its connection, so the pool
/// holds exactly one and never recycles it.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")
		.unwrap()
		.foreign_keys(true);
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await
		.unwrap();
	crate::run_migrations(&pool).await.unwrap();
	pool
}

/// [`create_test_pool`] plus the default role catalog.
pub async fn create_seeded_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	RoleRepository::new(pool.clone())
		.initialize_defaults(&RbacCatalog::default())
		.await
		.unwrap();
	pool
}
