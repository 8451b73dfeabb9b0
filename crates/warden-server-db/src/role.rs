// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role and permission storage.
//!
//! Roles and permissions are keyed by name. Seeding from the catalog is
//! idempotent: existing rows are left alone, and a role's declared
//! permissions are attached only when the role itself is newly created.
//! Deleting a role cascades to its `user_roles` links, never to users.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use warden_server_auth::{PermissionDef, RbacCatalog, Role, RoleDef, DEFAULT_ROLE};

use crate::error::{map_unique_violation, DbError, Result};

/// Rows inserted by [`RoleRepository::initialize_defaults`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
	pub permissions_created: u64,
	pub roles_created: u64,
}

#[async_trait]
pub trait RoleStore: Send + Sync {
	async fn initialize_defaults(&self, catalog: &RbacCatalog) -> Result<SeedReport>;
	async fn create_role(&self, def: &RoleDef) -> Result<Role>;
	async fn assign_permission(&self, role: &str, permission: &str) -> Result<()>;
	async fn delete_role(&self, name: &str) -> Result<()>;
	async fn get_role(&self, name: &str) -> Result<Option<Role>>;
	async fn list_roles(&self) -> Result<Vec<Role>>;
	async fn list_permissions(&self) -> Result<Vec<PermissionDef>>;
}

#[derive(Clone)]
pub struct RoleRepository {
	pool: SqlitePool,
}

impl RoleRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Seeds the catalog's permissions and roles. Safe to run on every start.
	#[tracing::instrument(skip(self, catalog), fields(
		permissions = catalog.permissions.len(),
		roles = catalog.roles.len()
	))]
	pub async fn initialize_defaults(&self, catalog: &RbacCatalog) -> Result<SeedReport> {
		catalog
			.validate()
			.map_err(|e| DbError::Internal(format!("invalid role catalog: {e}")))?;

		let mut report = SeedReport::default();
		let mut tx = self.pool.begin().await?;

		for permission in &catalog.permissions {
			report.permissions_created +=
				sqlx::query("INSERT OR IGNORE INTO permissions (name, description) VALUES (?, ?)")
					.bind(&permission.name)
					.bind(&permission.description)
					.execute(&mut *tx)
					.await?
					.rows_affected();
		}

		for role in &catalog.roles {
			let inserted = sqlx::query("INSERT OR IGNORE INTO roles (name, description) VALUES (?, ?)")
				.bind(&role.name)
				.bind(&role.description)
				.execute(&mut *tx)
				.await?
				.rows_affected();
			if inserted == 0 {
				continue;
			}
			report.roles_created += inserted;
			for permission in &role.permissions {
				link_permission(&mut tx, &role.name, permission).await?;
			}
		}

		tx.commit().await?;
		tracing::info!(
			permissions_created = report.permissions_created,
			roles_created = report.roles_created,
			"role catalog seeded"
		);
		Ok(report)
	}

	/// Adds a role administratively. Every permission must already exist.
	#[tracing::instrument(skip(self, def), fields(role = %def.name))]
	pub async fn create_role(&self, def: &RoleDef) -> Result<Role> {
		let mut tx = self.pool.begin().await?;
		for permission in &def.permissions {
			ensure_permission_exists(&mut tx, permission).await?;
		}

		sqlx::query("INSERT INTO roles (name, description) VALUES (?, ?)")
			.bind(&def.name)
			.bind(&def.description)
			.execute(&mut *tx)
			.await
			.map_err(|e| map_unique_violation(e, "roles", &["name"]))?;
		for permission in &def.permissions {
			link_permission(&mut tx, &def.name, permission).await?;
		}

		let role = fetch_role(&mut tx, &def.name)
			.await?
			.ok_or_else(|| DbError::Internal("created role vanished".to_string()))?;
		tx.commit().await?;
		Ok(role)
	}

	/// Grants `permission` to `role`. Granting twice is a no-op.
	#[tracing::instrument(skip(self))]
	pub async fn assign_permission(&self, role: &str, permission: &str) -> Result<()> {
		let mut tx = self.pool.begin().await?;
		if fetch_role(&mut tx, role).await?.is_none() {
			return Err(DbError::NotFound(format!("role {role}")));
		}
		ensure_permission_exists(&mut tx, permission).await?;
		link_permission(&mut tx, role, permission).await?;
		tx.commit().await?;
		Ok(())
	}

	/// Deletes a role and detaches it from every user holding it.
	#[tracing::instrument(skip(self))]
	pub async fn delete_role(&self, name: &str) -> Result<()> {
		if name == DEFAULT_ROLE {
			return Err(DbError::Protected(format!(
				"role '{DEFAULT_ROLE}' is assigned to new users"
			)));
		}
		let deleted = sqlx::query("DELETE FROM roles WHERE name = ?")
			.bind(name)
			.execute(&self.pool)
			.await?
			.rows_affected();
		if deleted == 0 {
			return Err(DbError::NotFound(format!("role {name}")));
		}
		tracing::info!(role = %name, "role deleted");
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_role(&self, name: &str) -> Result<Option<Role>> {
		let mut conn = self.pool.acquire().await?;
		fetch_role(&mut conn, name).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_roles(&self) -> Result<Vec<Role>> {
		let rows = sqlx::query(
			r#"
			SELECT r.name, r.description, rp.permission_name
			FROM roles r
			LEFT JOIN role_permissions rp ON rp.role_name = r.name
			ORDER BY r.name, rp.permission_name
			"#,
		)
		.fetch_all(&self.pool)
		.await?;
		Ok(group_role_rows(&rows))
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_permissions(&self) -> Result<Vec<PermissionDef>> {
		let rows = sqlx::query("SELECT name, description FROM permissions ORDER BY name")
			.fetch_all(&self.pool)
			.await?;
		Ok(rows
			.iter()
			.map(|row| PermissionDef {
				name: row.get("name"),
				description: row.get("description"),
			})
			.collect())
	}
}

#[async_trait]
impl RoleStore for RoleRepository {
	async fn initialize_defaults(&self, catalog: &RbacCatalog) -> Result<SeedReport> {
		self.initialize_defaults(catalog).await
	}

	async fn create_role(&self, def: &RoleDef) -> Result<Role> {
		self.create_role(def).await
	}

	async fn assign_permission(&self, role: &str, permission: &str) -> Result<()> {
		self.assign_permission(role, permission).await
	}

	async fn delete_role(&self, name: &str) -> Result<()> {
		self.delete_role(name).await
	}

	async fn get_role(&self, name: &str) -> Result<Option<Role>> {
		self.get_role(name).await
	}

	async fn list_roles(&self) -> Result<Vec<Role>> {
		self.list_roles().await
	}

	async fn list_permissions(&self) -> Result<Vec<PermissionDef>> {
		self.list_permissions().await
	}
}

/// Folds `(name, description, permission_name)` rows into roles, one per name.
pub(crate) fn group_role_rows(rows: &[SqliteRow]) -> Vec<Role> {
	let mut roles: BTreeMap<String, Role> = BTreeMap::new();
	for row in rows {
		let name: String = row.get("name");
		let role = roles.entry(name.clone()).or_insert_with(|| Role {
			name,
			description: row.get("description"),
			permissions: Default::default(),
		});
		if let Some(permission) = row.get::<Option<String>, _>("permission_name") {
			role.permissions.insert(permission);
		}
	}
	roles.into_values().collect()
}

pub(crate) async fn ensure_roles_exist(conn: &mut SqliteConnection, roles: &[String]) -> Result<()> {
	for role in roles {
		let found = sqlx::query("SELECT 1 FROM roles WHERE name = ?")
			.bind(role)
			.fetch_optional(&mut *conn)
			.await?;
		if found.is_none() {
			return Err(DbError::UnknownRole(role.clone()));
		}
	}
	Ok(())
}

async fn ensure_permission_exists(conn: &mut SqliteConnection, permission: &str) -> Result<()> {
	let found = sqlx::query("SELECT 1 FROM permissions WHERE name = ?")
		.bind(permission)
		.fetch_optional(&mut *conn)
		.await?;
	match found {
		Some(_) => Ok(()),
		None => Err(DbError::UnknownPermission(permission.to_string())),
	}
}

async fn link_permission(conn: &mut SqliteConnection, role: &str, permission: &str) -> Result<()> {
	sqlx::query("INSERT OR IGNORE INTO role_permissions (role_name, permission_name) VALUES (?, ?)")
		.bind(role)
		.bind(permission)
		.execute(&mut *conn)
		.await?;
	Ok(())
}

async fn fetch_role(conn: &mut SqliteConnection, name: &str) -> Result<Option<Role>> {
	let rows = sqlx::query(
		r#"
		SELECT r.name, r.description, rp.permission_name
		FROM roles r
		LEFT JOIN role_permissions rp ON rp.role_name = r.name
		WHERE r.name = ?
		ORDER BY rp.permission_name
		"#,
	)
	.bind(name)
	.fetch_all(&mut *conn)
	.await?;
	Ok(group_role_rows(&rows).into_iter().next())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{create_seeded_test_pool, create_test_pool};
	use crate::user::{NewUser, UserRepository};

	async fn count(pool: &SqlitePool, table: &str) -> i64 {
		let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM {table}"))
			.fetch_one(pool)
			.await
			.unwrap();
		row.get("cnt")
	}

	mod seeding {
		use super::*;

		#[tokio::test]
		async fn second_run_creates_nothing() {
			let pool = create_test_pool().await;
			let repo = RoleRepository::new(pool.clone());
			let catalog = RbacCatalog::default();

			let first = repo.initialize_defaults(&catalog).await.unwrap();
			assert_eq!(first.permissions_created, 4);
			assert_eq!(first.roles_created, 2);

			let second = repo.initialize_defaults(&catalog).await.unwrap();
			assert_eq!(second, SeedReport::default());

			assert_eq!(count(&pool, "permissions").await, 4);
			assert_eq!(count(&pool, "roles").await, 2);
			assert_eq!(count(&pool, "role_permissions").await, 5);
		}

		#[tokio::test]
		async fn attaches_declared_permissions() {
			let repo = RoleRepository::new(create_seeded_test_pool().await);
			let admin = repo.get_role("admin").await.unwrap().unwrap();
			assert_eq!(
				admin.permissions.iter().map(String::as_str).collect::<Vec<_>>(),
				vec!["auth", "cmd", "db", "models"]
			);
			let user = repo.get_role("user").await.unwrap().unwrap();
			assert_eq!(user.description, "Standard user");
		}

		#[tokio::test]
		async fn rejects_invalid_catalog() {
			let repo = RoleRepository::new(create_test_pool().await);
			let mut catalog = RbacCatalog::default();
			catalog.roles[0].permissions.push("nope".to_string());
			assert!(matches!(
				repo.initialize_defaults(&catalog).await,
				Err(DbError::Internal(_))
			));
		}
	}

	mod administration {
		use super::*;

		fn def(name: &str, permissions: &[&str]) -> RoleDef {
			RoleDef {
				name: name.to_string(),
				description: format!("{name} role"),
				permissions: permissions.iter().map(|p| p.to_string()).collect(),
			}
		}

		#[tokio::test]
		async fn create_role_with_known_permissions() {
			let repo = RoleRepository::new(create_seeded_test_pool().await);
			let role = repo.create_role(&def("operator", &["cmd", "db"])).await.unwrap();
			assert_eq!(role.permissions.len(), 2);
			assert_eq!(repo.list_roles().await.unwrap().len(), 3);
		}

		#[tokio::test]
		async fn create_role_with_unknown_permission_fails_cleanly() {
			let pool = create_seeded_test_pool().await;
			let repo = RoleRepository::new(pool.clone());
			let err = repo.create_role(&def("operator", &["cmd", "fly"])).await.unwrap_err();
			assert!(matches!(err, DbError::UnknownPermission(ref p) if p == "fly"));
			assert!(repo.get_role("operator").await.unwrap().is_none());
		}

		#[tokio::test]
		async fn duplicate_role_is_conflict() {
			let repo = RoleRepository::new(create_seeded_test_pool().await);
			assert!(matches!(
				repo.create_role(&def("admin", &[])).await,
				Err(DbError::Conflict(_))
			));
		}

		#[tokio::test]
		async fn assign_permission_validates_both_sides() {
			let repo = RoleRepository::new(create_seeded_test_pool().await);
			repo.assign_permission("user", "db").await.unwrap();
			repo.assign_permission("user", "db").await.unwrap();
			let user = repo.get_role("user").await.unwrap().unwrap();
			assert!(user.permissions.contains("db"));

			assert!(matches!(
				repo.assign_permission("user", "fly").await,
				Err(DbError::UnknownPermission(_))
			));
			assert!(matches!(
				repo.assign_permission("ghost", "db").await,
				Err(DbError::NotFound(_))
			));
		}

		#[tokio::test]
		async fn deleting_role_detaches_users_without_deleting_them() {
			let pool = create_seeded_test_pool().await;
			let roles = RoleRepository::new(pool.clone());
			let users = UserRepository::new(pool.clone());
			roles.create_role(&def("operator", &["cmd"])).await.unwrap();
			let user = users
				.create_user(NewUser {
					username: "ops".to_string(),
					email: "ops@example.com".to_string(),
					password_hash: "h".to_string(),
					roles: vec!["operator".to_string(), "user".to_string()],
					is_superuser: false,
				})
				.await
				.unwrap();
			assert!(user.has_permission("cmd"));

			roles.delete_role("operator").await.unwrap();

			let reloaded = users.get_user_by_id(&user.id).await.unwrap().unwrap();
			assert_eq!(reloaded.role_names(), vec!["user"]);
			assert!(!reloaded.has_permission("cmd"));
		}

		#[tokio::test]
		async fn default_role_cannot_be_deleted() {
			let repo = RoleRepository::new(create_seeded_test_pool().await);
			assert!(matches!(
				repo.delete_role(DEFAULT_ROLE).await,
				Err(DbError::Protected(_))
			));
			assert!(matches!(
				repo.delete_role("ghost").await,
				Err(DbError::NotFound(_))
			));
		}

		#[tokio::test]
		async fn lists_permissions_by_name() {
			let repo = RoleRepository::new(create_seeded_test_pool().await);
			let names: Vec<_> = repo
				.list_permissions()
				.await
				.unwrap()
				.into_iter()
				.map(|p| p.name)
				.collect();
			assert_eq!(names, vec!["auth", "cmd", "db", "models"]);
		}
	}
}
