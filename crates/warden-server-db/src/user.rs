// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential store.
//!
//! Users are loaded together with their roles and each role's permissions.
//! Every mutation runs in one transaction covering both the `users` row and
//! the `user_roles` links, so a failure part-way leaves nothing behind.
//! Password hashing happens before these methods are called; only the
//! finished hash reaches storage.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;
use warden_server_auth::{Role, User, UserId, DEFAULT_ROLE};

use crate::error::{map_unique_violation, DbError, Result};
use crate::role::{ensure_roles_exist, group_role_rows};
use crate::time::{format_timestamp, parse_timestamp};

const USER_COLUMNS: &str =
	"id, username, email, password_hash, is_active, is_superuser, created_at, updated_at";

const UNIQUE_USER_COLUMNS: &[&str] = &["username", "email"];

#[derive(Debug, Clone)]
pub struct NewUser {
	pub username: String,
	pub email: String,
	pub password_hash: String,
	/// Role names; empty means the default `user` role.
	pub roles: Vec<String>,
	pub is_superuser: bool,
}

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
	pub username: Option<String>,
	pub email: Option<String>,
	pub password_hash: Option<String>,
	/// Replaces the whole role set when present.
	pub roles: Option<Vec<String>>,
	pub is_active: Option<bool>,
	pub is_superuser: Option<bool>,
}

impl UserUpdate {
	pub fn is_empty(&self) -> bool {
		self.changed_fields().is_empty()
	}

	/// Names of the supplied fields, for audit details.
	pub fn changed_fields(&self) -> Vec<&'static str> {
		let mut fields = Vec::new();
		if self.username.is_some() {
			fields.push("username");
		}
		if self.email.is_some() {
			fields.push("email");
		}
		if self.password_hash.is_some() {
			fields.push("password");
		}
		if self.roles.is_some() {
			fields.push("roles");
		}
		if self.is_active.is_some() {
			fields.push("is_active");
		}
		if self.is_superuser.is_some() {
			fields.push("is_superuser");
		}
		fields
	}
}

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn create_user(&self, new_user: NewUser) -> Result<User>;
	async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>>;
	async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
	async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
	async fn update_user(&self, id: &UserId, update: UserUpdate) -> Result<User>;
	async fn delete_user(&self, id: &UserId) -> Result<User>;
	async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>>;
	async fn count_users(&self) -> Result<i64>;
}

#[derive(Clone, Copy)]
enum UserKey<'a> {
	Id(&'a UserId),
	Username(&'a str),
	Email(&'a str),
}

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Creates a user and its role links.
	///
	/// # Errors
	/// - `DbError::Conflict("username" | "email")` on a duplicate
	/// - `DbError::UnknownRole` if a requested role does not exist
	#[tracing::instrument(skip(self, new_user), fields(username = %new_user.username))]
	pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
		let roles = normalize_roles(new_user.roles, true);
		let id = UserId::generate();
		let now = format_timestamp(Utc::now());

		let mut tx = self.pool.begin().await?;
		ensure_roles_exist(&mut tx, &roles).await?;

		sqlx::query(
			r#"
			INSERT INTO users (id, username, email, password_hash, is_active, is_superuser, created_at, updated_at)
			VALUES (?, ?, ?, ?, 1, ?, ?, ?)
			"#,
		)
		.bind(id.to_string())
		.bind(&new_user.username)
		.bind(&new_user.email)
		.bind(&new_user.password_hash)
		.bind(new_user.is_superuser as i32)
		.bind(&now)
		.bind(&now)
		.execute(&mut *tx)
		.await
		.map_err(|e| map_unique_violation(e, "users", UNIQUE_USER_COLUMNS))?;

		insert_user_roles(&mut tx, &id, &roles).await?;

		let user = fetch_user(&mut tx, UserKey::Id(&id))
			.await?
			.ok_or_else(|| DbError::Internal("created user vanished".to_string()))?;
		tx.commit().await?;

		tracing::debug!(user_id = %id, roles = ?roles, "user created");
		Ok(user)
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>> {
		let mut conn = self.pool.acquire().await?;
		fetch_user(&mut conn, UserKey::Id(id)).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
		let mut conn = self.pool.acquire().await?;
		fetch_user(&mut conn, UserKey::Username(username)).await
	}

	#[tracing::instrument(skip(self, email))]
	pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
		let mut conn = self.pool.acquire().await?;
		fetch_user(&mut conn, UserKey::Email(email)).await
	}

	/// Applies the supplied fields and refreshes `updated_at`.
	///
	/// # Errors
	/// - `DbError::NotFound` if the user does not exist
	/// - `DbError::Conflict` if the new username or email is taken
	/// - `DbError::UnknownRole` if a role in the replacement set does not exist
	#[tracing::instrument(skip(self, update), fields(user_id = %id, fields = ?update.changed_fields()))]
	pub async fn update_user(&self, id: &UserId, update: UserUpdate) -> Result<User> {
		let mut tx = self.pool.begin().await?;

		let exists = sqlx::query("SELECT 1 FROM users WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&mut *tx)
			.await?
			.is_some();
		if !exists {
			return Err(DbError::NotFound(format!("user {id}")));
		}

		let mut query = QueryBuilder::<Sqlite>::new("UPDATE users SET updated_at = ");
		query.push_bind(format_timestamp(Utc::now()));
		if let Some(username) = update.username {
			query.push(", username = ").push_bind(username);
		}
		if let Some(email) = update.email {
			query.push(", email = ").push_bind(email);
		}
		if let Some(password_hash) = update.password_hash {
			query.push(", password_hash = ").push_bind(password_hash);
		}
		if let Some(is_active) = update.is_active {
			query.push(", is_active = ").push_bind(is_active as i32);
		}
		if let Some(is_superuser) = update.is_superuser {
			query.push(", is_superuser = ").push_bind(is_superuser as i32);
		}
		query.push(" WHERE id = ").push_bind(id.to_string());
		query
			.build()
			.execute(&mut *tx)
			.await
			.map_err(|e| map_unique_violation(e, "users", UNIQUE_USER_COLUMNS))?;

		if let Some(roles) = update.roles {
			let roles = normalize_roles(roles, false);
			ensure_roles_exist(&mut tx, &roles).await?;
			sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
				.bind(id.to_string())
				.execute(&mut *tx)
				.await?;
			insert_user_roles(&mut tx, id, &roles).await?;
		}

		let user = fetch_user(&mut tx, UserKey::Id(id))
			.await?
			.ok_or_else(|| DbError::NotFound(format!("user {id}")))?;
		tx.commit().await?;

		tracing::debug!(user_id = %id, "user updated");
		Ok(user)
	}

	/// Removes the user and its role links, returning the removed record.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn delete_user(&self, id: &UserId) -> Result<User> {
		let mut tx = self.pool.begin().await?;

		let user = fetch_user(&mut tx, UserKey::Id(id))
			.await?
			.ok_or_else(|| DbError::NotFound(format!("user {id}")))?;

		sqlx::query("DELETE FROM users WHERE id = ?")
			.bind(id.to_string())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::info!(user_id = %id, "user deleted");
		Ok(user)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>> {
		let mut conn = self.pool.acquire().await?;
		let sql = format!(
			"SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT ? OFFSET ?"
		);
		let rows = sqlx::query(&sql)
			.bind(limit.max(0))
			.bind(offset.max(0))
			.fetch_all(&mut *conn)
			.await?;

		let mut users = Vec::with_capacity(rows.len());
		for row in &rows {
			let id = row_user_id(row)?;
			let roles = load_roles(&mut conn, &id).await?;
			users.push(row_to_user(row, id, roles)?);
		}
		Ok(users)
	}

	#[tracing::instrument(skip(self))]
	pub async fn count_users(&self) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS cnt FROM users")
			.fetch_one(&self.pool)
			.await?;
		Ok(row.get("cnt"))
	}
}

#[async_trait]
impl UserStore for UserRepository {
	async fn create_user(&self, new_user: NewUser) -> Result<User> {
		self.create_user(new_user).await
	}

	async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>> {
		self.get_user_by_id(id).await
	}

	async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
		self.get_user_by_username(username).await
	}

	async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
		self.get_user_by_email(email).await
	}

	async fn update_user(&self, id: &UserId, update: UserUpdate) -> Result<User> {
		self.update_user(id, update).await
	}

	async fn delete_user(&self, id: &UserId) -> Result<User> {
		self.delete_user(id).await
	}

	async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>> {
		self.list_users(offset, limit).await
	}

	async fn count_users(&self) -> Result<i64> {
		self.count_users().await
	}
}

/// Dedupes while keeping the caller's order.
fn normalize_roles(roles: Vec<String>, default_when_empty: bool) -> Vec<String> {
	if roles.is_empty() && default_when_empty {
		return vec![DEFAULT_ROLE.to_string()];
	}
	let mut seen = std::collections::HashSet::new();
	roles
		.into_iter()
		.filter(|r| seen.insert(r.clone()))
		.collect()
}

async fn insert_user_roles(conn: &mut SqliteConnection, id: &UserId, roles: &[String]) -> Result<()> {
	for role in roles {
		sqlx::query("INSERT INTO user_roles (user_id, role_name) VALUES (?, ?)")
			.bind(id.to_string())
			.bind(role)
			.execute(&mut *conn)
			.await?;
	}
	Ok(())
}

async fn fetch_user(conn: &mut SqliteConnection, key: UserKey<'_>) -> Result<Option<User>> {
	let (column, value) = match key {
		UserKey::Id(id) => ("id", id.to_string()),
		UserKey::Username(username) => ("username", username.to_string()),
		UserKey::Email(email) => ("email", email.to_string()),
	};
	let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
	let Some(row) = sqlx::query(&sql)
		.bind(value)
		.fetch_optional(&mut *conn)
		.await?
	else {
		return Ok(None);
	};

	let id = row_user_id(&row)?;
	let roles = load_roles(conn, &id).await?;
	row_to_user(&row, id, roles).map(Some)
}

async fn load_roles(conn: &mut SqliteConnection, id: &UserId) -> Result<Vec<Role>> {
	let rows = sqlx::query(
		r#"
		SELECT r.name, r.description, rp.permission_name
		FROM user_roles ur
		JOIN roles r ON r.name = ur.role_name
		LEFT JOIN role_permissions rp ON rp.role_name = r.name
		WHERE ur.user_id = ?
		ORDER BY r.name, rp.permission_name
		"#,
	)
	.bind(id.to_string())
	.fetch_all(&mut *conn)
	.await?;
	Ok(group_role_rows(&rows))
}

fn row_user_id(row: &SqliteRow) -> Result<UserId> {
	let id: String = row.get("id");
	Uuid::parse_str(&id)
		.map(UserId::new)
		.map_err(|e| DbError::Internal(format!("Invalid user ID: {e}")))
}

fn row_to_user(row: &SqliteRow, id: UserId, roles: Vec<Role>) -> Result<User> {
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let is_active: i32 = row.get("is_active");
	let is_superuser: i32 = row.get("is_superuser");

	Ok(User {
		id,
		username: row.get("username"),
		email: row.get("email"),
		password_hash: row.get("password_hash"),
		is_active: is_active != 0,
		is_superuser: is_superuser != 0,
		roles,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}
