use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::password::PasswordHasher;
use crate::db::models::{NewUser, User, UserProfile, UserUpdate};
use crate::error::{AppError, DatabaseError};
use crate::Result;

pub(crate) const USER_COLUMNS: &str =
    "id, name, uid, password, role, pfp, kasm_server_needed";

#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<SqlitePool>,
    hasher: PasswordHasher,
}

impl DbOperations {
    pub fn new(pool: Arc<SqlitePool>, hasher: PasswordHasher) -> Self {
        Self { pool, hasher }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.pool.as_ref()
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub async fn get_pool_status(&self) -> Result<DbPoolStatus> {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        let active = size.saturating_sub(idle);

        Ok(DbPoolStatus {
            total_connections: size,
            active_connections: active,
            idle_connections: idle,
        })
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    pub async fn create_user_with_transaction(
        &self,
        new_user: &NewUser,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<User> {
        path_component(&new_user.uid, "uid")?;
        let password_hash = self.hasher.hash(&new_user.password);

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, uid, password, role, pfp, kasm_server_needed)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.name)
        .bind(&new_user.uid)
        .bind(&password_hash)
        .bind(&new_user.role)
        .bind(&new_user.pfp)
        .bind(new_user.kasm_server_needed)
        .fetch_one(&mut **transaction)
        .await?;

        Ok(user)
    }

    /// Insert a user. A taken uid yields `DatabaseError::Duplicate` and the
    /// insert is rolled back.
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let mut transaction = self.begin_transaction().await?;

        let result = self.create_user_with_transaction(new_user, &mut transaction).await;

        match result {
            Ok(user) => {
                transaction.commit().await?;
                info!("Created user {}", user.uid);
                Ok(user)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_uid(&self, uid: &str) -> Result<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        find_user_by_uid(&mut conn, uid).await
    }

    /// Like `get_user_by_uid`, but a missing user is an error.
    pub async fn require_user(&self, uid: &str) -> Result<User> {
        self.get_user_by_uid(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{}'", uid)))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(users)
    }

    /// The user together with their sections.
    pub async fn read_user(&self, user: &User) -> Result<UserProfile> {
        let sections = self.get_user_sections(user.id).await?;
        Ok(UserProfile::new(user.clone(), sections))
    }

    /// Apply only the fields that carry a value; empty strings are skipped.
    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User> {
        let mut user = self
            .get_user_by_id(id)
            .await?
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;

        if let Some(name) = non_empty(&update.name) {
            user.name = name.to_string();
        }
        if let Some(uid) = non_empty(&update.uid) {
            user.uid = path_component(uid, "uid")?.to_string();
        }
        if let Some(password) = non_empty(&update.password) {
            user.set_password(password, &self.hasher);
        }
        if let Some(pfp) = &update.pfp {
            user.pfp = Some(pfp.clone());
        }
        if let Some(kasm_server_needed) = update.kasm_server_needed {
            user.kasm_server_needed = kasm_server_needed;
        }

        self.save_user(&user).await
    }

    /// Write every column of `user` back to its row.
    pub async fn save_user(&self, user: &User) -> Result<User> {
        let saved = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = ?, uid = ?, password = ?, role = ?, pfp = ?, kasm_server_needed = ?
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.uid)
        .bind(user.password_hash())
        .bind(&user.role)
        .bind(&user.pfp)
        .bind(user.kasm_server_needed)
        .bind(user.id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;

        Ok(saved)
    }

    /// Remove the user. Enrollments and the stock account go with it.
    pub async fn delete_user(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(DatabaseError::NotFound));
        }
        info!("Deleted user {}", id);
        Ok(())
    }

    /// Store a profile picture under `<upload_dir>/<uid>/<filename>` and
    /// record the file name on the user.
    pub async fn save_pfp(
        &self,
        user: &User,
        upload_dir: &Path,
        image_data: &[u8],
        filename: &str,
    ) -> Result<User> {
        let filename = path_component(filename, "file name")?;
        let user_dir = upload_dir.join(path_component(&user.uid, "uid")?);
        tokio::fs::create_dir_all(&user_dir).await?;
        tokio::fs::write(user_dir.join(filename), image_data).await?;

        let update = UserUpdate {
            pfp: Some(filename.to_string()),
            ..Default::default()
        };
        self.update_user(user.id, &update).await
    }

    /// Clear the stored profile picture name. The file itself is left alone.
    pub async fn delete_pfp(&self, user: &User) -> Result<User> {
        let mut user = user.clone();
        user.pfp = None;
        self.save_user(&user).await
    }
}

pub(crate) async fn find_user_by_uid(
    conn: &mut SqliteConnection,
    uid: &str,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE uid = ?"
    ))
    .bind(uid)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Accept `value` only if it is a single, plain path component.
fn path_component<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let component = Path::new(value)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| *name == value && !name.is_empty());

    match component {
        Some(component) => Ok(component),
        None => {
            warn!("Rejected {} {:?}", what, value);
            Err(AppError::ValidationError(format!("invalid {} '{}'", what, value)))
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbPoolStatus {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
}
