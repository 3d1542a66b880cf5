use super::{RepoError, RepoResult, Repository};
use crate::models::{ActivationRecord, NewActivationRecord, NewUser, User, UserChanges};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, uid, name, email, password_hash, role, is_enabled, created_at, updated_at";
const RECORD_COLUMNS: &str = "id, user_id, date, time, created_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are checked at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps constraint failures onto the variants handlers care about.
fn classify(err: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(name) if name.contains("uid") => "uid",
                Some(name) if name.contains("email") => "email",
                _ => "value",
            };
            return RepoError::UniqueViolation(field);
        }
        if db.is_foreign_key_violation() {
            return RepoError::ForeignKeyViolation("user");
        }
    }
    RepoError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_user_by_uid
    ///
    /// Unique-key match on the badge identifier. Backed by the `users_uid_key` index.
    async fn find_user_by_uid(&self, uid: &str) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE uid = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC");
        sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let query = format!(
            "INSERT INTO users (uid, name, email, password_hash, role, is_enabled) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(user.uid)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.role)
            .bind(user.is_enabled)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    /// update_user
    ///
    /// Uses `COALESCE` so each `None` in `changes` keeps the stored column value.
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let query = format!(
            r#"
            UPDATE users
            SET uid = COALESCE($2, uid),
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                password_hash = COALESCE($5, password_hash),
                role = COALESCE($6, role),
                is_enabled = COALESCE($7, is_enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(changes.uid)
            .bind(changes.name)
            .bind(changes.email)
            .bind(changes.password_hash)
            .bind(changes.role)
            .bind(changes.is_enabled)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    /// append_activation_record
    ///
    /// Plain insert. The `user_id` foreign key rejects orphan records.
    async fn append_activation_record(
        &self,
        record: NewActivationRecord,
    ) -> RepoResult<ActivationRecord> {
        let query = format!(
            "INSERT INTO activation_records (user_id, date, time) VALUES ($1, $2, $3) \
             RETURNING {RECORD_COLUMNS}"
        );
        sqlx::query_as::<_, ActivationRecord>(&query)
            .bind(record.user_id)
            .bind(record.date)
            .bind(record.time)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_activation_record(&self, id: i64) -> RepoResult<Option<ActivationRecord>> {
        let query = format!("SELECT {RECORD_COLUMNS} FROM activation_records WHERE id = $1");
        sqlx::query_as::<_, ActivationRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn list_activation_records(
        &self,
        user_id: Option<i64>,
    ) -> RepoResult<Vec<ActivationRecord>> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM activation_records \
             WHERE ($1::BIGINT IS NULL OR user_id = $1) ORDER BY id ASC"
        );
        sqlx::query_as::<_, ActivationRecord>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    /// revoke_token
    ///
    /// Idempotent: revoking the same token twice is not an error. Rows for tokens
    /// that have expired anyway are pruned on the way.
    async fn revoke_token(
        &self,
        jti: Uuid,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        sqlx::query(
            "INSERT INTO revoked_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await
                .map_err(classify)?;
        Ok(revoked)
    }
}
