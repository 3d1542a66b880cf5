use crate::models::{ActivationRecord, NewActivationRecord, NewUser, User, UserChanges};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("unique constraint violated on {0}")]
    UniqueViolation(&'static str),
    #[error("foreign key violated: {0} does not exist")]
    ForeignKeyViolation(&'static str),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The persistence contract for users, activation records and revoked tokens.
/// It doubles as the User Directory (`find_user_by_uid`) and the Activation Record
/// Store (`append_activation_record`) consumed by the tag-read pipeline.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// request handlers and the background tag-read worker.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- User Directory ---
    // Unique-key lookup on the badge tag identifier.
    async fn find_user_by_uid(&self, uid: &str) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;

    // --- User Provisioning ---
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    // Partial update; returns None when the user does not exist.
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>>;

    // --- Activation Record Store ---
    // Append-only. Fails with ForeignKeyViolation when the user does not exist.
    async fn append_activation_record(
        &self,
        record: NewActivationRecord,
    ) -> RepoResult<ActivationRecord>;
    async fn get_activation_record(&self, id: i64) -> RepoResult<Option<ActivationRecord>>;
    // Oldest first. `user_id` narrows the listing to one user.
    async fn list_activation_records(
        &self,
        user_id: Option<i64>,
    ) -> RepoResult<Vec<ActivationRecord>>;

    // --- Token Revocation ---
    async fn revoke_token(
        &self,
        jti: Uuid,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()>;
    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
