use super::{RepoError, RepoResult, Repository};
use crate::models::{ActivationRecord, NewActivationRecord, NewUser, User, UserChanges};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    records: Vec<ActivationRecord>,
    revoked: HashMap<Uuid, DateTime<Utc>>,
    next_user_id: i64,
    next_record_id: i64,
}

/// InMemoryRepository
///
/// A process-local `Repository` backing the test suite.
/// Enforces the same uniqueness and foreign-key rules as the Postgres schema.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully-formed user, keeping its id. Later `create_user` calls
    /// allocate ids above the highest seeded one.
    pub async fn seed_user(&self, user: User) {
        let mut tables = self.tables.write().await;
        tables.next_user_id = tables.next_user_id.max(user.id);
        tables.users.retain(|u| u.id != user.id);
        tables.users.push(user);
    }

    pub async fn activation_records(&self) -> Vec<ActivationRecord> {
        self.tables.read().await.records.clone()
    }
}

fn check_unique(users: &[User], skip_id: Option<i64>, uid: &str, email: &str) -> RepoResult<()> {
    let others = users.iter().filter(|u| Some(u.id) != skip_id);
    for other in others {
        if other.uid == uid {
            return Err(RepoError::UniqueViolation("uid"));
        }
        if other.email == email {
            return Err(RepoError::UniqueViolation("email"));
        }
    }
    Ok(())
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user_by_uid(&self, uid: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.uid == uid).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users = tables.users.clone();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        check_unique(&tables.users, None, &user.uid, &user.email)?;

        tables.next_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: tables.next_user_id,
            uid: user.uid,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_enabled: user.is_enabled,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables.users.iter().find(|u| u.id == id).cloned() else {
            return Ok(None);
        };

        let uid = changes.uid.unwrap_or(current.uid);
        let email = changes.email.unwrap_or(current.email);
        check_unique(&tables.users, Some(id), &uid, &email)?;

        let updated = User {
            id,
            uid,
            email,
            name: changes.name.unwrap_or(current.name),
            password_hash: changes.password_hash.unwrap_or(current.password_hash),
            role: changes.role.unwrap_or(current.role),
            is_enabled: changes.is_enabled.unwrap_or(current.is_enabled),
            created_at: current.created_at,
            updated_at: Utc::now(),
        };
        if let Some(slot) = tables.users.iter_mut().find(|u| u.id == id) {
            *slot = updated.clone();
        }
        Ok(Some(updated))
    }

    async fn append_activation_record(
        &self,
        record: NewActivationRecord,
    ) -> RepoResult<ActivationRecord> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == record.user_id) {
            return Err(RepoError::ForeignKeyViolation("user"));
        }

        tables.next_record_id += 1;
        let appended = ActivationRecord {
            id: tables.next_record_id,
            user_id: record.user_id,
            date: record.date,
            time: record.time,
            created_at: Utc::now(),
        };
        tables.records.push(appended.clone());
        Ok(appended)
    }

    async fn get_activation_record(&self, id: i64) -> RepoResult<Option<ActivationRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.records.iter().find(|r| r.id == id).cloned())
    }

    async fn list_activation_records(
        &self,
        user_id: Option<i64>,
    ) -> RepoResult<Vec<ActivationRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .iter()
            .filter(|r| user_id.is_none_or(|id| r.user_id == id))
            .cloned()
            .collect())
    }

    async fn revoke_token(
        &self,
        jti: Uuid,
        _user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        tables.revoked.retain(|_, expiry| *expiry >= now);
        tables.revoked.insert(jti, expires_at);
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool> {
        Ok(self.tables.read().await.revoked.contains_key(&jti))
    }
}
