#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, header},
    response::Response,
};
use badge_gate::{
    AppConfig, AppState,
    auth::{self, READER_KEY_HEADER},
    clock::Clock,
    events::{TagReadEvent, UnlockEvent},
    models::{ActivationRecord, NewActivationRecord, NewUser, Role, User, UserChanges},
    notifier::UnlockNotifier,
    repository::{InMemoryRepository, RepoError, RepoResult, Repository, RepositoryState},
    tag_reads::TagReadDispatcher,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::mpsc;
use uuid::Uuid;

// --- Fixtures ---

pub fn fixed_instant() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_opt(9, 26, 53)
        .unwrap()
}

pub fn user(id: i64, uid: &str, is_enabled: bool) -> User {
    User {
        id,
        uid: uid.to_string(),
        name: format!("User {id}"),
        email: format!("user{id}@example.com"),
        password_hash: String::new(),
        role: Role::Member,
        is_enabled,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub async fn seeded_repo(users: Vec<User>) -> Arc<InMemoryRepository> {
    let repo = Arc::new(InMemoryRepository::new());
    for u in users {
        repo.seed_user(u).await;
    }
    repo
}

/// Builds state around `repo` with a frozen clock. The returned receiver keeps
/// the tag-read queue open.
pub fn test_state(repo: RepositoryState) -> (AppState, mpsc::Receiver<TagReadEvent>) {
    let (tag_reads, receiver) = TagReadDispatcher::channel(8);
    let state = AppState {
        repo,
        clock: Arc::new(FixedClock(fixed_instant())),
        tag_reads,
        config: AppConfig::default(),
    };
    (state, receiver)
}

pub fn bearer_for(user: &User) -> String {
    let issued = auth::issue_token(user, &AppConfig::default(), Utc::now()).unwrap();
    format!("Bearer {}", issued.token)
}

// --- Requests ---

pub fn request(method: Method, uri: &str, authorization: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn reader_request(key: Option<&str>, tag: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/tag-reads")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header(READER_KEY_HEADER, key);
    }
    builder
        .body(Body::from(serde_json::json!({ "tagRFID": tag }).to_string()))
        .unwrap()
}

pub async fn body_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Test Doubles ---

/// A clock frozen at a single instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Counts unlock signals.
#[derive(Default)]
pub struct RecordingNotifier {
    pub unlocks: AtomicUsize,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.unlocks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnlockNotifier for RecordingNotifier {
    async fn notify(&self, _event: UnlockEvent) {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
    }
}

/// Delegates to an in-memory repository and counts calls to the resource
/// operations, so tests can prove a handler never ran.
pub struct CountingRepo {
    pub inner: Arc<InMemoryRepository>,
    pub list_users_calls: AtomicUsize,
    pub writes: AtomicUsize,
}

impl CountingRepo {
    pub fn new(inner: Arc<InMemoryRepository>) -> Self {
        Self {
            inner,
            list_users_calls: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn list_users_calls(&self) -> usize {
        self.list_users_calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for CountingRepo {
    async fn find_user_by_uid(&self, uid: &str) -> RepoResult<Option<User>> {
        self.inner.find_user_by_uid(uid).await
    }
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        self.inner.get_user(id).await
    }
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        self.list_users_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_users().await
    }
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create_user(user).await
    }
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_user(id, changes).await
    }
    async fn append_activation_record(
        &self,
        record: NewActivationRecord,
    ) -> RepoResult<ActivationRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.append_activation_record(record).await
    }
    async fn get_activation_record(&self, id: i64) -> RepoResult<Option<ActivationRecord>> {
        self.inner.get_activation_record(id).await
    }
    async fn list_activation_records(
        &self,
        user_id: Option<i64>,
    ) -> RepoResult<Vec<ActivationRecord>> {
        self.inner.list_activation_records(user_id).await
    }
    async fn revoke_token(
        &self,
        jti: Uuid,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.revoke_token(jti, user_id, expires_at).await
    }
    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool> {
        self.inner.is_token_revoked(jti).await
    }
}

/// Delegates to an in-memory repository; every write fails with
/// `RepoError::Unavailable` while `fail_writes` is set.
pub struct FlakyRepo {
    pub inner: Arc<InMemoryRepository>,
    pub fail_writes: AtomicBool,
}

impl FlakyRepo {
    pub fn new(inner: Arc<InMemoryRepository>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepoError::Unavailable("writes disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Repository for FlakyRepo {
    async fn find_user_by_uid(&self, uid: &str) -> RepoResult<Option<User>> {
        self.inner.find_user_by_uid(uid).await
    }
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        self.inner.get_user(id).await
    }
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        self.inner.list_users().await
    }
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        self.check_writable()?;
        self.inner.create_user(user).await
    }
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        self.check_writable()?;
        self.inner.update_user(id, changes).await
    }
    async fn append_activation_record(
        &self,
        record: NewActivationRecord,
    ) -> RepoResult<ActivationRecord> {
        self.check_writable()?;
        self.inner.append_activation_record(record).await
    }
    async fn get_activation_record(&self, id: i64) -> RepoResult<Option<ActivationRecord>> {
        self.inner.get_activation_record(id).await
    }
    async fn list_activation_records(
        &self,
        user_id: Option<i64>,
    ) -> RepoResult<Vec<ActivationRecord>> {
        self.inner.list_activation_records(user_id).await
    }
    async fn revoke_token(
        &self,
        jti: Uuid,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.check_writable()?;
        self.inner.revoke_token(jti, user_id, expires_at).await
    }
    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool> {
        self.inner.is_token_revoked(jti).await
    }
}
