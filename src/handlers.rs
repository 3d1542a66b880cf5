use crate::{
    AppState,
    auth::{self, AuthContext, ReaderKey},
    error::{AppError, ErrorBody},
    events::TagReadEvent,
    extract::{AppJson, AppPath, AppQuery},
    models::{
        ActivationRecord, CreateActivationRecordRequest, CreateUserRequest, LoginRequest,
        LoginResponse, NewActivationRecord, NewUser, UpdateUserRequest, UserChanges,
        UserResource,
    },
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::{Timelike, Utc};
use serde::Deserialize;

// --- Filter Structs ---

/// ActivationRecordFilter
///
/// Query parameters accepted by `GET /activation-records`.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ActivationRecordFilter {
    /// Only list records belonging to this user.
    pub user_id: Option<i64>,
}

/// Emails are stored and looked up trimmed and lowercased.
fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// --- Authentication ---

/// login
///
/// [Public Route] Exchanges email + password for a bearer token.
/// Unknown emails and wrong passwords are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 422, description = "Missing fields", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate().map_err(AppError::Validation)?;

    let found = state
        .repo
        .find_user_by_email(&normalize_email(&payload.email))
        .await?;
    let user = auth::check_credentials(found, &payload.password)
        .ok_or(AppError::InvalidCredentials)?;

    let issued = auth::issue_token(&user, &state.config, Utc::now())?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer".to_string(),
        expires_at: issued.expires_at,
        user: user.into(),
    }))
}

/// logout
///
/// [Authenticated Route] Revokes the bearer token used for this request.
/// Requests authenticated through the local bypass have no token; this is then a no-op.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "User is not enabled", body = ErrorBody)
    )
)]
pub async fn logout(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if let Some(token) = ctx.token {
        state
            .repo
            .revoke_token(token.jti, ctx.user.id, token.expires_at)
            .await?;
        tracing::info!(user_id = ctx.user.id, "user logged out");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// get_current_user
///
/// [Authenticated Route] Returns the caller's own account.
#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "Current user", body = UserResource),
        (status = 403, description = "User is not enabled", body = ErrorBody)
    )
)]
pub async fn get_current_user(Extension(ctx): Extension<AuthContext>) -> Json<UserResource> {
    Json(ctx.user.into())
}

// --- Users ---

/// list_users
///
/// [Authenticated Route] Lists every account, enabled or not, ordered by id.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = [UserResource]),
        (status = 403, description = "User is not enabled", body = ErrorBody)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResource>>, AppError> {
    let users = state.repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserResource::from).collect()))
}

/// create_user
///
/// [Authenticated Route] Provisions an account and binds it to a badge `uid`.
/// Role defaults to `member`, the account starts enabled unless stated otherwise.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = UserResource),
        (status = 409, description = "uid or email already taken", body = ErrorBody),
        (status = 422, description = "Invalid payload", body = ErrorBody)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResource>), AppError> {
    payload.validate().map_err(AppError::Validation)?;

    let new_user = NewUser {
        uid: payload.uid.trim().to_string(),
        name: payload.name.trim().to_string(),
        email: normalize_email(&payload.email),
        password_hash: auth::hash_password(&payload.password)?,
        role: payload.role.unwrap_or_default(),
        is_enabled: payload.is_enabled.unwrap_or(true),
    };

    let created = state.repo.create_user(new_user).await?;
    tracing::info!(user_id = created.id, "user provisioned");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// show_user
///
/// [Authenticated Route] One account together with its activation records.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserResource),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn show_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<UserResource>, AppError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let records = state.repo.list_activation_records(Some(id)).await?;
    Ok(Json(UserResource::from(user).with_activation_records(records)))
}

/// update_user
///
/// [Authenticated Route] Partial update. Toggling `is_enabled` here is how an
/// administrator blocks or restores API access.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserResource),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "uid or email already taken", body = ErrorBody),
        (status = 422, description = "Invalid payload", body = ErrorBody)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResource>, AppError> {
    payload.validate().map_err(AppError::Validation)?;

    let password_hash = match payload.password.as_deref() {
        Some(password) => Some(auth::hash_password(password)?),
        None => None,
    };
    let changes = UserChanges {
        uid: payload.uid.map(|v| v.trim().to_string()),
        name: payload.name.map(|v| v.trim().to_string()),
        email: payload.email.as_deref().map(normalize_email),
        password_hash,
        role: payload.role,
        is_enabled: payload.is_enabled,
    };

    let updated = state
        .repo
        .update_user(id, changes)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(updated.into()))
}

/// delete_user
///
/// [Authenticated Route] Soft delete: the account is disabled, its row and its
/// activation records are kept for the audit trail.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Disabled"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    let changes = UserChanges {
        is_enabled: Some(false),
        ..UserChanges::default()
    };
    state
        .repo
        .update_user(id, changes)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    tracing::info!(user_id = id, "user disabled");
    Ok(StatusCode::NO_CONTENT)
}

// --- Activation Records ---

/// list_activation_records
///
/// [Authenticated Route] The audit trail, oldest first, optionally for one user.
#[utoipa::path(
    get,
    path = "/activation-records",
    params(ActivationRecordFilter),
    responses((status = 200, description = "Records", body = [ActivationRecord]))
)]
pub async fn list_activation_records(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<ActivationRecordFilter>,
) -> Result<Json<Vec<ActivationRecord>>, AppError> {
    Ok(Json(
        state.repo.list_activation_records(filter.user_id).await?,
    ))
}

/// create_activation_record
///
/// [Authenticated Route] Appends a record by hand (e.g. a badge-less entry).
/// Missing `date`/`time` are stamped with the service clock.
#[utoipa::path(
    post,
    path = "/activation-records",
    request_body = CreateActivationRecordRequest,
    responses(
        (status = 201, description = "Appended", body = ActivationRecord),
        (status = 422, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn create_activation_record(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateActivationRecordRequest>,
) -> Result<(StatusCode, Json<ActivationRecord>), AppError> {
    let now = state.clock.now();
    let record = NewActivationRecord {
        user_id: payload.user_id,
        date: payload.date.unwrap_or(now.date()),
        time: payload
            .time
            .unwrap_or_else(|| now.time().with_nanosecond(0).unwrap_or(now.time())),
    };
    let appended = state.repo.append_activation_record(record).await?;
    Ok((StatusCode::CREATED, Json(appended)))
}

/// show_activation_record
///
/// [Authenticated Route] A single record by id.
#[utoipa::path(
    get,
    path = "/activation-records/{id}",
    params(("id" = i64, Path, description = "Activation record ID")),
    responses(
        (status = 200, description = "Found", body = ActivationRecord),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn show_activation_record(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ActivationRecord>, AppError> {
    state
        .repo
        .get_activation_record(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("activation record"))
}

/// update_activation_record
///
/// [Authenticated Route] Always refused: the audit trail is append-only.
#[utoipa::path(
    put,
    path = "/activation-records/{id}",
    params(("id" = i64, Path, description = "Activation record ID")),
    responses((status = 405, description = "Records are immutable", body = ErrorBody))
)]
pub async fn update_activation_record(AppPath(_id): AppPath<i64>) -> Result<StatusCode, AppError> {
    Err(AppError::ImmutableRecord)
}

/// delete_activation_record
///
/// [Authenticated Route] Always refused: the audit trail is append-only.
#[utoipa::path(
    delete,
    path = "/activation-records/{id}",
    params(("id" = i64, Path, description = "Activation record ID")),
    responses((status = 405, description = "Records are immutable", body = ErrorBody))
)]
pub async fn delete_activation_record(AppPath(_id): AppPath<i64>) -> Result<StatusCode, AppError> {
    Err(AppError::ImmutableRecord)
}

// --- Badge Readers ---

/// submit_tag_read
///
/// [Reader Route] Queues a badge read for the background worker and returns at
/// once. The response says nothing about whether the tag is registered.
#[utoipa::path(
    post,
    path = "/tag-reads",
    request_body = TagReadEvent,
    responses(
        (status = 202, description = "Queued"),
        (status = 401, description = "Missing or wrong reader key", body = ErrorBody),
        (status = 503, description = "Queue full or worker stopped", body = ErrorBody)
    )
)]
pub async fn submit_tag_read(
    _reader: ReaderKey,
    State(state): State<AppState>,
    AppJson(event): AppJson<TagReadEvent>,
) -> Result<StatusCode, AppError> {
    state.tag_reads.dispatch(event)?;
    Ok(StatusCode::ACCEPTED)
}
