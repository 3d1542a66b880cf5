use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// Capability level of an account. Stored as lowercase text in `users.role`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    Member,
}

/// User
///
/// The canonical account row from the `users` table. Never serialized directly,
/// responses go through [`UserResource`] so the password hash cannot leak.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    // Tag identifier burned into the user's RFID badge. Unique.
    pub uid: String,
    pub name: String,
    pub email: String,
    // Argon2 PHC string.
    pub password_hash: String,
    pub role: Role,
    // Gate on all API access. Disabled accounts are soft-deleted accounts.
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// ActivationRecord
///
/// One badge read matched to a user. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ActivationRecord {
    pub id: i64,
    pub user_id: i64,
    #[ts(type = "string")]
    #[schema(value_type = String, format = Date, example = "2025-03-14")]
    pub date: NaiveDate,
    #[ts(type = "string")]
    #[schema(value_type = String, example = "09:26:53")]
    pub time: NaiveTime,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Repository Inputs ---

/// Fields needed to append an activation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivationRecord {
    pub user_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// A user ready for insertion. The password has already been hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_enabled: bool,
}

/// Partial update of a user. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub uid: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub is_enabled: Option<bool>,
}

// --- Response Payloads (Output Schemas) ---

/// UserResource
///
/// Public shape of a user. `activation_records` is only present when the caller
/// loaded them (e.g. `GET /users/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResource {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub activation_records: Option<Vec<ActivationRecord>>,
}

impl From<User> for UserResource {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            uid: user.uid,
            name: user.name,
            email: user.email,
            role: user.role,
            is_enabled: user.is_enabled,
            activation_records: None,
        }
    }
}

impl UserResource {
    pub fn with_activation_records(mut self, records: Vec<ActivationRecord>) -> Self {
        self.activation_records = Some(records);
        self
    }
}

/// LoginResponse
///
/// Returned by `POST /login`. `token` goes into `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
    pub user: UserResource,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Credentials for `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub password: String,
}

/// CreateUserRequest
///
/// Provisioning payload for `POST /users`. The password is hashed before it reaches
/// the repository and is never persisted or logged in clear.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    #[schema(example = "A1B2")]
    pub uid: String,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

/// UpdateUserRequest
///
/// Partial update payload for `PUT /users/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

/// CreateActivationRecordRequest
///
/// Manual append for `POST /activation-records`. Missing `date`/`time` default to now.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateActivationRecordRequest {
    pub user_id: i64,
    #[serde(default)]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub time: Option<NaiveTime>,
}

pub const MIN_PASSWORD_LEN: usize = 8;

fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

fn require_email(value: &str) -> Result<(), String> {
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err("email must be a valid address".to_string()),
    }
}

fn require_password(value: &str) -> Result<(), String> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        Err(format!("password must be at least {MIN_PASSWORD_LEN} characters"))
    } else {
        Ok(())
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), String> {
        require_non_blank("email", &self.email)?;
        require_non_blank("password", &self.password)
    }
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        require_non_blank("uid", &self.uid)?;
        require_non_blank("name", &self.name)?;
        require_email(&self.email)?;
        require_password(&self.password)
    }
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(uid) = &self.uid {
            require_non_blank("uid", uid)?;
        }
        if let Some(name) = &self.name {
            require_non_blank("name", name)?;
        }
        if let Some(email) = &self.email {
            require_email(email)?;
        }
        if let Some(password) = &self.password {
            require_password(password)?;
        }
        Ok(())
    }
}
