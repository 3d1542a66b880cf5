mod common;

use axum::{Extension, Json, extract::State, http::StatusCode};
use badge_gate::{
    AppState,
    auth::{self, AuthContext},
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    handlers::{self, ActivationRecordFilter},
    models::{
        CreateActivationRecordRequest, CreateUserRequest, Role, UpdateUserRequest,
    },
    repository::{InMemoryRepository, Repository, RepositoryState},
};
use chrono::{NaiveDate, NaiveTime};
use common::{fixed_instant, seeded_repo, test_state, user};
use std::sync::Arc;
use tokio::test;

// --- TEST UTILITIES ---

async fn state_with(users: Vec<badge_gate::models::User>) -> (AppState, Arc<InMemoryRepository>) {
    let repo = seeded_repo(users).await;
    let (state, _queue) = test_state(repo.clone() as RepositoryState);
    (state, repo)
}

fn create_request(uid: &str, email: &str) -> CreateUserRequest {
    CreateUserRequest {
        uid: uid.to_string(),
        name: "Badge Holder".to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        role: None,
        is_enabled: None,
    }
}

// --- USERS ---

#[test]
async fn test_create_user_defaults_and_hashes_password() {
    let (state, repo) = state_with(vec![]).await;

    let (status, Json(created)) =
        handlers::create_user(State(state), AppJson(create_request("A1B2", "a@example.com")))
            .await
            .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.uid, "A1B2");
    assert_eq!(created.role, Role::Member);
    assert!(created.is_enabled);

    let stored = repo.get_user(created.id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, "password123");
    assert!(auth::verify_password("password123", &stored.password_hash));
}

#[test]
async fn test_create_user_duplicate_uid_conflicts() {
    let (state, _repo) = state_with(vec![user(7, "A1B2", true)]).await;

    let result =
        handlers::create_user(State(state), AppJson(create_request("A1B2", "fresh@example.com")))
            .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[test]
async fn test_create_user_lowercases_email() {
    let (state, _repo) = state_with(vec![user(7, "A1B2", true)]).await;

    let (_, Json(created)) = handlers::create_user(
        State(state.clone()),
        AppJson(create_request("C3D4", " Ada@Example.COM ")),
    )
    .await
    .unwrap();
    assert_eq!(created.email, "ada@example.com");

    // user7@example.com in another case is the same address.
    let result = handlers::create_user(
        State(state),
        AppJson(create_request("E5F6", "USER7@example.com")),
    )
    .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[test]
async fn test_create_user_rejects_short_password() {
    let (state, _repo) = state_with(vec![]).await;
    let mut payload = create_request("A1B2", "a@example.com");
    payload.password = "short".to_string();

    let result = handlers::create_user(State(state), AppJson(payload)).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
async fn test_show_user_includes_activation_records() {
    let (state, repo) = state_with(vec![user(7, "A1B2", true), user(8, "C3D4", true)]).await;
    for user_id in [7, 8, 7] {
        handlers::create_activation_record(
            State(state.clone()),
            AppJson(CreateActivationRecordRequest {
                user_id,
                date: None,
                time: None,
            }),
        )
        .await
        .unwrap();
    }

    let Json(shown) = handlers::show_user(State(state), AppPath(7)).await.unwrap();

    let records = shown.activation_records.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.user_id == 7));
    assert_eq!(repo.activation_records().await.len(), 3);
}

#[test]
async fn test_show_user_not_found() {
    let (state, _repo) = state_with(vec![]).await;

    let result = handlers::show_user(State(state), AppPath(42)).await;

    assert!(matches!(result, Err(AppError::NotFound("user"))));
}

#[test]
async fn test_update_user_toggles_enabled_flag_only() {
    let (state, _repo) = state_with(vec![user(7, "A1B2", true)]).await;

    let Json(updated) = handlers::update_user(
        State(state),
        AppPath(7),
        AppJson(UpdateUserRequest {
            is_enabled: Some(false),
            ..UpdateUserRequest::default()
        }),
    )
    .await
    .unwrap();

    assert!(!updated.is_enabled);
    assert_eq!(updated.uid, "A1B2");
    assert_eq!(updated.email, "user7@example.com");
}

#[test]
async fn test_update_user_cannot_steal_another_badge() {
    let (state, _repo) = state_with(vec![user(7, "A1B2", true), user(8, "C3D4", true)]).await;

    let result = handlers::update_user(
        State(state),
        AppPath(8),
        AppJson(UpdateUserRequest {
            uid: Some("A1B2".to_string()),
            ..UpdateUserRequest::default()
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[test]
async fn test_delete_user_soft_disables_and_keeps_records() {
    let (state, repo) = state_with(vec![user(7, "A1B2", true)]).await;
    handlers::create_activation_record(
        State(state.clone()),
        AppJson(CreateActivationRecordRequest {
            user_id: 7,
            date: None,
            time: None,
        }),
    )
    .await
    .unwrap();

    let status = handlers::delete_user(State(state), AppPath(7)).await.unwrap();

    assert_eq!(status, StatusCode::NO_CONTENT);
    let kept = repo.get_user(7).await.unwrap().unwrap();
    assert!(!kept.is_enabled);
    assert_eq!(repo.activation_records().await.len(), 1);
}

#[test]
async fn test_delete_missing_user_is_not_found() {
    let (state, _repo) = state_with(vec![]).await;

    let result = handlers::delete_user(State(state), AppPath(5)).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// --- ACTIVATION RECORDS ---

#[test]
async fn test_create_activation_record_stamps_with_clock() {
    let (state, _repo) = state_with(vec![user(7, "A1B2", true)]).await;

    let (status, Json(record)) = handlers::create_activation_record(
        State(state),
        AppJson(CreateActivationRecordRequest {
            user_id: 7,
            date: None,
            time: None,
        }),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record.date, fixed_instant().date());
    assert_eq!(record.time, fixed_instant().time());
}

#[test]
async fn test_create_activation_record_keeps_explicit_stamp() {
    let (state, _repo) = state_with(vec![user(7, "A1B2", true)]).await;
    let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let time = NaiveTime::from_hms_opt(23, 59, 59).unwrap();

    let (_, Json(record)) = handlers::create_activation_record(
        State(state),
        AppJson(CreateActivationRecordRequest {
            user_id: 7,
            date: Some(date),
            time: Some(time),
        }),
    )
    .await
    .unwrap();

    assert_eq!((record.date, record.time), (date, time));
}

#[test]
async fn test_create_activation_record_for_unknown_user_is_rejected() {
    let (state, repo) = state_with(vec![]).await;

    let result = handlers::create_activation_record(
        State(state),
        AppJson(CreateActivationRecordRequest {
            user_id: 404,
            date: None,
            time: None,
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(repo.activation_records().await.is_empty());
}

#[test]
async fn test_list_activation_records_filters_by_user() {
    let (state, _repo) = state_with(vec![user(7, "A1B2", true), user(8, "C3D4", true)]).await;
    for user_id in [7, 8, 8] {
        handlers::create_activation_record(
            State(state.clone()),
            AppJson(CreateActivationRecordRequest {
                user_id,
                date: None,
                time: None,
            }),
        )
        .await
        .unwrap();
    }

    let Json(all) = handlers::list_activation_records(
        State(state.clone()),
        AppQuery(ActivationRecordFilter::default()),
    )
    .await
    .unwrap();
    let Json(for_eight) = handlers::list_activation_records(
        State(state),
        AppQuery(ActivationRecordFilter { user_id: Some(8) }),
    )
    .await
    .unwrap();

    assert_eq!(all.len(), 3);
    assert_eq!(for_eight.len(), 2);
}

#[test]
async fn test_show_activation_record_not_found() {
    let (state, _repo) = state_with(vec![]).await;

    let result = handlers::show_activation_record(State(state), AppPath(1)).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// --- CURRENT USER / LOGOUT ---

#[test]
async fn test_get_current_user_echoes_context() {
    let ctx = AuthContext {
        user: user(7, "A1B2", true),
        token: None,
    };

    let Json(me) = handlers::get_current_user(Extension(ctx)).await;

    assert_eq!(me.id, 7);
    assert_eq!(me.uid, "A1B2");
}

#[test]
async fn test_logout_via_bypass_is_a_noop() {
    let (state, _repo) = state_with(vec![user(7, "A1B2", true)]).await;
    let ctx = AuthContext {
        user: user(7, "A1B2", true),
        token: None,
    };

    let status = handlers::logout(Extension(ctx), State(state)).await.unwrap();

    assert_eq!(status, StatusCode::NO_CONTENT);
}
