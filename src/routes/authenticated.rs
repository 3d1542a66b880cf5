use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind `gate::require_enabled_user`, applied in
/// `create_router`: no token means 401, a disabled account means 403, and only
/// then does the handler run with the caller's `AuthContext` in its extensions.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /user
        // The caller's own account.
        .route("/user", get(handlers::get_current_user))
        // POST /logout
        // Revokes the bearer token used for the request.
        .route("/logout", post(handlers::logout))
        // --- Users ---
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        // DELETE soft-disables; accounts are never removed.
        .route(
            "/users/{id}",
            get(handlers::show_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // --- Activation Records ---
        .route(
            "/activation-records",
            get(handlers::list_activation_records).post(handlers::create_activation_record),
        )
        // PUT/DELETE answer 405: the audit trail is append-only.
        .route(
            "/activation-records/{id}",
            get(handlers::show_activation_record)
                .put(handlers::update_activation_record)
                .delete(handlers::delete_activation_record),
        )
}
