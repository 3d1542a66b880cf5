//! Access gate: keeps disabled accounts out of every protected route.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{auth::AuthContext, error::AppError};

/// access_gate
///
/// ALLOW when the authenticated user is enabled, DENY otherwise. Pure: no
/// mutation, no logging. Evaluated on every request against the freshly loaded user.
pub fn access_gate(ctx: &AuthContext) -> Result<(), AppError> {
    if ctx.user.is_enabled {
        Ok(())
    } else {
        Err(AppError::UserNotEnabled)
    }
}

/// require_enabled_user
///
/// Middleware for the authenticated router. Extracting `AuthContext` rejects
/// unauthenticated requests with 401; the gate then rejects disabled users with
/// 403 before the handler runs. Allowed requests carry the context to the handler
/// as a request extension.
pub async fn require_enabled_user(
    ctx: AuthContext,
    mut request: Request,
    next: Next,
) -> Response {
    // 1. Authentication already happened: `ctx` only exists for a known user.

    // 2. Access Gate
    // A disabled account stops here with the fixed 403 body.
    if let Err(rejection) = access_gate(&ctx) {
        return rejection.into_response();
    }

    // 3. Hand-off
    // Handlers read the caller back out with `Extension<AuthContext>`.
    request.extensions_mut().insert(ctx);
    next.run(request).await
}
