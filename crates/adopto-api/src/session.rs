use axum::{Json, extract::State, response::Response};
use tower_sessions::Session;
use tracing::{info, warn};

use adopto_types::api::SessionUser;

use crate::error::ApiError;
use crate::forms::found;
use crate::state::{AppState, run_blocking};

/// Session key holding the logged-in [`SessionUser`].
pub const SESSION_USER_KEY: &str = "user";

/// Bind `user` to the caller's session under a fresh session id.
pub async fn establish(session: &Session, user: &SessionUser) -> Result<(), ApiError> {
    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::session("Error logging in", e))?;
    session
        .insert(SESSION_USER_KEY, user)
        .await
        .map_err(|e| ApiError::session("Error logging in", e))?;
    Ok(())
}

pub async fn current_user(session: &Session) -> Result<Option<SessionUser>, ApiError> {
    session
        .get(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::session("Error reading session", e))
}

/// GET /me: the logged-in user, re-read from the accounts table.
pub async fn me(State(state): State<AppState>, session: Session) -> Result<Json<SessionUser>, ApiError> {
    let user = current_user(&session).await?.ok_or(ApiError::Unauthenticated)?;

    let id = user.id.to_string();
    let row = run_blocking(&state, "Error reading session", move |db| db.get_user_by_id(&id)).await?;

    match row {
        Some(row) => Ok(Json(SessionUser {
            id: user.id,
            username: row.username,
        })),
        None => {
            warn!("Session refers to missing account {}; clearing", user.id);
            session
                .flush()
                .await
                .map_err(|e| ApiError::session("Error reading session", e))?;
            Err(ApiError::Unauthenticated)
        }
    }
}

/// POST /logout: drop the session record and its cookie.
pub async fn logout(session: Session) -> Result<Response, ApiError> {
    if let Some(user) = current_user(&session).await? {
        info!("User logged out: {}", user.username);
    }
    session
        .flush()
        .await
        .map_err(|e| ApiError::session("Error logging out", e))?;
    Ok(found("/"))
}
