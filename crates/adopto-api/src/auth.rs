use axum::{extract::State, response::Response};
use tower_sessions::Session;
use tracing::{info, warn};

use adopto_types::api::{LoginForm, SessionUser, SignupForm};

use crate::credentials::{self, CredentialError};
use crate::error::ApiError;
use crate::extract::FormOrJson;
use crate::forms::{found, validate};
use crate::session;
use crate::state::AppState;

const SIGNUP_SUCCESS: &str = "/success.html";
const LOGIN_SUCCESS: &str = "/login_success.html";

const SIGNUP_ERROR: &str = "Error creating user";
const LOGIN_ERROR: &str = "Error logging in";

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<SignupForm>,
) -> Result<Response, ApiError> {
    validate(&form)?;

    let db = state.clone();
    let user_id = tokio::task::spawn_blocking(move || {
        credentials::create(&db.db, &form.username, &form.email, &form.password)
    })
    .await
    .map_err(|e| ApiError::database(SIGNUP_ERROR, anyhow::anyhow!("blocking task failed: {}", e)))?
    .map_err(|e| credential_error(SIGNUP_ERROR, e))?;

    info!("User created: {}", user_id);
    Ok(found(SIGNUP_SUCCESS))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    FormOrJson(form): FormOrJson<LoginForm>,
) -> Result<Response, ApiError> {
    validate(&form)?;

    let db = state.clone();
    let username = form.username.clone();
    let account = tokio::task::spawn_blocking(move || {
        credentials::verify(&db.db, &form.username, &form.password)
    })
    .await
    .map_err(|e| ApiError::database(LOGIN_ERROR, anyhow::anyhow!("blocking task failed: {}", e)))?
    .map_err(|e| {
        if matches!(e, CredentialError::AuthFailure) {
            warn!("Failed login for {}", username);
        }
        credential_error(LOGIN_ERROR, e)
    })?;

    session::establish(
        &session,
        &SessionUser {
            id: account.id,
            username: account.username.clone(),
        },
    )
    .await?;

    info!("User logged in: {}", account.username);
    Ok(found(LOGIN_SUCCESS))
}

fn credential_error(context: &'static str, e: CredentialError) -> ApiError {
    match e {
        CredentialError::AuthFailure => ApiError::Auth,
        CredentialError::DuplicateKey => ApiError::DuplicateKey(context),
        CredentialError::Hashing(detail) => ApiError::Hashing { context, detail },
        CredentialError::Database(source) => ApiError::database(context, source),
    }
}
