use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};

use crate::state::AppState;
use crate::uploads::PUBLIC_PREFIX;
use crate::{auth, feedback, forms, session};

/// Room for the text fields and multipart framing around an attachment.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Every API route, the `/uploads` static mount, and the session layer.
///
/// Sessions live in memory and use a browser-session cookie; nothing expires
/// them server-side until logout or restart.
pub fn build(state: AppState, cookie_secure: bool) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnSessionEnd);

    let body_limit = usize::try_from(state.uploads.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let uploads = ServeDir::new(state.uploads.dir());

    Router::new()
        .route("/contact-submit", post(forms::submit_contact))
        .route("/volunteer-submit", post(forms::submit_volunteer))
        .route("/donate-submit", post(forms::submit_donation))
        .route("/adoption-submit", post(forms::submit_adoption))
        .route("/feedback-submit", post(feedback::submit_feedback))
        .route("/feedbacks", get(feedback::list_feedbacks))
        .route("/form-token", get(forms::form_token))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(session::logout))
        .route("/me", get(session::me))
        .route("/health", get(health))
        .nest_service(&format!("/{}", PUBLIC_PREFIX), uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(sessions)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
