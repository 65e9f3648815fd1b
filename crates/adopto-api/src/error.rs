use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Every failure a handler can return. Client-facing text is the `Display`
/// output; causes of 500s are logged, never sent.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing required field: {0}")]
    Validation(&'static str),

    #[error("Malformed form data")]
    Multipart(String),

    #[error("Unexpected file field: {0}")]
    ExtraFile(String),

    #[error("Attachment too large")]
    PayloadTooLarge,

    #[error("Invalid username or password")]
    Auth,

    #[error("Not logged in")]
    Unauthenticated,

    #[error("{0}")]
    DuplicateKey(&'static str),

    #[error("{context}")]
    Storage {
        context: &'static str,
        source: std::io::Error,
    },

    #[error("{context}")]
    Database {
        context: &'static str,
        source: anyhow::Error,
    },

    #[error("{context}")]
    Hashing { context: &'static str, detail: String },

    #[error("{context}")]
    Session {
        context: &'static str,
        source: tower_sessions::session::Error,
    },
}

impl ApiError {
    pub fn database(context: &'static str, source: anyhow::Error) -> Self {
        Self::Database { context, source }
    }

    pub fn session(context: &'static str, source: tower_sessions::session::Error) -> Self {
        Self::Session { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Multipart(_) | Self::ExtraFile(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Auth | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::DuplicateKey(_)
            | Self::Storage { .. }
            | Self::Database { .. }
            | Self::Hashing { .. }
            | Self::Session { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage { context, source } => error!("{}: {}", context, source),
            Self::Database { context, source } => error!("{}: {:#}", context, source),
            Self::Hashing { context, detail } => error!("{}: {}", context, detail),
            Self::Session { context, source } => error!("{}: {}", context, source),
            Self::DuplicateKey(context) => warn!("{}: username or email already registered", context),
            Self::Multipart(detail) => warn!("Rejected multipart body: {}", detail),
            _ => {}
        }

        (self.status(), self.to_string()).into_response()
    }
}
