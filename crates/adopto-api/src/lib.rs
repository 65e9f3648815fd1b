//! HTTP layer for the adoption site backend: form intake, accounts and
//! sessions, and image uploads.

pub mod auth;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod forms;
pub mod router;
pub mod session;
pub mod state;
pub mod sweep;
pub mod uploads;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};
