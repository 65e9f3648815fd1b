use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::Response,
};
use tracing::warn;

use adopto_db::models::InsertOutcome;
use adopto_types::api::{FeedbackEntry, FeedbackForm};

use crate::error::ApiError;
use crate::forms::{submitted, validate};
use crate::state::{AppState, run_blocking};
use crate::uploads::{ImageReference, UploadError};

/// Multipart field carrying the optional attachment.
pub const IMAGE_FIELD: &str = "image";

const FEEDBACK_SUCCESS: &str = "/feedback_success.html";
const SUBMIT_ERROR: &str = "Error submitting feedback";
const LIST_ERROR: &str = "Error fetching feedback";

/// POST /feedback-submit: multipart form with an optional `image` file.
///
/// The image is written before the row. If anything after that fails, or the
/// submission turns out to be a replay, the file is removed again.
pub async fn submit_feedback(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut image: Option<ImageReference> = None;

    let result = receive_and_insert(&state, &mut multipart, &mut image).await;

    if let Some(reference) = &image {
        let keep = matches!(result, Ok(InsertOutcome::Inserted(_)));
        if !keep {
            warn!("Discarding unreferenced upload {}", reference.file_name);
            if let Err(e) = state.uploads.discard(reference).await {
                warn!("Failed to discard upload {}: {}", reference.file_name, e);
            }
        }
    }

    Ok(submitted("feedback", result?, FEEDBACK_SUCCESS))
}

async fn receive_and_insert(
    state: &AppState,
    multipart: &mut Multipart,
    image: &mut Option<ImageReference>,
) -> Result<InsertOutcome, ApiError> {
    let mut form = FeedbackForm::default();
    let mut image_seen = false;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            if name == IMAGE_FIELD && !image_seen {
                image_seen = true;
                *image = state
                    .uploads
                    .accept(Some(&file_name), &mut field)
                    .await
                    .map_err(upload_error)?;
                continue;
            }
            if state.reject_extra_files {
                return Err(ApiError::ExtraFile(name));
            }
            warn!("Ignoring extra file field '{}' ({})", name, file_name);
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "name" => form.name = value,
            "email" => form.email = Some(value),
            "feedback" => form.feedback = value,
            "idempotency_key" => form.idempotency_key = Some(value),
            _ => {}
        }
    }

    validate(&form)?;

    let image_path = image.as_ref().map(|r| r.path.clone());
    run_blocking(state, SUBMIT_ERROR, move |db| {
        db.insert_feedback(&form, image_path.as_deref())
    })
    .await
}

/// GET /feedbacks: every feedback entry, newest first.
pub async fn list_feedbacks(
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedbackEntry>>, ApiError> {
    let rows = run_blocking(&state, LIST_ERROR, |db| db.list_feedback()).await?;

    let entries = rows
        .into_iter()
        .map(|row| FeedbackEntry {
            name: row.name,
            feedback: row.feedback,
            image_path: row.image_path,
        })
        .collect();

    Ok(Json(entries))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::Multipart(e.body_text())
    }
}

fn upload_error(e: UploadError) -> ApiError {
    match e {
        UploadError::TooLarge => ApiError::PayloadTooLarge,
        UploadError::Read(detail) => ApiError::Multipart(detail),
        UploadError::Storage(source) => ApiError::Storage {
            context: SUBMIT_ERROR,
            source,
        },
    }
}
