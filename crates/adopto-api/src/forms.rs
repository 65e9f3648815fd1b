use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;
use uuid::Uuid;

use adopto_db::models::InsertOutcome;
use adopto_types::api::{
    AdoptionForm, ContactForm, DonationForm, FeedbackForm, FormTokenResponse, LoginForm,
    SignupForm, VolunteerForm,
};

use crate::error::ApiError;
use crate::extract::FormOrJson;
use crate::state::{AppState, run_blocking};

const CONTACT_SUCCESS: &str = "/contact_success.html";
const VOLUNTEER_SUCCESS: &str = "/volunteer_success.html";
const DONATION_SUCCESS: &str = "/donation_success.html";
const ADOPTION_SUCCESS: &str = "/adoption_success.html";

/// Forms with fields that must be non-blank.
pub trait Required {
    /// `(field name, value)` for every required field, in form order.
    fn required(&self) -> Vec<(&'static str, &str)>;
}

/// Reject the first required field that is empty after trimming.
pub fn validate<T: Required>(form: &T) -> Result<(), ApiError> {
    match form.required().into_iter().find(|(_, v)| v.trim().is_empty()) {
        Some((field, _)) => Err(ApiError::Validation(field)),
        None => Ok(()),
    }
}

impl Required for SignupForm {
    fn required(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("username", self.username.as_str()),
            ("email", self.email.as_str()),
            ("password", self.password.as_str()),
        ]
    }
}

impl Required for LoginForm {
    fn required(&self) -> Vec<(&'static str, &str)> {
        vec![("username", self.username.as_str()), ("password", self.password.as_str())]
    }
}

impl Required for ContactForm {
    fn required(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("name", self.name.as_str()),
            ("email", self.email.as_str()),
            ("message", self.message.as_str()),
        ]
    }
}

impl Required for VolunteerForm {
    fn required(&self) -> Vec<(&'static str, &str)> {
        vec![("name", self.name.as_str()), ("email", self.email.as_str())]
    }
}

impl Required for DonationForm {
    fn required(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("amount", self.amount.as_str()),
            ("full_name", self.full_name.as_str()),
            ("email", self.email.as_str()),
            ("payment_method", self.payment_method.as_str()),
        ]
    }
}

impl Required for AdoptionForm {
    fn required(&self) -> Vec<(&'static str, &str)> {
        vec![("name", self.name.as_str()), ("email", self.email.as_str())]
    }
}

impl Required for FeedbackForm {
    fn required(&self) -> Vec<(&'static str, &str)> {
        vec![("name", self.name.as_str()), ("feedback", self.feedback.as_str())]
    }
}

/// 302 to a page on this site.
pub fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Log the insert and send the browser to the form's success page. A replayed
/// submission lands on the same page.
pub fn submitted(table: &str, outcome: InsertOutcome, success: &'static str) -> Response {
    match outcome {
        InsertOutcome::Inserted(id) => info!("Inserted {} row {}", table, id),
        InsertOutcome::Replayed => info!("Replayed {} submission, nothing written", table),
    }
    found(success)
}

/// POST /contact-submit
pub async fn submit_contact(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<ContactForm>,
) -> Result<Response, ApiError> {
    validate(&form)?;
    let outcome = run_blocking(&state, "Error submitting contact form", move |db| {
        db.insert_contact(&form)
    })
    .await?;
    Ok(submitted("contacts", outcome, CONTACT_SUCCESS))
}

/// POST /volunteer-submit
pub async fn submit_volunteer(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<VolunteerForm>,
) -> Result<Response, ApiError> {
    validate(&form)?;
    let outcome = run_blocking(&state, "Error submitting volunteer application", move |db| {
        db.insert_volunteer(&form)
    })
    .await?;
    Ok(submitted("volunteers", outcome, VOLUNTEER_SUCCESS))
}

/// POST /donate-submit
pub async fn submit_donation(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<DonationForm>,
) -> Result<Response, ApiError> {
    validate(&form)?;
    let outcome = run_blocking(&state, "Error submitting donation form", move |db| {
        db.insert_donation(&form)
    })
    .await?;
    Ok(submitted("donations", outcome, DONATION_SUCCESS))
}

/// POST /adoption-submit
pub async fn submit_adoption(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<AdoptionForm>,
) -> Result<Response, ApiError> {
    validate(&form)?;
    let outcome = run_blocking(&state, "Error submitting adoption application", move |db| {
        db.insert_adoption(&form)
    })
    .await?;
    Ok(submitted("adoptions", outcome, ADOPTION_SUCCESS))
}

/// GET /form-token: a fresh idempotency key to embed in a rendered form.
pub async fn form_token() -> Json<FormTokenResponse> {
    Json(FormTokenResponse {
        token: Uuid::new_v4(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reports_first_blank_field() {
        let form = DonationForm {
            amount: "10".into(),
            full_name: "  ".into(),
            email: String::new(),
            payment_method: "card".into(),
            idempotency_key: None,
        };
        assert!(matches!(validate(&form), Err(ApiError::Validation("full_name"))));
    }

    #[test]
    fn test_optional_fields_not_required() {
        let form = VolunteerForm {
            name: "Ben".into(),
            email: "ben@example.com".into(),
            phone: None,
            message: None,
            idempotency_key: None,
        };
        assert!(validate(&form).is_ok());
    }
}
