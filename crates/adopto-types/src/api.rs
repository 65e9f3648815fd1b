use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Form bodies arrive from plain HTML forms. Required fields default to an
// empty string so a missing field is reported as a validation failure rather
// than a body rejection.

// -- Session --

/// Identity stored in the server-side session after login.
/// Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

// -- Forms --

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VolunteerForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DonationForm {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub payment_method: String,
    pub idempotency_key: Option<String>,
}

/// Adoption application. The site's form uses hyphenated field names.
#[derive(Debug, Deserialize)]
pub struct AdoptionForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "pet-interest")]
    pub pet_interest: Option<String>,
    pub experience: Option<String>,
    #[serde(rename = "living-situation")]
    pub living_situation: Option<String>,
    #[serde(rename = "why-adopt")]
    pub why_adopt: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Feedback text fields. Built from a multipart body, so it is not
/// deserialized directly; the image travels separately.
#[derive(Debug, Default)]
pub struct FeedbackForm {
    pub name: String,
    pub email: Option<String>,
    pub feedback: String,
    pub idempotency_key: Option<String>,
}

// -- Responses --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub name: String,
    pub feedback: String,
    pub image_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FormTokenResponse {
    pub token: Uuid,
}
