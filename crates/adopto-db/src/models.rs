/// Database row types, mapped directly from SQLite rows.
/// Distinct from adopto-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

pub struct FeedbackRow {
    pub name: String,
    pub feedback: String,
    pub image_path: Option<String>,
}

/// Result of a keyed insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written; carries its rowid.
    Inserted(i64),
    /// The idempotency key was seen inside the replay window; nothing written.
    Replayed,
}
