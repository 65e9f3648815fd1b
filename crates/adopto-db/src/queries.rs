use crate::models::{FeedbackRow, InsertOutcome, UserRow};
use crate::Database;
use adopto_types::api::{AdoptionForm, ContactForm, DonationForm, FeedbackForm, VolunteerForm};
use anyhow::Result;
use rusqlite::Connection;
use std::time::Duration;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Form submissions --

    pub fn insert_contact(&self, form: &ContactForm) -> Result<InsertOutcome> {
        self.insert_keyed("contact", form.idempotency_key.as_deref(), |conn| {
            conn.execute(
                "INSERT INTO contacts (name, email, message) VALUES (?1, ?2, ?3)",
                (&form.name, &form.email, &form.message),
            )
        })
    }

    pub fn insert_volunteer(&self, form: &VolunteerForm) -> Result<InsertOutcome> {
        self.insert_keyed("volunteer", form.idempotency_key.as_deref(), |conn| {
            conn.execute(
                "INSERT INTO volunteers (name, email, phone, message) VALUES (?1, ?2, ?3, ?4)",
                (&form.name, &form.email, &form.phone, &form.message),
            )
        })
    }

    pub fn insert_donation(&self, form: &DonationForm) -> Result<InsertOutcome> {
        self.insert_keyed("donation", form.idempotency_key.as_deref(), |conn| {
            conn.execute(
                "INSERT INTO donations (amount, full_name, email, payment_method) VALUES (?1, ?2, ?3, ?4)",
                (&form.amount, &form.full_name, &form.email, &form.payment_method),
            )
        })
    }

    pub fn insert_adoption(&self, form: &AdoptionForm) -> Result<InsertOutcome> {
        self.insert_keyed("adoption", form.idempotency_key.as_deref(), |conn| {
            conn.execute(
                "INSERT INTO adoptions (name, email, phone, address, pet_interest, experience, living_situation, why_adopt)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    form.name,
                    form.email,
                    form.phone,
                    form.address,
                    form.pet_interest,
                    form.experience,
                    form.living_situation,
                    form.why_adopt,
                ],
            )
        })
    }

    pub fn insert_feedback(
        &self,
        form: &FeedbackForm,
        image_path: Option<&str>,
    ) -> Result<InsertOutcome> {
        self.insert_keyed("feedback", form.idempotency_key.as_deref(), |conn| {
            conn.execute(
                "INSERT INTO feedback (name, email, feedback, image_path) VALUES (?1, ?2, ?3, ?4)",
                (&form.name, &form.email, &form.feedback, image_path),
            )
        })
    }

    /// All feedback, newest first. Rows sharing a timestamp fall back to
    /// insertion order.
    pub fn list_feedback(&self) -> Result<Vec<FeedbackRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, feedback, image_path
                 FROM feedback
                 ORDER BY submission_date DESC, id DESC",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(FeedbackRow {
                        name: row.get(0)?,
                        feedback: row.get(1)?,
                        image_path: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Every image path some feedback row points at.
    pub fn referenced_images(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT image_path FROM feedback WHERE image_path IS NOT NULL")?;
            let paths = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(paths)
        })
    }

    // -- Idempotency keys --

    /// Drop keys older than the replay window. Returns how many were removed.
    pub fn prune_submission_keys(&self) -> Result<usize> {
        let cutoff = replay_cutoff(self.replay_window());
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM submission_keys WHERE created_at < ?1", [&cutoff])?;
            Ok(n)
        })
    }

    /// Run `insert` and record `key` in one transaction, unless `key` was
    /// already recorded for `form` inside the replay window.
    fn insert_keyed<F>(&self, form: &str, key: Option<&str>, insert: F) -> Result<InsertOutcome>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        let key = key.map(str::trim).filter(|k| !k.is_empty());
        let cutoff = replay_cutoff(self.replay_window());

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            if let Some(key) = key {
                let seen: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM submission_keys WHERE key = ?1 AND form = ?2 AND created_at >= ?3",
                        (key, form, &cutoff),
                        |row| row.get(0),
                    )
                    .optional()?;
                if seen.is_some() {
                    return Ok(InsertOutcome::Replayed);
                }
            }

            insert(&tx)?;
            // Read before touching submission_keys, which has its own rowid.
            let id = tx.last_insert_rowid();

            if let Some(key) = key {
                tx.execute(
                    "INSERT INTO submission_keys (key, form) VALUES (?1, ?2)
                     ON CONFLICT(key, form) DO UPDATE SET created_at = datetime('now')",
                    (key, form),
                )?;
            }

            tx.commit()?;
            Ok(InsertOutcome::Inserted(id))
        })
    }
}

/// Oldest `created_at` still inside the window, in SQLite's `datetime()` format.
/// A window reaching past the representable range covers everything.
fn replay_cutoff(window: Duration) -> String {
    chrono::TimeDelta::from_std(window)
        .ok()
        .and_then(|window| chrono::Utc::now().checked_sub_signed(window))
        .map(|cutoff| cutoff.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "0000-01-01 00:00:00".to_string())
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, password FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
        })
        .unwrap()
    }

    fn contact(key: Option<&str>) -> ContactForm {
        ContactForm {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            message: "Do you have cats?".into(),
            idempotency_key: key.map(String::from),
        }
    }

    fn feedback(name: &str) -> FeedbackForm {
        FeedbackForm {
            name: name.into(),
            email: None,
            feedback: "Lovely shelter".into(),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_user_lookup() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "a@x.com", "$argon2id$fake").unwrap();

        let user = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.email, "a@x.com");
        assert!(db.get_user_by_id("u1").unwrap().is_some());
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_and_email() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "a@x.com", "h").unwrap();

        let err = db.create_user("u2", "alice", "other@x.com", "h").unwrap_err();
        assert!(is_unique_violation(&err));
        let err = db.create_user("u3", "bob", "a@x.com", "h").unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(count(&db, "users"), 1);
    }

    #[test]
    fn test_each_insert_adds_one_row() {
        let db = Database::open_in_memory().unwrap();

        assert!(matches!(db.insert_contact(&contact(None)).unwrap(), InsertOutcome::Inserted(_)));
        db.insert_volunteer(&VolunteerForm {
            name: "Ben".into(),
            email: "ben@example.com".into(),
            phone: None,
            message: Some("Weekends".into()),
            idempotency_key: None,
        })
        .unwrap();
        db.insert_donation(&DonationForm {
            amount: "25".into(),
            full_name: "Cy".into(),
            email: "cy@example.com".into(),
            payment_method: "card".into(),
            idempotency_key: None,
        })
        .unwrap();
        db.insert_adoption(&AdoptionForm {
            name: "Di".into(),
            email: "di@example.com".into(),
            phone: None,
            address: None,
            pet_interest: Some("Rex".into()),
            experience: None,
            living_situation: None,
            why_adopt: None,
            idempotency_key: None,
        })
        .unwrap();

        for table in ["contacts", "volunteers", "donations", "adoptions"] {
            assert_eq!(count(&db, table), 1, "{}", table);
        }
    }

    #[test]
    fn test_replayed_key_skips_insert() {
        let db = Database::open_in_memory().unwrap();

        let first = db.insert_contact(&contact(Some("tok-1"))).unwrap();
        let second = db.insert_contact(&contact(Some("tok-1"))).unwrap();
        let other = db.insert_contact(&contact(Some("tok-2"))).unwrap();

        assert!(matches!(first, InsertOutcome::Inserted(_)));
        assert_eq!(second, InsertOutcome::Replayed);
        assert!(matches!(other, InsertOutcome::Inserted(_)));
        assert_eq!(count(&db, "contacts"), 2);
    }

    #[test]
    fn test_blank_key_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        db.insert_contact(&contact(Some("  "))).unwrap();
        db.insert_contact(&contact(Some(""))).unwrap();
        assert_eq!(count(&db, "contacts"), 2);
        assert_eq!(count(&db, "submission_keys"), 0);
    }

    #[test]
    fn test_key_outside_window_is_accepted_again() {
        let db = Database::open_in_memory()
            .unwrap()
            .with_replay_window(Duration::from_secs(60));

        db.insert_contact(&contact(Some("old"))).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE submission_keys SET created_at = datetime('now', '-1 hour')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let again = db.insert_contact(&contact(Some("old"))).unwrap();
        assert!(matches!(again, InsertOutcome::Inserted(_)));
        assert_eq!(count(&db, "contacts"), 2);
    }

    #[test]
    fn test_prune_submission_keys() {
        let db = Database::open_in_memory()
            .unwrap()
            .with_replay_window(Duration::from_secs(60));
        db.insert_contact(&contact(Some("a"))).unwrap();
        db.insert_contact(&contact(Some("b"))).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE submission_keys SET created_at = datetime('now', '-1 day') WHERE key = 'a'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.prune_submission_keys().unwrap(), 1);
        assert_eq!(count(&db, "submission_keys"), 1);
    }

    #[test]
    fn test_feedback_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_feedback(&feedback("first"), None).unwrap();
        db.insert_feedback(&feedback("second"), Some("uploads/a.png")).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE feedback SET submission_date = datetime('now', '-1 day') WHERE name = 'second'",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        db.insert_feedback(&feedback("third"), None).unwrap();

        let names: Vec<String> = db.list_feedback().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["third", "first", "second"]);
        assert_eq!(db.referenced_images().unwrap(), vec!["uploads/a.png".to_string()]);
    }
}

