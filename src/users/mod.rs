// User accounts
// Registration, lookup and profile updates

pub mod validators;

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::Database;
use crate::error::{ShopError, ShopResult};
use crate::security::passwords;

/// User row including the password hash
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub forename: String,
    pub surname: String,
    pub password_hash: String,
    pub created: String,
}

impl UserRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            forename: row.get("forename")?,
            surname: row.get("surname")?,
            password_hash: row.get("password")?,
            created: row.get("created")?,
        })
    }
}

/// Registration form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub forename: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Personal information form; absent fields stay unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub forename: Option<String>,
    pub surname: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

const USER_COLUMNS: &str = "id, email, forename, surname, password, created";

#[derive(Clone)]
pub struct UserService {
    db: Database,
}

impl UserService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn user_by_id(&self, id: i64) -> ShopResult<Option<UserRecord>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = self
            .db
            .with_conn(|conn| conn.query_row(&sql, params![id], UserRecord::from_row).optional())?;

        Ok(user)
    }

    pub fn user_by_email(&self, email: &str) -> ShopResult<Option<UserRecord>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1 COLLATE NOCASE", USER_COLUMNS);
        let user = self
            .db
            .with_conn(|conn| conn.query_row(&sql, params![email.trim()], UserRecord::from_row).optional())?;

        Ok(user)
    }

    /// Validate and store a new account; returns its id
    pub fn create_user(&self, form: &NewUser) -> ShopResult<i64> {
        let email = form.email.trim();
        let forename = form.forename.trim();
        let surname = form.surname.trim();
        let password = form.password.trim();
        let confirm = form.confirm_password.trim();

        if email.is_empty() || forename.is_empty() || surname.is_empty() || password.is_empty() || confirm.is_empty() {
            return Err(required_fields());
        }

        if !validators::is_email(email) {
            return Err(ShopError::Validation("Please enter a valid email address.".to_string()));
        }

        if self.user_by_email(email)?.is_some() {
            return Err(ShopError::Validation("Entered email is already registered.".to_string()));
        }

        let hash = checked_password_hash(password, confirm)?;

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, forename, surname, password) VALUES (?1, ?2, ?3, ?4)",
                params![email, forename, surname, hash],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        info!(user_id = id, "User registered");
        Ok(id)
    }

    /// Apply a personal information update
    pub fn update_user(&self, id: i64, update: &UserUpdate) -> ShopResult<()> {
        let forename = update.forename.as_deref().map(str::trim);
        let surname = update.surname.as_deref().map(str::trim);
        if forename == Some("") || surname == Some("") {
            return Err(required_fields());
        }

        let password = update.password.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let confirm = update.confirm_password.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let hash = match (password, confirm) {
            (None, None) => None,
            (Some(password), Some(confirm)) => Some(checked_password_hash(password, confirm)?),
            _ => return Err(required_fields()),
        };

        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    forename = COALESCE(?2, forename),
                    surname = COALESCE(?3, surname),
                    password = COALESCE(?4, password)
                 WHERE id = ?1",
                params![id, forename, surname, hash],
            )
        })?;

        if changed == 0 {
            return Err(ShopError::NotFound("User not found.".to_string()));
        }

        info!(user_id = id, password_changed = hash.is_some(), "User updated");
        Ok(())
    }

    /// Replace a stored hash without re-validating the password policy
    pub fn store_password_hash(&self, id: i64, hash: &str) -> ShopResult<()> {
        self.db.with_conn(|conn| {
            conn.execute("UPDATE users SET password = ?2 WHERE id = ?1", params![id, hash])
        })?;
        Ok(())
    }
}

fn required_fields() -> ShopError {
    ShopError::Validation("Please enter all required fields.".to_string())
}

fn checked_password_hash(password: &str, confirm: &str) -> ShopResult<String> {
    if !validators::is_password(password) {
        return Err(ShopError::Validation(
            "Your password must be at least 8 characters long, contain letters and numbers.".to_string(),
        ));
    }

    if password != confirm {
        return Err(ShopError::Validation(
            "Fields password and confirm password must matches.".to_string(),
        ));
    }

    passwords::hash(password)
}
