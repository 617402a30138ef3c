mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Username for login.
    pub username: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last login timestamp.
    pub last_login: Option<i64>,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Uploaded book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Unique book ID.
    pub id: String,
    /// Owning user ID.
    pub owner_id: String,
    /// Display title (FB2 metadata, or the uploaded file name).
    pub title: String,
    /// Primary author, when the FB2 metadata names one.
    pub author: Option<String>,
    /// Server-side path of the stored file.
    #[serde(skip_serializing)]
    pub path: String,
    /// File size in bytes.
    pub file_size: i64,
    /// Upload timestamp.
    pub created_at: i64,
}

/// Reading bookmark: one per (user, book) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    /// User ID.
    pub user_id: String,
    /// Book ID.
    pub book_id: String,
    /// Character offset where the user stopped reading.
    pub position: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
