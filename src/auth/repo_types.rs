use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::UserId;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,                 // unique user ID
    pub username: String,           // case-sensitive login name
    #[serde(skip_serializing)]
    pub password_hash: String,      // Argon2 hash, not exposed in JSON
    pub email: Option<String>,      // optional contact address
    pub created_at: OffsetDateTime, // creation timestamp
}
