//! Credential manager: account creation and password verification.

use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        password::{hash_password, verify_password},
        repo_types::User,
    },
    db::UserId,
    error::AppError,
};

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^\S{1,64}$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // Verified against when the username is unknown so both paths cost one argon2 run.
    static ref DUMMY_HASH: Option<String> = hash_password("not-a-real-password").ok();
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Creates an account and returns its id. Writes exactly one row.
#[instrument(skip(db, password, email))]
pub async fn signup(
    db: &SqlitePool,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> Result<UserId, AppError> {
    if !is_valid_username(username) {
        warn!("invalid username");
        return Err(AppError::Validation(
            "username must be 1-64 characters without whitespace".into(),
        ));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let email = email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    if let Some(email) = email.as_deref() {
        if !is_valid_email(email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::Validation("invalid email".into()));
        }
    }

    if User::find_by_username(db, username).await?.is_some() {
        warn!("username already registered");
        return Err(AppError::DuplicateUsername);
    }

    let hash = hash_password(password)?;
    let user = User::create(db, username, &hash, email.as_deref()).await?;

    info!(user_id = %user.id, "user signed up");
    Ok(user.id)
}

/// Verifies credentials. Unknown usernames and wrong passwords fail the same way.
#[instrument(skip(db, password))]
pub async fn login(db: &SqlitePool, username: &str, password: &str) -> Result<UserId, AppError> {
    let Some(user) = User::find_by_username(db, username).await? else {
        if let Some(dummy) = DUMMY_HASH.as_deref() {
            let _ = verify_password(password, dummy);
        }
        warn!("login unknown username");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    Ok(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn username_rules() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("Alice_99"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(&"x".repeat(65)));
    }

    #[tokio::test]
    async fn signup_then_login_returns_same_id() {
        let pool = db::in_memory().await.expect("db");
        let id = signup(&pool, "alice", "s3cret-pass", None).await.expect("signup");
        let logged_in = login(&pool, "alice", "s3cret-pass").await.expect("login");
        assert_eq!(id, logged_in);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let pool = db::in_memory().await.expect("db");
        signup(&pool, "alice", "s3cret-pass", None).await.expect("signup");

        let wrong = login(&pool, "alice", "s3cret-pasS").await.unwrap_err();
        let unknown = login(&pool, "mallory", "s3cret-pass").await.unwrap_err();
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let pool = db::in_memory().await.expect("db");
        signup(&pool, "alice", "s3cret-pass", None).await.expect("signup");
        let err = signup(&pool, "alice", "other-pass", None).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateUsername));
    }

    #[tokio::test]
    async fn usernames_are_case_sensitive() {
        let pool = db::in_memory().await.expect("db");
        let lower = signup(&pool, "alice", "s3cret-pass", None).await.expect("lower");
        let upper = signup(&pool, "Alice", "s3cret-pass", None).await.expect("upper");
        assert_ne!(lower, upper);
        let err = login(&pool, "ALICE", "s3cret-pass").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn password_is_not_stored_in_plaintext() {
        let pool = db::in_memory().await.expect("db");
        signup(&pool, "alice", "s3cret-pass", Some("Alice@Example.com"))
            .await
            .expect("signup");
        let user = User::find_by_username(&pool, "alice")
            .await
            .expect("query")
            .expect("user exists");
        assert!(!user.password_hash.contains("s3cret-pass"));
        assert!(user.password_hash.starts_with("$argon2"));
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let pool = db::in_memory().await.expect("db");
        for (username, password, email) in [
            ("", "long-enough", None),
            ("bob", "short", None),
            ("bob", "long-enough", Some("not-an-email")),
        ] {
            let err = signup(&pool, username, password, email).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{username}/{password}");
        }
    }
}
