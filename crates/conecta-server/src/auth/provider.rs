//! Identity provider boundary and the built-in SQLite-backed provider.

use crate::error::{AppError, Result};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;

use super::{create_token, verify_token};

const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_FAILED_LOGINS: u32 = 5;
const LOCKOUT_MINUTES: i64 = 15;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Closed set of authentication failures surfaced to users.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("email already in use")]
    EmailInUse,
    #[error("weak password")]
    WeakPassword,
    #[error("invalid email")]
    InvalidEmail,
    #[error("too many requests")]
    TooManyRequests,
}

impl AuthError {
    pub fn code(self) -> &'static str {
        match self {
            AuthError::InvalidCredential => "auth/invalid-credential",
            AuthError::EmailInUse => "auth/email-already-in-use",
            AuthError::WeakPassword => "auth/weak-password",
            AuthError::InvalidEmail => "auth/invalid-email",
            AuthError::TooManyRequests => "auth/too-many-requests",
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            AuthError::InvalidCredential => "Incorrect email or password.",
            AuthError::EmailInUse => "This email is already registered.",
            AuthError::WeakPassword => "The password must have at least 6 characters.",
            AuthError::InvalidEmail => "The email address is not valid.",
            AuthError::TooManyRequests => {
                "Too many failed attempts. Wait a few minutes and try again."
            }
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AuthError::EmailInUse => StatusCode::CONFLICT,
            AuthError::WeakPassword | AuthError::InvalidEmail => StatusCode::BAD_REQUEST,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// An authenticated account as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self, token: &str) -> Result<()>;

    /// Resolve a session token to its identity. Expired, forged and signed-out
    /// sessions are rejected.
    async fn verify(&self, token: &str) -> Result<Identity>;
}

#[derive(Debug, Clone, Copy)]
struct FailedLogins {
    count: u32,
    last: DateTime<Utc>,
}

/// Accounts in SQLite, argon2 password hashes, JWT sessions.
#[derive(Clone)]
pub struct LocalIdentityProvider {
    db: SqlitePool,
    jwt_secret: String,
    /// Signed-out session ids with their expiry (unix seconds).
    revoked: Arc<Mutex<HashMap<String, i64>>>,
    failures: Arc<Mutex<HashMap<String, FailedLogins>>>,
}

impl LocalIdentityProvider {
    pub fn new(db: SqlitePool, jwt_secret: String) -> Self {
        Self {
            db,
            jwt_secret,
            revoked: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn is_throttled(&self, email: &str) -> bool {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        match failures.get(email) {
            Some(f) if Utc::now() - f.last > chrono::Duration::minutes(LOCKOUT_MINUTES) => {
                failures.remove(email);
                false
            }
            Some(f) => f.count >= MAX_FAILED_LOGINS,
            None => false,
        }
    }

    fn record_failure(&self, email: &str) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let window = chrono::Duration::minutes(LOCKOUT_MINUTES);
        failures.retain(|_, f| Utc::now() - f.last <= window);
        let entry = failures.entry(email.to_string()).or_insert(FailedLogins {
            count: 0,
            last: Utc::now(),
        });
        entry.count += 1;
        entry.last = Utc::now();
    }

    fn clear_failures(&self, email: &str) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.remove(email);
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail.into());
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword.into());
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::BadRequest("Display name is required".to_string()));
        }

        let existing: Option<(String,)> = sqlx::query_as("SELECT uid FROM accounts WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AuthError::EmailInUse.into());
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?
            .to_string();

        let uid = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO accounts (uid, email, display_name, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&uid)
        .bind(&email)
        .bind(display_name)
        .bind(&password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        tracing::info!(uid = %uid, "Account created");
        Ok(Identity {
            uid,
            email,
            display_name: display_name.to_string(),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail.into());
        }
        if self.is_throttled(&email) {
            tracing::warn!(email = %email, "Sign-in throttled");
            return Err(AuthError::TooManyRequests.into());
        }

        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT uid, display_name, password_hash FROM accounts WHERE email = ?",
        )
        .bind(&email)
        .fetch_optional(&self.db)
        .await?;

        let Some((uid, display_name, password_hash)) = row else {
            self.record_failure(&email);
            return Err(AuthError::InvalidCredential.into());
        };

        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash: {}", e)))?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            self.record_failure(&email);
            return Err(AuthError::InvalidCredential.into());
        }
        self.clear_failures(&email);

        let identity = Identity {
            uid,
            email,
            display_name,
        };
        let token = create_token(&identity, &self.jwt_secret)?;
        tracing::debug!(uid = %identity.uid, "Signed in");
        Ok(Session { token, identity })
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        let claims = verify_token(token, &self.jwt_secret)?;
        let mut revoked = self.revoked.lock().unwrap_or_else(PoisonError::into_inner);
        // Expired sessions fail verification anyway.
        let now = Utc::now().timestamp();
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(claims.jti, claims.exp);
        tracing::debug!(uid = %claims.sub, "Signed out");
        Ok(())
    }

    async fn verify(&self, token: &str) -> Result<Identity> {
        let claims = verify_token(token, &self.jwt_secret).map_err(|_| AppError::Unauthorized)?;
        let revoked = self.revoked.lock().unwrap_or_else(PoisonError::into_inner);
        if revoked.contains_key(&claims.jti) {
            return Err(AppError::Unauthorized);
        }
        Ok(claims.identity())
    }
}
