mod provider;

pub use provider::{AuthError, Identity, IdentityProvider, LocalIdentityProvider, Session};

use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{RequestPartsExt, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{Duration, Utc};
use conecta_protocol::User;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Account uid
    pub email: String,
    pub name: String,
    pub jti: String, // Session id, used for sign-out
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(identity: &Identity, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: identity.uid.clone(),
            email: identity.email.clone(),
            name: identity.display_name.clone(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + Duration::hours(expires_in_hours)).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            uid: self.sub.clone(),
            email: self.email.clone(),
            display_name: self.name.clone(),
        }
    }
}

pub fn create_token(identity: &Identity, secret: &str) -> Result<String> {
    let claims = Claims::new(identity, 24 * 7); // 7 days

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Extractor for authenticated requests.
///
/// Verifies the bearer session on every request and loads the caller's
/// profile from the store, creating a default Member profile the first time
/// an account is seen.
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let TypedHeader(auth_header) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthorized)?;

        let token = auth_header.token().to_string();
        let identity = state.identity.verify(&token).await?;
        let user = state.user_service.ensure_profile(&identity).await?;

        Ok(CurrentUser { user, token })
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            uid: "u1".into(),
            email: "ana@conecta.com".into(),
            display_name: "Ana".into(),
        }
    }

    #[test]
    fn token_round_trip() {
        let token = create_token(&identity(), "secret").unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.identity(), identity());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = create_token(&identity(), "secret").unwrap();
        assert!(matches!(
            verify_token(&token, "other"),
            Err(AppError::Jwt(_))
        ));
    }

    #[test]
    fn every_session_gets_its_own_id() {
        let a = verify_token(&create_token(&identity(), "s").unwrap(), "s").unwrap();
        let b = verify_token(&create_token(&identity(), "s").unwrap(), "s").unwrap();
        assert_ne!(a.jti, b.jti);
    }
}
