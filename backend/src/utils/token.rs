//! Signed token issuance and verification.
//!
//! Two disjoint token kinds share one HMAC secret: 7-day session tokens and
//! 1-hour password-reset capability tokens. A `purpose` claim inside the
//! signed payload keeps them mutually unacceptable. Verification is stateless
//! and collapses every failure (bad signature, malformed structure, wrong
//! purpose, expired) into one opaque error so remote callers only learn
//! "valid" or "invalid".

use crate::database::models::Account;
use crate::errors::{ServiceError, ServiceResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Days a session token remains valid.
pub const SESSION_TTL_DAYS: i64 = 7;
/// Hours a password-reset capability token remains valid.
pub const RESET_TTL_HOURS: i64 = 1;

const INVALID_TOKEN: &str = "Invalid or expired token";

/// Discriminates what a signed token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    PasswordReset,
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account ID
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub purpose: TokenPurpose,
    /// Token issued at timestamp
    pub iat: i64,
    /// Token expiration timestamp
    pub exp: i64,
}

/// Claims carried by a password-reset capability token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub email: String,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

/// Server-held signing secret, constructed once at startup and injected into
/// the issuer. Never read from the environment mid-request.
pub struct SigningContext {
    secret: String,
}

impl SigningContext {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

/// Token utility for creating and validating signed tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Creates a new TokenIssuer from an explicit signing context.
    pub fn new(context: &SigningContext) -> Self {
        let encoding_key = EncodingKey::from_secret(context.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(context.secret.as_bytes());

        // Expiry is checked manually against the caller-supplied clock so the
        // decision is deterministic and testable.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);

        TokenIssuer {
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Signs a session token for an authenticated account.
    pub fn issue_session(&self, account: &Account, now: DateTime<Utc>) -> ServiceResult<String> {
        let claims = SessionClaims {
            sub: account.id.clone(),
            email: account.email.clone(),
            name: account.name.clone(),
            purpose: TokenPurpose::Session,
            iat: now.timestamp(),
            exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal_error(format!("Token generation failed: {}", e)))
    }

    /// Verifies a session token, returning its claims.
    pub fn verify_session(&self, token: &str, now: DateTime<Utc>) -> ServiceResult<SessionClaims> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| ServiceError::unauthorized(INVALID_TOKEN))?;

        if claims.purpose != TokenPurpose::Session || now.timestamp() > claims.exp {
            return Err(ServiceError::unauthorized(INVALID_TOKEN));
        }

        Ok(claims)
    }

    /// Signs a short-lived capability token proving the holder received the
    /// reset email for `email`.
    pub fn issue_reset(&self, email: &str, now: DateTime<Utc>) -> ServiceResult<String> {
        let claims = ResetClaims {
            email: email.to_string(),
            purpose: TokenPurpose::PasswordReset,
            iat: now.timestamp(),
            exp: (now + Duration::hours(RESET_TTL_HOURS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal_error(format!("Token generation failed: {}", e)))
    }

    /// Verifies a reset capability token, returning the embedded email.
    pub fn verify_reset(&self, token: &str, now: DateTime<Utc>) -> ServiceResult<String> {
        let claims = decode::<ResetClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| ServiceError::unauthorized(INVALID_TOKEN))?;

        if claims.purpose != TokenPurpose::PasswordReset || now.timestamp() > claims.exp {
            return Err(ServiceError::unauthorized(INVALID_TOKEN));
        }

        Ok(claims.email)
    }
}
