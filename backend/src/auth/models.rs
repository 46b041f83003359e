//! Data structures for authentication-related entities.
//!
//! Request payloads are validated at the boundary with explicit schemas; the
//! service layer only ever sees typed, already-deserialized input.

use crate::database::models::PublicAccount;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Registration request payload
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Must be a valid email"))]
    pub email: String,

    #[validate(length(min = 5, message = "Password must be at least 5 characters"))]
    pub password: String,

    pub avatar_url: Option<String>,
}

/// Login request payload
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Payload submitted to complete a login with the emailed code
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, message = "OTP is required"))]
    pub otp: String,
}

/// Forgot-password request payload
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,
}

/// New password submitted alongside a reset capability token
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Please provide a password"))]
    pub password: String,
}

/// OAuth callback payload carrying the provider-issued access token
#[derive(Debug, Deserialize, Validate)]
pub struct OauthCallbackRequest {
    #[validate(length(min = 1, message = "Access token is required"))]
    pub access_token: String,
}

/// Returned when a login moved to the awaiting-OTP state. Deliberately
/// carries only the email; no token exists until the code is verified.
#[derive(Debug, Serialize, Deserialize)]
pub struct OtpPending {
    pub email: String,
}

/// Returned on a completed OTP verification
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyOtpResponse {
    pub user: PublicAccount,
    pub token: String,
}
