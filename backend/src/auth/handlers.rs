//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for the credential
//! lifecycle (registration, login, OTP verification, password reset, OAuth
//! callback), parse request data, and interact with the
//! `services::auth_service` for core business logic. Authenticated success
//! paths additionally set the session cookie.

use crate::api::common::{ApiResponse, service_error_to_http};
use crate::auth::models::*;
use crate::config::Config;
use crate::database::models::PublicAccount;
use crate::errors::ServiceError;
use crate::services::auth_service::AuthService;
use crate::services::google_oauth::GoogleOauthClient;
use crate::utils::cookie;
use crate::utils::token::{SessionClaims, TokenIssuer};
use axum::{
    extract::{Extension, Json, Path},
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Json as ResponseJson, Response},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use validator::Validate;

/// Handle account registration; signs the new account in immediately.
#[axum::debug_handler]
pub async fn register(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(tokens): Extension<Arc<TokenIssuer>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, (StatusCode, String)> {
    let service = AuthService::new(&pool, &config, tokens);

    match service.register(payload).await {
        Ok(token) => {
            let envelope = ApiResponse::<()>::message("Registration successful");
            let mut response = (StatusCode::CREATED, ResponseJson(envelope)).into_response();
            attach_session_cookie(&mut response, &token, config.cookie_secure)?;
            Ok(response)
        }
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle password login; on success the account awaits its emailed OTP.
#[axum::debug_handler]
pub async fn login(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(tokens): Extension<Arc<TokenIssuer>>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<OtpPending>>, (StatusCode, String)> {
    let service = AuthService::new(&pool, &config, tokens);

    match service.login(payload).await {
        Ok(pending) => Ok(ResponseJson(ApiResponse::success(
            pending,
            "OTP sent to your email. Please verify to complete login.",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle OTP verification; completes the login and sets the session cookie.
#[axum::debug_handler]
pub async fn verify_otp(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(tokens): Extension<Arc<TokenIssuer>>,
    Path(email): Path<String>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Response, (StatusCode, String)> {
    let service = AuthService::new(&pool, &config, tokens);

    match service.verify_otp(&email, payload).await {
        Ok(verified) => {
            let token = verified.token.clone();
            let envelope = ApiResponse::success(verified, "Login successful");
            let mut response = (StatusCode::OK, ResponseJson(envelope)).into_response();
            attach_session_cookie(&mut response, &token, config.cookie_secure)?;
            Ok(response)
        }
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle forgot-password request; emails a reset link.
#[axum::debug_handler]
pub async fn forgot_password(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(tokens): Extension<Arc<TokenIssuer>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, (StatusCode, String)> {
    let service = AuthService::new(&pool, &config, tokens);

    match service.forgot_password(payload).await {
        Ok(()) => Ok(ResponseJson(ApiResponse::<()>::message(
            "Password reset link sent to your email. Please check!",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle password reset gated on the emailed capability token.
#[axum::debug_handler]
pub async fn reset_password(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(tokens): Extension<Arc<TokenIssuer>>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, (StatusCode, String)> {
    let service = AuthService::new(&pool, &config, tokens);

    match service.reset_password(&token, payload).await {
        Ok(()) => Ok(ResponseJson(ApiResponse::<()>::message(
            "Password reset successfully",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle OAuth callback: resolve the provider profile, reconcile it with
/// the local store, and fall into the same OTP flow as password logins.
#[axum::debug_handler]
pub async fn oauth_callback(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(tokens): Extension<Arc<TokenIssuer>>,
    Json(payload): Json<OauthCallbackRequest>,
) -> Result<ResponseJson<ApiResponse<OtpPending>>, (StatusCode, String)> {
    if payload.validate().is_err() {
        return Err(service_error_to_http(ServiceError::validation(
            "access_token: Access token is required",
        )));
    }

    let profile = GoogleOauthClient::new()
        .fetch_profile(&payload.access_token)
        .await
        .map_err(service_error_to_http)?;

    let service = AuthService::new(&pool, &config, tokens);

    match service.oauth_login(profile).await {
        Ok(pending) => Ok(ResponseJson(ApiResponse::success(
            pending,
            "OTP sent to your email. Please verify to complete login.",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Get current user information from the session token
#[axum::debug_handler]
pub async fn me(
    Extension(claims): Extension<SessionClaims>,
) -> Result<ResponseJson<ApiResponse<PublicAccount>>, (StatusCode, String)> {
    let user = PublicAccount {
        id: claims.sub,
        name: claims.name,
        email: claims.email,
    };

    Ok(ResponseJson(ApiResponse::success(user, "Request successful")))
}

/// Handle logout request by expiring the session cookie. Tokens themselves
/// stay valid until expiry; there is no server-side revocation list.
#[axum::debug_handler]
pub async fn logout(
    Extension(config): Extension<Config>,
) -> Result<Response, (StatusCode, String)> {
    let envelope = ApiResponse::<()>::message("Logged out successfully");
    let mut response = (StatusCode::OK, ResponseJson(envelope)).into_response();

    let value = HeaderValue::from_str(&cookie::clear_session_cookie(config.cookie_secure))
        .map_err(|e| {
            service_error_to_http(ServiceError::internal_error(format!(
                "Cookie construction failed: {e}"
            )))
        })?;
    response.headers_mut().append(SET_COOKIE, value);

    Ok(response)
}

fn attach_session_cookie(
    response: &mut Response,
    token: &str,
    secure: bool,
) -> Result<(), (StatusCode, String)> {
    let value = HeaderValue::from_str(&cookie::session_cookie(token, secure)).map_err(|e| {
        service_error_to_http(ServiceError::internal_error(format!(
            "Cookie construction failed: {e}"
        )))
    })?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}
