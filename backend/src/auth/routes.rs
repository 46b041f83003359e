//! Defines the HTTP routes specifically for authentication.
//!
//! These routes handle registration, login, OTP verification, password
//! reset, and the OAuth callback. Designed to be nested into the main Axum
//! router.

use crate::auth::handlers::*;
use crate::auth::middleware::session_auth;
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Creates the authentication router with all auth-related routes
pub fn auth_router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-otp/{email}", post(verify_otp))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", post(reset_password))
        .route("/oauth/callback", post(oauth_callback))
        .route("/logout", post(logout))
        .route("/me", get(me).layer(middleware::from_fn(session_auth)))
}
