//! Middleware for protecting authenticated routes.
//!
//! Validates the session token carried either as a bearer header or as the
//! session cookie, and exposes the verified claims to downstream handlers.

use crate::utils::cookie;
use crate::utils::token::TokenIssuer;
use axum::{
    extract::Request,
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, COOKIE},
    },
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;

/// Session authentication middleware
pub async fn session_auth(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    // The issuer is injected once at startup via an Extension layer.
    let issuer = request
        .extensions()
        .get::<Arc<TokenIssuer>>()
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let token = bearer_token(request.headers())
        .or_else(|| cookie_token(request.headers()))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    match issuer.verify_session(&token, Utc::now()) {
        Ok(claims) => {
            // Add claims to request extensions for use in handlers
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(COOKIE)?.to_str().ok()?;
    cookie::session_token_from_header(cookie_header).map(|token| token.to_string())
}
