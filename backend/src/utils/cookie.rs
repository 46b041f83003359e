//! Session cookie construction.
//!
//! The bearer token travels as an HTTP-only, `SameSite=Lax` cookie with the
//! same 7-day lifetime as the token itself. `Secure` is added outside of
//! plain-HTTP development.

use crate::utils::token::SESSION_TTL_DAYS;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

/// Builds the `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(token: &str, secure: bool) -> String {
    let max_age = SESSION_TTL_DAYS * 24 * 60 * 60;
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Max-Age={max_age}; Path=/");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Builds the `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Max-Age=0; Path=/");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extracts the session token from a `Cookie` request header, if present.
pub fn session_token_from_header(cookie_header: &str) -> Option<&str> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
    })
}
