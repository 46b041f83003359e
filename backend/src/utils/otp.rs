//! One-time code generation and validity checks.
//!
//! Codes are six decimal digits drawn uniformly from 100000..=999999, so no
//! leading zero is possible by construction. Validity is a constant-time code
//! comparison plus an expiry check; the caller clears the stored code through
//! the account store's atomic conditional update.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use subtle::ConstantTimeEq;

/// Minutes a code remains valid, for both password and OAuth login flows.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Generates a 6-digit numeric one-time code.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Computes the expiry instant for a code issued at `now`.
pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(OTP_TTL_MINUTES)
}

/// Returns true iff the submitted code equals the stored code and `now` is
/// within the validity window. The comparison does not leak timing of
/// partial matches.
pub fn is_valid(
    submitted: &str,
    stored: &str,
    expires: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    let matches: bool = submitted.as_bytes().ct_eq(stored.as_bytes()).into();
    matches && now <= expires
}
