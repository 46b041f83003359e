//! Business logic services.

pub mod auth_service;
pub mod email_service;
pub mod google_oauth;
