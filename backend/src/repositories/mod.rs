//! Data access layer.
//!
//! Repositories encapsulate all SQL touching the account store; services
//! never build queries themselves.

pub mod account_repository;
