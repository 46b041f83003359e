//! API layer shared infrastructure.

pub mod common;
