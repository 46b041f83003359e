//! Collection of general utility functions and common helpers.
//!
//! This module serves as a repository for small, reusable helpers that do not
//! fit into other specific domain modules.

pub mod cookie;
pub mod otp;
pub mod password;
pub mod token;
