//! Authentication module.
//!
//! Bundles the HTTP boundary of the credential lifecycle: request models,
//! handlers, routes, and the session middleware.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
