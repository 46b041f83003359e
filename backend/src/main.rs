//! Main entry point for the authentication backend.
//!
//! This file initializes the Axum web server, sets up the database
//! connection and signing context, and registers all API routes and
//! middleware.

mod api;
mod auth;
mod config;
mod database;
mod errors;
mod repositories;
mod services;
mod utils;

use crate::api::common::ApiResponse;
use crate::utils::token::{SigningContext, TokenIssuer};
use axum::{Extension, Router, response::Json, routing::get};
use config::Config;
use database::Database;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::init;

#[tokio::main]
async fn main() {
    init();

    let config = Config::from_env().unwrap();
    let db = Database::new(&config).await.unwrap();
    let pool = db.pool().clone();

    // The signing secret is read exactly once; handlers and middleware get
    // the issuer by injection.
    let tokens = Arc::new(TokenIssuer::new(&SigningContext::new(
        config.jwt_secret.clone(),
    )));

    let app = Router::new()
        .route("/", get(root_handler))
        .nest("/auth", auth::routes::auth_router())
        .layer(Extension(pool))
        .layer(Extension(config.clone()))
        .layer(Extension(tokens));

    let bind_address = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await.unwrap();

    info!("Starting auth server on port {}", config.server_port);
    axum::serve(listener, app).await.unwrap();
}

async fn root_handler() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(
        serde_json::json!({
            "service": "Auth Backend",
            "version": "0.1.0"
        }),
        "Welcome to the Auth API",
    ))
}
