//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the ledger and the store behind it
//! - `routes/`: handlers, one file per resource
//! - `dto.rs`: request bodies and JSON views
//! - `errors.rs`: domain error to HTTP mapping

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use jobwork_infra::LedgerConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: LedgerConfig) -> Router {
    let services = Arc::new(services::build_services(config));

    // Ledger routes: require tenant + actor context.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::context_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
