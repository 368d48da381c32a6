//! HTTP API application wiring (Axum router + portal wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per component)
//! - `dto.rs`: request DTOs and query parameters
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use devportal_core::DomainResult;
use devportal_infra::{Portal, PortalConfig};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: PortalConfig) -> DomainResult<Router> {
    let jwt = Arc::new(devportal_auth::Hs256JwtValidator::new(
        config.jwt_secret.clone().into_bytes(),
    ));
    let auth_state = middleware::AuthState { jwt };

    let portal = Arc::new(Portal::new(config)?);
    Ok(router(portal, auth_state))
}

/// Router over an already built portal.
pub fn router(portal: Arc<Portal>, auth_state: middleware::AuthState) -> Router {
    let protected = routes::router()
        .layer(Extension(portal))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
