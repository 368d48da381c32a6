use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use devportal_core::DomainResult;

use crate::app::errors;

pub mod applications;
pub mod credentials;
pub mod endpoints;
pub mod environments;
pub mod products;
pub mod subscriptions;
pub mod system;
pub mod taxonomy;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/products", products::router())
        .nest("/endpoints", endpoints::router())
        .nest("/environments", environments::router())
        .nest(
            "/applications",
            applications::router().merge(credentials::router()),
        )
        .nest("/subscriptions", subscriptions::router())
        .merge(taxonomy::router())
}

/// Serialize a component result, or map its error.
pub(crate) fn reply<T: Serialize>(status: StatusCode, result: DomainResult<T>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
