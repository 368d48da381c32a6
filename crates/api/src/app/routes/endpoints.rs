use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};

use devportal_core::{EndpointId, EnvironmentKind};
use devportal_infra::Portal;

use crate::app::dto::ScopeRequest;
use crate::app::errors;
use crate::app::routes::reply;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_endpoint))
        .route("/:id/deprecate", post(deprecate_endpoint))
        .route("/:id/scopes/:kind", put(set_scope))
}

pub async fn get_endpoint(
    Extension(portal): Extension<Arc<Portal>>,
    Path(id): Path<String>,
) -> Response {
    let endpoint_id: EndpointId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, portal.catalog().get_endpoint(endpoint_id))
}

pub async fn deprecate_endpoint(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let endpoint_id: EndpointId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        portal.catalog().deprecate_endpoint(endpoint_id, actor.user_id()),
    )
}

/// `PUT /endpoints/:id/scopes/{development|production}`; a null scope clears it.
pub async fn set_scope(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path((id, kind)): Path<(String, String)>,
    Json(body): Json<ScopeRequest>,
) -> Response {
    let endpoint_id: EndpointId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let kind = match EnvironmentKind::parse(&kind) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    reply(
        StatusCode::OK,
        portal
            .catalog()
            .set_endpoint_scope(endpoint_id, kind, body.scope, actor.user_id()),
    )
}
