use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use devportal_core::EnvironmentId;
use devportal_infra::Portal;

use crate::app::dto::{NameRequest, PageQuery};
use crate::app::errors;
use crate::app::routes::reply;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_environments).post(create_environment))
        .route("/:id", get(get_environment))
        .route("/:id/subscriptions", get(subscriptions_in_environment))
}

pub async fn create_environment(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<NameRequest>,
) -> Response {
    reply(
        StatusCode::CREATED,
        portal.environments().create(&body.name, actor.user_id()),
    )
}

pub async fn list_environments(Extension(portal): Extension<Arc<Portal>>) -> Response {
    reply(StatusCode::OK, portal.environments().list())
}

pub async fn get_environment(
    Extension(portal): Extension<Arc<Portal>>,
    Path(id): Path<String>,
) -> Response {
    let environment_id: EnvironmentId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, portal.environments().get(environment_id))
}

pub async fn subscriptions_in_environment(
    Extension(portal): Extension<Arc<Portal>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let environment_id: EnvironmentId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let request = query.to_request(portal.config().default_page_limit);
    reply(
        StatusCode::OK,
        portal.subscriptions_in_environment(environment_id, &request),
    )
}
