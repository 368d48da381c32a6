use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use devportal_catalog::{NewEndpoint, NewProduct, ProductPatch};
use devportal_core::ProductId;
use devportal_infra::Portal;

use crate::app::dto::PageQuery;
use crate::app::errors;
use crate::app::routes::reply;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product).patch(update_product))
        .route("/:id/deprecate", post(deprecate_product))
        .route("/:id/enable", post(enable_product))
        .route("/:id/disable", post(disable_product))
        .route("/:id/endpoints", post(add_endpoint).get(list_endpoints))
}

pub async fn create_product(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<NewProduct>,
) -> Response {
    reply(
        StatusCode::CREATED,
        portal.catalog().create_product(body, actor.user_id()),
    )
}

pub async fn list_products(
    Extension(portal): Extension<Arc<Portal>>,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = query.to_request(portal.config().default_page_limit);
    reply(StatusCode::OK, portal.catalog().list_products(&request))
}

pub async fn get_product(
    Extension(portal): Extension<Arc<Portal>>,
    Path(id): Path<String>,
) -> Response {
    let product_id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, portal.catalog().get_product(product_id))
}

pub async fn update_product(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> Response {
    let product_id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        portal.catalog().update_product(product_id, patch, actor.user_id()),
    )
}

pub async fn deprecate_product(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let product_id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        portal.catalog().deprecate_product(product_id, actor.user_id()),
    )
}

pub async fn enable_product(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    set_enabled(&portal, actor, &id, true)
}

pub async fn disable_product(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    set_enabled(&portal, actor, &id, false)
}

fn set_enabled(portal: &Portal, actor: ActorContext, id: &str, enabled: bool) -> Response {
    let product_id: ProductId = match errors::parse_id(id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        portal
            .catalog()
            .set_product_enabled(product_id, enabled, actor.user_id()),
    )
}

pub async fn add_endpoint(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<NewEndpoint>,
) -> Response {
    let product_id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::CREATED,
        portal.catalog().add_endpoint(product_id, body, actor.user_id()),
    )
}

pub async fn list_endpoints(
    Extension(portal): Extension<Arc<Portal>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let product_id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let request = query.to_request(portal.config().default_page_limit);
    reply(
        StatusCode::OK,
        portal.catalog().list_endpoints(product_id, &request),
    )
}
