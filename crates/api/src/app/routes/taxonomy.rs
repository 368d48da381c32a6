//! Categories, tags and the index-backed listings over them.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use devportal_catalog::NewCategory;
use devportal_core::CategoryId;
use devportal_infra::Portal;

use crate::app::dto::{NameRequest, PageQuery};
use crate::app::errors;
use crate::app::routes::reply;

pub fn router() -> Router {
    Router::new()
        .route("/catalog", get(catalog_overview))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", get(get_category))
        .route("/categories/:id/products", get(products_in_category))
        .route("/api-tags", get(list_api_tags).post(create_api_tag))
        .route("/api-tags/:tag/endpoints", get(endpoints_with_tag))
        .route("/product-tags", get(list_product_tags).post(create_product_tag))
        .route("/product-tags/:tag/products", get(products_with_tag))
        .route("/application-tags/:tag/applications", get(applications_with_tag))
}

/// Every category with its product ids, in listing order.
pub async fn catalog_overview(Extension(portal): Extension<Arc<Portal>>) -> Response {
    reply(StatusCode::OK, portal.index().by_category())
}

pub async fn create_category(
    Extension(portal): Extension<Arc<Portal>>,
    Json(body): Json<NewCategory>,
) -> Response {
    reply(StatusCode::CREATED, portal.catalog().create_category(body))
}

pub async fn list_categories(Extension(portal): Extension<Arc<Portal>>) -> Response {
    reply(StatusCode::OK, portal.catalog().list_categories())
}

pub async fn get_category(
    Extension(portal): Extension<Arc<Portal>>,
    Path(id): Path<String>,
) -> Response {
    let category_id: CategoryId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, portal.catalog().get_category(category_id))
}

pub async fn products_in_category(
    Extension(portal): Extension<Arc<Portal>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let category_id: CategoryId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let request = query.to_request(portal.config().default_page_limit);
    reply(StatusCode::OK, portal.products_in_category(category_id, &request))
}

pub async fn create_api_tag(
    Extension(portal): Extension<Arc<Portal>>,
    Json(body): Json<NameRequest>,
) -> Response {
    reply(StatusCode::CREATED, portal.catalog().create_api_tag(&body.name))
}

pub async fn list_api_tags(Extension(portal): Extension<Arc<Portal>>) -> Response {
    reply(StatusCode::OK, portal.catalog().list_api_tags())
}

pub async fn create_product_tag(
    Extension(portal): Extension<Arc<Portal>>,
    Json(body): Json<NameRequest>,
) -> Response {
    reply(StatusCode::CREATED, portal.catalog().create_product_tag(&body.name))
}

pub async fn list_product_tags(Extension(portal): Extension<Arc<Portal>>) -> Response {
    reply(StatusCode::OK, portal.catalog().list_product_tags())
}

pub async fn endpoints_with_tag(
    Extension(portal): Extension<Arc<Portal>>,
    Path(tag): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = query.to_request(portal.config().default_page_limit);
    reply(StatusCode::OK, portal.endpoints_with_tag(&tag, &request))
}

pub async fn products_with_tag(
    Extension(portal): Extension<Arc<Portal>>,
    Path(tag): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = query.to_request(portal.config().default_page_limit);
    reply(StatusCode::OK, portal.products_with_tag(&tag, &request))
}

pub async fn applications_with_tag(
    Extension(portal): Extension<Arc<Portal>>,
    Path(tag): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = query.to_request(portal.config().default_page_limit);
    reply(StatusCode::OK, portal.applications_with_tag(&tag, &request))
}
