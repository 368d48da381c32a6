use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use devportal_core::SubscriptionId;
use devportal_infra::Portal;

use crate::app::dto::{CreateSubscriptionRequest, SubscriptionQuery};
use crate::app::errors;
use crate::app::routes::reply;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_subscription).get(list_subscriptions))
        .route("/:id", get(get_subscription).delete(revoke_subscription))
}

pub async fn create_subscription(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Response {
    reply(
        StatusCode::CREATED,
        portal.engine().create_subscription(
            body.application_id,
            body.product_id,
            body.environment_id,
            actor.user_id(),
        ),
    )
}

pub async fn list_subscriptions(
    Extension(portal): Extension<Arc<Portal>>,
    Query(query): Query<SubscriptionQuery>,
) -> Response {
    let request = query.to_request(portal.config().default_page_limit);
    reply(
        StatusCode::OK,
        portal.engine().list_subscriptions(&query.filter(), &request),
    )
}

pub async fn get_subscription(
    Extension(portal): Extension<Arc<Portal>>,
    Path(id): Path<String>,
) -> Response {
    let subscription_id: SubscriptionId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, portal.engine().get_subscription(subscription_id))
}

pub async fn revoke_subscription(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let subscription_id: SubscriptionId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        portal
            .engine()
            .revoke_subscription(subscription_id, actor.user_id()),
    )
}
