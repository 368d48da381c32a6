use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};

use devportal_applications::{ApplicationPatch, ApplicationStatus, NewApplication};
use devportal_core::{ApplicationId, DomainResult, EnvironmentId};
use devportal_infra::Portal;

use crate::app::dto::{PageQuery, StatusRequest};
use crate::app::errors;
use crate::app::routes::reply;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_application).get(list_applications))
        .route("/:id", get(get_application).patch(update_application))
        .route("/:id/status", put(set_status))
        .route("/:id/suspend", post(suspend_application))
        .route("/:id/resume", post(resume_application))
        .route("/:id/revoke", post(revoke_application))
        .route("/:id/entitlements/:env", get(list_entitlements))
}

pub async fn register_application(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<NewApplication>,
) -> Response {
    reply(
        StatusCode::CREATED,
        portal.registry().register(body, actor.user_id()),
    )
}

pub async fn list_applications(
    Extension(portal): Extension<Arc<Portal>>,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = query.to_request(portal.config().default_page_limit);
    reply(StatusCode::OK, portal.registry().list(&request))
}

pub async fn get_application(
    Extension(portal): Extension<Arc<Portal>>,
    Path(id): Path<String>,
) -> Response {
    let application_id: ApplicationId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, portal.registry().get(application_id))
}

pub async fn update_application(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(patch): Json<ApplicationPatch>,
) -> Response {
    let application_id: ApplicationId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        portal.registry().update(application_id, patch, actor.user_id()),
    )
}

pub async fn set_status(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Response {
    transition(&portal, actor, &id, body.status)
}

pub async fn suspend_application(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    transition(&portal, actor, &id, ApplicationStatus::Suspended)
}

pub async fn resume_application(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    transition(&portal, actor, &id, ApplicationStatus::Active)
}

pub async fn revoke_application(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    transition(&portal, actor, &id, ApplicationStatus::Revoked)
}

fn transition(portal: &Portal, actor: ActorContext, id: &str, status: ApplicationStatus) -> Response {
    let application_id: ApplicationId = match errors::parse_id(id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        portal.set_application_status(application_id, status, actor.user_id()),
    )
}

/// Products the application may call right now in one environment.
pub async fn list_entitlements(
    Extension(portal): Extension<Arc<Portal>>,
    Path((id, env)): Path<(String, String)>,
) -> Response {
    let application_id: ApplicationId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let environment_id: EnvironmentId = match errors::parse_id(&env) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let products = portal
        .engine()
        .list_entitlements(application_id, environment_id)
        .and_then(|entitled| entitled.collect::<DomainResult<Vec<_>>>());
    reply(StatusCode::OK, products)
}
