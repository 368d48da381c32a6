//! Per-environment credential slots of an application.
//!
//! Routed under `/applications/:id/credentials/:env`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use devportal_core::{ApplicationId, DomainError, EnvironmentId};
use devportal_infra::Portal;

use crate::app::dto::VerifyCredentialRequest;
use crate::app::errors;
use crate::app::routes::reply;

pub fn router() -> Router {
    Router::new()
        .route(
            "/:id/credentials/:env",
            get(current_credential)
                .post(provision_credential)
                .delete(revoke_credential),
        )
        .route("/:id/credentials/:env/rotate", post(rotate_credential))
        .route("/:id/credentials/:env/verify", post(verify_credential))
}

fn slot(id: &str, env: &str) -> Result<(ApplicationId, EnvironmentId), Response> {
    Ok((errors::parse_id(id)?, errors::parse_id(env)?))
}

pub async fn current_credential(
    Extension(portal): Extension<Arc<Portal>>,
    Path((id, env)): Path<(String, String)>,
) -> Response {
    let (application_id, environment_id) = match slot(&id, &env) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let handle = portal
        .current_credential(application_id, environment_id)
        .and_then(|handle| {
            handle.ok_or_else(|| {
                DomainError::not_found("credential", format!("{application_id}/{environment_id}"))
            })
        });
    reply(StatusCode::OK, handle)
}

/// 201 with the plaintext secret when a pair was issued, 200 when the
/// existing pair was returned.
pub async fn provision_credential(
    Extension(portal): Extension<Arc<Portal>>,
    Path((id, env)): Path<(String, String)>,
) -> Response {
    let (application_id, environment_id) = match slot(&id, &env) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match portal.provision_credential(application_id, environment_id) {
        Ok(issued) => {
            let status = if issued.client_secret.is_some() {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            reply(status, Ok(issued))
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn rotate_credential(
    Extension(portal): Extension<Arc<Portal>>,
    Path((id, env)): Path<(String, String)>,
) -> Response {
    let (application_id, environment_id) = match slot(&id, &env) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        portal.rotate_credential(application_id, environment_id),
    )
}

pub async fn revoke_credential(
    Extension(portal): Extension<Arc<Portal>>,
    Path((id, env)): Path<(String, String)>,
) -> Response {
    let (application_id, environment_id) = match slot(&id, &env) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let revoked = portal
        .revoke_credential(application_id, environment_id)
        .map(|client_id| serde_json::json!({ "revoked_client_id": client_id }));
    reply(StatusCode::OK, revoked)
}

pub async fn verify_credential(
    Extension(portal): Extension<Arc<Portal>>,
    Path((id, env)): Path<(String, String)>,
    Json(body): Json<VerifyCredentialRequest>,
) -> Response {
    let (application_id, environment_id) = match slot(&id, &env) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let valid = portal
        .verify_credential(
            application_id,
            environment_id,
            &body.client_id,
            &body.client_secret,
        )
        .map(|valid| serde_json::json!({ "valid": valid }));
    reply(StatusCode::OK, valid)
}
