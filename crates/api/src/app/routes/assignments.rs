use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use jobwork_stock::{AssignmentId, ReturnSplit};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{ActorContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_assignment))
        .route("/:id/returns", post(submit_return))
        .route("/:id/direct-return", post(direct_return))
}

fn parse_split(body: &dto::ReturnSplitRequest) -> Result<ReturnSplit, axum::response::Response> {
    ReturnSplit::new(body.cleared, body.lost, body.damaged)
        .map_err(errors::domain_error_to_response)
}

pub async fn get_assignment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let assignment_id: AssignmentId = match errors::parse_id(&id, "assignment") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let tenant_id = tenant.tenant_id();
    match services
        .run(move |ledger| ledger.assignment(tenant_id, assignment_id))
        .await
    {
        Ok(a) => (StatusCode::OK, Json(dto::assignment_to_json(&a))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn submit_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReturnSplitRequest>,
) -> axum::response::Response {
    let assignment_id: AssignmentId = match errors::parse_id(&id, "assignment") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let split = match parse_split(&body) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let (tenant_id, submitter) = (tenant.tenant_id(), actor.actor_id());
    match services
        .run(move |ledger| ledger.submit_return(tenant_id, assignment_id, submitter, split))
        .await
    {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn direct_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReturnSplitRequest>,
) -> axum::response::Response {
    let assignment_id: AssignmentId = match errors::parse_id(&id, "assignment") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let split = match parse_split(&body) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let (tenant_id, reviewer) = (tenant.tenant_id(), actor.actor_id());
    match services
        .run(move |ledger| {
            ledger.direct_process_return(tenant_id, assignment_id, reviewer, split)
        })
        .await
    {
        Ok(a) => (StatusCode::OK, Json(dto::assignment_to_json(&a))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
