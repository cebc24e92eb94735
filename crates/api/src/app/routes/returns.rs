use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use jobwork_stock::{ReturnRequestId, ReviewAction};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{ActorContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/pending", get(pending))
        .route("/mine", get(mine))
        .route("/:id/review", post(review))
}

pub async fn review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReviewReturnRequest>,
) -> axum::response::Response {
    let request_id: ReturnRequestId = match errors::parse_id(&id, "return request") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let action: ReviewAction = match body.action.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let (tenant_id, reviewer) = (tenant.tenant_id(), actor.actor_id());
    let reason = body.reason;
    match services
        .run(move |ledger| ledger.review_return(tenant_id, request_id, action, reviewer, reason))
        .await
    {
        Ok(a) => (StatusCode::OK, Json(dto::assignment_to_json(&a))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn pending(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    match services
        .run(move |ledger| ledger.pending_return_requests(tenant_id))
        .await
    {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn mine(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    let (tenant_id, submitter) = (tenant.tenant_id(), actor.actor_id());
    match services
        .run(move |ledger| ledger.return_requests_by_submitter(tenant_id, submitter))
        .await
    {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
