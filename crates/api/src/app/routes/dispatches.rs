use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use jobwork_stock::{AssignItem, AssignToWorker, DispatchId, JobWorkerId, ProductId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{ActorContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(assign_to_worker))
        .route("/by-worker", get(by_worker))
        .route("/:id", get(get_dispatch))
        .route("/by-worker/:id/status", get(worker_status))
}

pub async fn assign_to_worker(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::AssignToWorkerRequest>,
) -> axum::response::Response {
    let jobworker_id: JobWorkerId = match errors::parse_id(&body.jobworker_id, "job worker") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let mut items = Vec::with_capacity(body.items.len());
    for item in body.items {
        let product_id: ProductId = match errors::parse_id(&item.product_id, "product") {
            Ok(v) => v,
            Err(res) => return res,
        };
        items.push(AssignItem {
            product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        });
    }

    let cmd = AssignToWorker {
        tenant_id: tenant.tenant_id(),
        dispatch_id: DispatchId::new(),
        jobworker_id,
        assigned_by: actor.actor_id(),
        items,
        notes: body.notes,
        occurred_at: Utc::now(),
    };

    match services.run(move |ledger| ledger.assign_to_workers(&cmd)).await {
        Ok(outcome) => {
            (StatusCode::CREATED, Json(dto::dispatch_to_json(&outcome))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn by_worker(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    match services
        .run(move |ledger| ledger.dispatches_by_worker(tenant_id))
        .await
    {
        Ok(groups) => (
            StatusCode::OK,
            Json(
                groups
                    .iter()
                    .map(dto::worker_dispatches_to_json)
                    .collect::<Vec<_>>(),
            ),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_dispatch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let dispatch_id: DispatchId = match errors::parse_id(&id, "dispatch") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let tenant_id = tenant.tenant_id();
    match services
        .run(move |ledger| ledger.dispatch(tenant_id, dispatch_id))
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(dto::dispatch_to_json(&outcome))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Assigned quantity of one job worker per assignment status.
pub async fn worker_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let jobworker_id: JobWorkerId = match errors::parse_id(&id, "job worker") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let tenant_id = tenant.tenant_id();
    match services
        .run(move |ledger| ledger.worker_status_counts(tenant_id, jobworker_id))
        .await
    {
        Ok(counts) => (StatusCode::OK, Json(counts)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
