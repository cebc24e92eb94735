use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use jobwork_stock::{BatchId, BatchMeta, ProductId, ReceiveBatch, ReceivedLine, VendorId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{ActorContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_batches).post(receive_batch))
        .route("/:id", get(get_batch).delete(delete_batch))
}

pub async fn receive_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::ReceiveBatchRequest>,
) -> axum::response::Response {
    let vendor_id: VendorId = match errors::parse_id(&body.vendor_id, "vendor") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in body.lines {
        let product_id: ProductId = match errors::parse_id(&line.product_id, "product") {
            Ok(v) => v,
            Err(res) => return res,
        };
        lines.push(ReceivedLine {
            product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount: line.discount,
        });
    }

    let now = Utc::now();
    let cmd = ReceiveBatch {
        tenant_id: tenant.tenant_id(),
        batch_id: BatchId::new(),
        vendor_id,
        issued_by: actor.actor_id(),
        lines,
        meta: BatchMeta {
            challan_no: body.challan_no,
            challan_date: body.challan_date.unwrap_or(now),
            notes: body.notes,
        },
        occurred_at: now,
    };

    match services.run(move |ledger| ledger.receive_batch(&cmd)).await {
        Ok(batch) => (StatusCode::CREATED, Json(batch)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Every batch, oldest challan first.
pub async fn list_batches(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    match services.run(move |ledger| ledger.batches(tenant_id)).await {
        Ok(batches) => (StatusCode::OK, Json(batches)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let batch_id: BatchId = match errors::parse_id(&id, "batch") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let tenant_id = tenant.tenant_id();
    match services.run(move |ledger| ledger.batch(tenant_id, batch_id)).await {
        Ok(batch) => (StatusCode::OK, Json(batch)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Withdraw a batch nobody has drawn from yet.
pub async fn delete_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let batch_id: BatchId = match errors::parse_id(&id, "batch") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let (tenant_id, performed_by) = (tenant.tenant_id(), actor.actor_id());
    match services
        .run(move |ledger| ledger.delete_batch(tenant_id, batch_id, performed_by))
        .await
    {
        Ok(batch) => (StatusCode::OK, Json(batch)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
