use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use jobwork_stock::{CreateSaleOrder, CustomerId, ProductId, SaleLine, SaleOrderId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{ActorContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/", get(list_sale_orders).post(create_sale_order))
}

/// Sale orders, newest first.
pub async fn list_sale_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    match services.run(move |ledger| ledger.sale_orders(tenant_id)).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_sale_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateSaleOrderRequest>,
) -> axum::response::Response {
    let customer_id: Option<CustomerId> = match body.customer_id.as_deref() {
        Some(raw) => match errors::parse_id(raw, "customer") {
            Ok(v) => Some(v),
            Err(res) => return res,
        },
        None => None,
    };

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in body.lines {
        let product_id: ProductId = match errors::parse_id(&line.product_id, "product") {
            Ok(v) => v,
            Err(res) => return res,
        };
        lines.push(SaleLine {
            product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount: line.discount,
        });
    }

    let cmd = CreateSaleOrder {
        tenant_id: tenant.tenant_id(),
        order_id: SaleOrderId::new(),
        created_by: actor.actor_id(),
        lines,
        invoice_no: body.invoice_no,
        invoice_date: body.invoice_date,
        customer_id,
        notes: body.notes,
        occurred_at: Utc::now(),
    };

    match services.run(move |ledger| ledger.create_sale_order(&cmd)).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
