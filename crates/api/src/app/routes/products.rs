use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use jobwork_stock::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_product))
        .route("/stock", get(stock_summary))
        .route("/:id/audit", get(audit_trail))
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::RegisterProductRequest>,
) -> axum::response::Response {
    let sku = body.sku.filter(|s| !s.trim().is_empty());
    let tenant_id = tenant.tenant_id();
    let title = body.title;
    match services
        .run(move |ledger| ledger.register_product(tenant_id, ProductId::new(), &title, sku))
        .await
    {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn stock_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    match services
        .run(move |ledger| ledger.product_stock_summary(tenant_id))
        .await
    {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn audit_trail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let tenant_id = tenant.tenant_id();
    match services
        .run(move |ledger| ledger.product_audit_trail(tenant_id, product_id))
        .await
    {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
