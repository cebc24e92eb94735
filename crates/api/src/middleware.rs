use std::str::FromStr;

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use jobwork_core::{TenantId, UserId};

use crate::context::{ActorContext, TenantContext};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Derive tenant and actor context from the headers set by the upstream
/// auth layer. Requests missing either header never reach a handler.
pub async fn context_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let tenant_id: TenantId = header_id(req.headers(), TENANT_HEADER)?;
    let actor_id: UserId = header_id(req.headers(), ACTOR_HEADER)?;

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut().insert(ActorContext::new(actor_id));

    Ok(next.run(req).await)
}

fn header_id<T: FromStr>(headers: &HeaderMap, name: &str) -> Result<T, StatusCode> {
    let value = headers.get(name).ok_or(StatusCode::UNAUTHORIZED)?;
    let value = value.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    value.parse().map_err(|_| StatusCode::UNAUTHORIZED)
}
