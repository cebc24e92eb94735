use axum::Router;

pub mod assignments;
pub mod batches;
pub mod dispatches;
pub mod products;
pub mod returns;
pub mod sales;
pub mod system;

/// Router for all tenant-scoped ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/batches", batches::router())
        .nest("/dispatches", dispatches::router())
        .nest("/assignments", assignments::router())
        .nest("/returns", returns::router())
        .nest("/sales", sales::router())
}
