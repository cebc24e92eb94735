//! HTTP API: server wiring, routing, and request/response mapping for the
//! stock ledger.

pub mod app;
pub mod context;
pub mod middleware;
