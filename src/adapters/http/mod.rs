//! HTTP adapters - axum routes, handlers, and middleware.

pub mod billing;
pub mod middleware;
