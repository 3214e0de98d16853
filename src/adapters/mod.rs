//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `stripe` - billing gateway client and mock
//! - `postgres` - persistent repositories
//! - `memory` - in-memory repositories for tests and development
//! - `http` - axum API surface

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
