//! PostgreSQL adapter implementations.

mod payment_repository;
mod user_repository;

pub use payment_repository::PostgresPaymentRepository;
pub use user_repository::PostgresUserRepository;
