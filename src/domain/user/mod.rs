//! User domain module.
//!
//! The identity record that billing binds to a gateway customer.

mod user;

pub use user::User;
