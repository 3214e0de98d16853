//! Crowdvote - Product-voting contest backend with subscription billing.
//!
//! The billing core binds users to gateway customers, drives payment
//! intents through confirmation, and keeps local subscription status
//! reconciled with the gateway's pushes.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
