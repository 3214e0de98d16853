//! Billing-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | Unauthorized | 401 |
//! | MissingPaymentMethod | 400 |
//! | InvalidPaymentMethod | 402 |
//! | NotFound | 404 |
//! | Gateway | 502 |
//! | Infrastructure | 500 |
//!
//! The requires-action branch is deliberately absent: it is an outcome
//! variant, not an error.

use crate::domain::foundation::{DomainError, ValidationError};

/// Errors from billing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// Malformed or missing input; never reaches the gateway.
    Validation { field: String, message: String },

    /// The billing gateway rejected or failed the call.
    Gateway {
        provider_code: Option<String>,
        message: String,
        retryable: bool,
    },

    /// Subscription preconditions unmet: no confirmed payment method on
    /// file for the user.
    MissingPaymentMethod,

    /// The supplied payment method could not be attached. Terminal, not
    /// retried.
    InvalidPaymentMethod { reason: String },

    /// A referenced local record is absent.
    NotFound { resource: &'static str },

    /// Caller is not the owner (or not an admin, for gated operations).
    Unauthorized,

    /// Persistence or other infrastructure failure.
    Infrastructure(String),
}

impl BillingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn gateway(message: impl Into<String>) -> Self {
        BillingError::Gateway {
            provider_code: None,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_payment_method(reason: impl Into<String>) -> Self {
        BillingError::InvalidPaymentMethod {
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        BillingError::NotFound { resource }
    }

    /// Stable machine-readable code for the API envelope.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::Validation { .. } => "VALIDATION_FAILED",
            BillingError::Gateway { .. } => "GATEWAY_ERROR",
            BillingError::MissingPaymentMethod => "MISSING_PAYMENT_METHOD",
            BillingError::InvalidPaymentMethod { .. } => "INVALID_PAYMENT_METHOD",
            BillingError::NotFound { .. } => "NOT_FOUND",
            BillingError::Unauthorized => "UNAUTHORIZED",
            BillingError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingError::Validation { field, message } => {
                write!(f, "Validation failed for '{}': {}", field, message)
            }
            BillingError::Gateway {
                provider_code,
                message,
                ..
            } => match provider_code {
                Some(code) => write!(f, "Gateway error ({}): {}", code, message),
                None => write!(f, "Gateway error: {}", message),
            },
            BillingError::MissingPaymentMethod => {
                write!(f, "No confirmed payment method on file")
            }
            BillingError::InvalidPaymentMethod { reason } => {
                write!(f, "Payment method rejected: {}", reason)
            }
            BillingError::NotFound { resource } => write!(f, "{} not found", resource),
            BillingError::Unauthorized => write!(f, "Not authorized"),
            BillingError::Infrastructure(msg) => write!(f, "Infrastructure error: {}", msg),
        }
    }
}

impl std::error::Error for BillingError {}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyField { field } => field.clone(),
            ValidationError::BelowMinimum { field, .. } => field.clone(),
            ValidationError::InvalidFormat { field, .. } => field.clone(),
        };
        BillingError::Validation {
            field,
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        BillingError::Infrastructure(err.to_string())
    }
}
