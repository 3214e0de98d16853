//! Stripe-specific wire types.
//!
//! These types represent Stripe API objects as they arrive in API
//! responses and webhook payloads. They parse actual Stripe JSON and are
//! converted to typed port results at the adapter boundary; nothing
//! outside this module reads raw gateway JSON.

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    /// Header is empty or missing.
    MissingHeader,
    /// Missing timestamp component (t=...).
    MissingTimestamp,
    /// Missing v1 signature component.
    MissingV1Signature,
    /// Invalid timestamp format.
    InvalidTimestamp,
    /// Invalid signature format (not valid hex).
    InvalidSignatureFormat,
}

impl std::fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "Missing Stripe-Signature header"),
            Self::MissingTimestamp => write!(f, "Missing timestamp (t=) in signature"),
            Self::MissingV1Signature => write!(f, "Missing v1 signature in header"),
            Self::InvalidTimestamp => write!(f, "Invalid timestamp format"),
            Self::InvalidSignatureFormat => write!(f, "Invalid signature format (not valid hex)"),
        }
    }
}

impl std::error::Error for SignatureParseError {}

/// Parsed Stripe-Signature header components.
///
/// The header format is: `t=timestamp,v1=signature[,v0=legacy_signature]`
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe generated the event.
    pub timestamp: i64,

    /// Primary v1 signature (HMAC-SHA256, hex-encoded).
    pub v1_signature: Vec<u8>,

    /// Legacy v0 signature (deprecated, may be absent).
    pub v0_signature: Option<Vec<u8>>,
}

impl SignatureHeader {
    /// Parse a Stripe-Signature header into components.
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;
        let mut v0_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or(SignatureParseError::MissingTimestamp)?;

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    v1_signature = Some(
                        hex_decode(value.trim())
                            .ok_or(SignatureParseError::InvalidSignatureFormat)?,
                    );
                }
                "v0" => {
                    v0_signature = Some(
                        hex_decode(value.trim())
                            .ok_or(SignatureParseError::InvalidSignatureFormat)?,
                    );
                }
                _ => {
                    // Ignore unknown fields for forward compatibility
                }
            }
        }

        Ok(Self {
            timestamp: timestamp.ok_or(SignatureParseError::MissingTimestamp)?,
            v1_signature: v1_signature.ok_or(SignatureParseError::MissingV1Signature)?,
            v0_signature,
        })
    }
}

/// Decode a hex string to bytes.
fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }

    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        let byte = u8::from_str_radix(&hex[i..i + 2], 16).ok()?;
        bytes.push(byte);
    }
    Some(bytes)
}

/// Encode bytes to hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event as received from the API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g., "customer.subscription.updated").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    /// Event payload containing the affected object.
    pub data: StripeEventData,

    /// Whether this is a live or test event.
    pub livemode: bool,

    /// Stripe API version used for this event.
    pub api_version: Option<String>,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,

    /// Previous values for updated fields (on update events).
    pub previous_attributes: Option<serde_json::Value>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// A field Stripe returns either as a bare ID or an expanded object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StripeExpandable<T> {
    /// Bare ID reference.
    Id(String),
    /// Expanded object (requested via `expand[]`).
    Object(Box<T>),
}

impl<T> StripeExpandable<T> {
    /// The expanded object, if present.
    pub fn object(&self) -> Option<&T> {
        match self {
            StripeExpandable::Id(_) => None,
            StripeExpandable::Object(obj) => Some(obj),
        }
    }
}

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    /// Customer email address.
    pub email: Option<String>,

    /// Customer name.
    pub name: Option<String>,

    /// Unix timestamp of creation.
    #[serde(default)]
    pub created: i64,

    /// Whether the customer has been deleted.
    #[serde(default)]
    pub deleted: bool,
}

/// Stripe PaymentIntent object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentIntent {
    /// Unique intent identifier (pi_...).
    pub id: String,

    /// Intent status (succeeded, requires_action, ...).
    pub status: String,

    /// Client secret for browser-side confirmation.
    pub client_secret: Option<String>,

    /// Owning customer ID.
    pub customer: Option<String>,

    /// Amount in the currency's minor unit.
    pub amount: i64,

    /// Currency (lowercase).
    pub currency: String,

    /// Last error for failed confirmation attempts.
    pub last_payment_error: Option<StripePaymentError>,

    /// Next action required of the cardholder.
    pub next_action: Option<StripeNextAction>,
}

/// Payment error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentError {
    /// Machine error code.
    pub code: Option<String>,

    /// Card network decline code.
    pub decline_code: Option<String>,

    /// Human-readable message.
    pub message: Option<String>,
}

/// Next-action container on an intent.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeNextAction {
    /// Action type (redirect_to_url, use_stripe_sdk, ...).
    #[serde(rename = "type")]
    pub action_type: String,

    /// Redirect details when the action is a browser redirect.
    pub redirect_to_url: Option<StripeRedirectToUrl>,
}

/// Redirect details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeRedirectToUrl {
    /// Where to send the cardholder.
    pub url: Option<String>,

    /// Where the gateway sends them back afterwards.
    pub return_url: Option<String>,
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    /// Customer ID owning this subscription.
    pub customer: String,

    /// Subscription status.
    pub status: String,

    /// Pause-collection attribute; present only while paused.
    pub pause_collection: Option<StripePauseCollection>,

    /// Latest invoice, expanded when requested.
    pub latest_invoice: Option<StripeExpandable<StripeInvoice>>,

    /// Unix timestamp of creation.
    #[serde(default)]
    pub created: i64,
}

/// Pause-collection attribute.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePauseCollection {
    /// Pause behavior (void, keep_as_draft, mark_uncollectible).
    pub behavior: String,
}

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    /// Customer ID.
    pub customer: String,

    /// Associated subscription ID.
    pub subscription: Option<String>,

    /// Collecting payment intent, expanded when requested.
    pub payment_intent: Option<StripeExpandable<StripePaymentIntent>>,

    /// Amount due in minor units.
    #[serde(default)]
    pub amount_due: i64,

    /// Currency (lowercase).
    #[serde(default)]
    pub currency: String,
}

/// Stripe API error envelope (non-2xx responses).
#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiErrorEnvelope {
    pub error: StripeApiError,
}

/// Stripe API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    /// Error category (card_error, invalid_request_error, ...).
    #[serde(rename = "type")]
    pub error_type: Option<String>,

    /// Machine error code.
    pub code: Option<String>,

    /// Card network decline code.
    pub decline_code: Option<String>,

    /// Human-readable message.
    pub message: Option<String>,
}
