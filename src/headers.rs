//! Header names of the gateway's wire contract.
//!
//! These names are load-bearing: deployed clients select their protocol
//! generation by which of them they read, so renaming any of them is a
//! breaking change even though no function signature moves.

use http::{HeaderMap, HeaderValue};

/// Request header carrying the payment authorization (current clients).
/// Takes precedence over [`X_PAYMENT`] when both are present.
pub const PAYMENT_SIGNATURE: &str = "Payment-Signature";
/// Request header carrying the payment authorization (legacy clients).
pub const X_PAYMENT: &str = "X-Payment";

/// Response header carrying the base64 challenge envelope on 402s.
pub const PAYMENT_REQUIRED: &str = "Payment-Required";
/// Response header carrying the base64 settlement envelope on success.
pub const PAYMENT_RESPONSE: &str = "Payment-Response";

/// Settlement transaction reference.
pub const X_SETTLEMENT_TX_HASH: &str = "X-Settlement-TxHash";
/// Settlement outcome: `settled` or `pending`.
pub const X_SETTLEMENT_STATUS: &str = "X-Settlement-Status";
/// Absorbed transient error, present only on pending settlements.
pub const X_SETTLEMENT_ERROR: &str = "X-Settlement-Error";
/// Echo of the authorization nonce.
pub const X_PAYMENT_HASH: &str = "X-Payment-Hash";
/// Facilitator co-signature over the settlement, when provided.
pub const X_FACILITATOR_SIGNATURE: &str = "X-Facilitator-Signature";
/// Wallet address the payment was drawn from.
pub const X_PAYER_ADDRESS: &str = "X-Payer-Address";

/// Requests left in the payer's current rate-limit window.
pub const X_RATELIMIT_REMAINING: &str = "X-RateLimit-Remaining";
/// Seconds until the payer's rate-limit window resets.
pub const X_RATELIMIT_RESET: &str = "X-RateLimit-Reset";

/// Every custom header a browser client may need to read.
const EXPOSED: &str = "Payment-Required, Payment-Response, X-Settlement-TxHash, \
     X-Settlement-Status, X-Settlement-Error, X-Payment-Hash, \
     X-Facilitator-Signature, X-Payer-Address, X-RateLimit-Remaining, \
     X-RateLimit-Reset";

/// Marks the payment headers CORS-readable.
///
/// Applied on every response path, including errors: browsers hide custom
/// headers from cross-origin scripts unless each response names them.
pub fn expose_payment_headers(headers: &mut HeaderMap) {
    headers.insert(
        http::header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED),
    );
}
