//! Verify/settle orchestration and settlement error classification.
//!
//! The facilitator is asked twice per payment: first to verify the
//! authorization, then to settle it. Verification failures are final for the
//! authorization. Settlement failures are classified by an ordered rule list:
//! an idempotent retry of an already-settled authorization is a success, a
//! transient facilitator problem degrades to a `pending` settlement that the
//! caller absorbs (the resource is still served), and anything else is fatal.
//! Recoverable cases never cross this boundary as errors; they come back as
//! typed results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;
use std::time::Duration;

use crate::facilitator::Facilitator;
use crate::proto::{PaymentPayload, PaymentRequirements, SettleResponse, VerifyRequest, VerifyResponse};

/// Outcome of a settlement, as surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// The transfer is finalized.
    Settled,
    /// The authorization was accepted but on-chain settlement is deferred;
    /// the facilitator or a reconciliation job retries out-of-band.
    Pending,
}

impl Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementStatus::Settled => write!(f, "settled"),
            SettlementStatus::Pending => write!(f, "pending"),
        }
    }
}

/// The gateway's final judgment on one payment.
///
/// Produced once per request; the orchestrator consumes it immediately. The
/// inner handler runs only when `verified` is true.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub verified: bool,
    pub status: SettlementStatus,
    /// Settlement transaction reference, when settlement executed.
    pub transaction: Option<String>,
    /// Echo of the authorization nonce.
    pub payment_hash: Option<String>,
    /// Facilitator co-signature, when provided.
    pub facilitator_signature: Option<String>,
    pub payer: Option<String>,
    /// Rejection reason, or the absorbed transient error when pending.
    pub error: Option<String>,
}

/// Classification buckets for settlement failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleErrorClass {
    /// The authorization was settled by an earlier attempt.
    AlreadySettled,
    /// Transient facilitator trouble; settlement is expected to complete
    /// out-of-band.
    Recoverable,
    /// Final for this authorization.
    Fatal,
}

struct ClassifierRule {
    patterns: &'static [&'static str],
    class: SettleErrorClass,
}

/// Ordered substring-matching policy for settlement error messages.
///
/// Kept as a standalone strategy so the policy is unit-testable and
/// extensible without touching the orchestrator. Rules are checked in order;
/// the first match wins, and unmatched messages are fatal.
pub struct SettleErrorClassifier {
    rules: Vec<ClassifierRule>,
}

impl Default for SettleErrorClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl SettleErrorClassifier {
    /// The standard policy.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                ClassifierRule {
                    patterns: &["already settled", "duplicate settlement"],
                    class: SettleErrorClass::AlreadySettled,
                },
                ClassifierRule {
                    patterns: &[
                        "500",
                        "502",
                        "503",
                        "504",
                        "internal server error",
                        "bad gateway",
                        "gateway timeout",
                        "temporarily unavailable",
                        "timeout",
                        "timed out",
                        "rate limited",
                        "network error",
                        "failed to settle payment",
                    ],
                    class: SettleErrorClass::Recoverable,
                },
            ],
        }
    }

    /// Classifies a settlement error message, case-insensitively.
    pub fn classify(&self, message: &str) -> SettleErrorClass {
        let message = message.to_lowercase();
        for rule in &self.rules {
            if rule.patterns.iter().any(|p| message.contains(p)) {
                return rule.class;
            }
        }
        SettleErrorClass::Fatal
    }
}

/// Errors that escape the verify/settle boundary.
///
/// Only verification transport problems propagate; every settle-side failure
/// is absorbed into a [`VerificationResult`].
#[derive(Debug, thiserror::Error)]
pub enum VerifyError<E: Display> {
    #[error("facilitator verify timed out")]
    Timeout,
    #[error("facilitator verify failed: {0}")]
    Transport(E),
}

/// Runs the verify-then-settle sequence for one payment.
///
/// `call_timeout` bounds each facilitator round-trip, derived from the
/// resource's configured `max_timeout_seconds`. A settle call that times out
/// classifies as recoverable, not fatal.
pub async fn verify_and_settle<F: Facilitator>(
    facilitator: &F,
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
    classifier: &SettleErrorClassifier,
    call_timeout: Duration,
) -> Result<VerificationResult, VerifyError<F::Error>> {
    let request = VerifyRequest::new(payload, requirements);
    let payment_hash = Some(payload.payload.authorization.nonce.clone());
    let payer_fallback = payload.payload.authorization.from.clone();

    let verify_response = tokio::time::timeout(call_timeout, facilitator.verify(&request))
        .await
        .map_err(|_| VerifyError::Timeout)?
        .map_err(VerifyError::Transport)?;

    let payer = match verify_response {
        VerifyResponse::Valid { payer } => payer,
        VerifyResponse::Invalid { reason, payer } => {
            // Do not attempt settlement for an invalid authorization.
            return Ok(VerificationResult {
                verified: false,
                status: SettlementStatus::Pending,
                transaction: None,
                payment_hash,
                facilitator_signature: None,
                payer: payer.or(Some(payer_fallback)),
                error: Some(reason),
            });
        }
    };
    let payer = payer.unwrap_or(payer_fallback);

    let settle_failure = match tokio::time::timeout(call_timeout, facilitator.settle(&request)).await
    {
        Ok(Ok(SettleResponse::Success {
            transaction,
            payer: settle_payer,
            signature,
        })) => {
            return Ok(VerificationResult {
                verified: true,
                status: SettlementStatus::Settled,
                transaction,
                payment_hash,
                facilitator_signature: signature,
                payer: Some(settle_payer.unwrap_or(payer)),
                error: None,
            });
        }
        Ok(Ok(SettleResponse::Error { reason, .. })) => reason,
        Ok(Err(transport)) => transport.to_string(),
        Err(_elapsed) => "settle request timeout".to_string(),
    };

    let result = match classifier.classify(&settle_failure) {
        SettleErrorClass::AlreadySettled => VerificationResult {
            verified: true,
            status: SettlementStatus::Settled,
            transaction: None,
            payment_hash,
            facilitator_signature: None,
            payer: Some(payer),
            error: None,
        },
        SettleErrorClass::Recoverable => VerificationResult {
            verified: true,
            status: SettlementStatus::Pending,
            transaction: None,
            payment_hash,
            facilitator_signature: None,
            payer: Some(payer),
            error: Some(settle_failure),
        },
        SettleErrorClass::Fatal => VerificationResult {
            verified: false,
            status: SettlementStatus::Pending,
            transaction: None,
            payment_hash,
            facilitator_signature: None,
            payer: Some(payer),
            error: Some(settle_failure),
        },
    };
    Ok(result)
}
