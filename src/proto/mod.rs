//! Wire format types for the payment protocol.
//!
//! The gateway speaks two protocol generations at once:
//!
//! - **V1** ([`v1`]): the legacy JSON challenge body old clients read.
//! - **V2** ([`v2`]): base64 header envelopes current clients read.
//!
//! Both encoders share the canonical [`PaymentRequirements`] and the
//! facilitator verify/settle messages defined here, so response-writing
//! points invoke them together instead of branching per client generation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::timestamp::UnixTimestamp;

pub mod v1;
pub mod v2;

/// Payment terms the gateway quotes for a protected resource.
///
/// Derived fresh per challenge from a resource's registry entry; never
/// persisted. The recipient address is normalized to lowercase before this
/// struct exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme tag, always `exact`.
    pub scheme: String,
    /// Network tag, e.g. `base`.
    pub network: String,
    /// Amount owed, smallest asset unit, stringified integer.
    pub max_amount_required: String,
    /// Canonical URL of the protected resource.
    pub resource: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the resource output.
    pub mime_type: String,
    /// Optional JSON schema for the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// Settlement recipient, lowercase.
    pub pay_to: String,
    /// Payment validity bound, seconds.
    pub max_timeout_seconds: u64,
    /// Settlement asset contract address.
    pub asset: String,
    /// Extension map: resource id, name, burn percentage, token symbol,
    /// cache TTL, plus per-resource annotations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// A client's signed payment envelope, decoded from the payment header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version the client speaks.
    #[serde(default = "default_payload_version")]
    pub x402_version: u8,
    /// Payment scheme tag.
    pub scheme: String,
    /// Network tag.
    pub network: String,
    /// Scheme payload: signature plus the transfer authorization.
    pub payload: ExactPayload,
}

fn default_payload_version() -> u8 {
    1
}

/// Signature and authorization for the `exact` scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPayload {
    /// The payer's signature over the authorization.
    pub signature: String,
    /// The signed, time-bounded transfer authorization.
    pub authorization: TransferAuthorization,
    /// Settlement asset the authorization draws on. Legacy clients omit it;
    /// when present it must match the configured asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

/// A signed instruction permitting a value transfer from payer to recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
    /// Payer wallet address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Authorized value, smallest asset unit.
    #[serde(with = "u128_string")]
    pub value: u128,
    /// Earliest execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_after: Option<UnixTimestamp>,
    /// Latest execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_before: Option<UnixTimestamp>,
    /// Unique per-authorization value; doubles as the payment hash.
    pub nonce: String,
}

/// Stringified integers on the wire; JSON numbers lose 64-bit+ precision.
mod u128_string {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>()
            .map_err(|_| serde::de::Error::custom("value must be a non-negative integer string"))
    }
}

/// Verification request submitted to the facilitator.
///
/// Settlement reuses the same pair, so [`SettleRequest`] is an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub x402_version: u8,
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirements,
}

/// Settlement request: the same authorization/requirements pair as verify.
pub type SettleRequest = VerifyRequest;

impl VerifyRequest {
    pub fn new(payload: &PaymentPayload, requirements: &PaymentRequirements) -> Self {
        Self {
            x402_version: payload.x402_version,
            payment_payload: payload.clone(),
            payment_requirements: requirements.clone(),
        }
    }
}

/// Facilitator's answer to a verification request.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyResponse {
    /// The authorization passed all facilitator checks.
    Valid { payer: Option<String> },
    /// The authorization was rejected for the stated reason.
    Invalid {
        reason: String,
        payer: Option<String>,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            VerifyResponse::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                invalid_reason: None,
                payer: payer.clone(),
            },
            VerifyResponse::Invalid { reason, payer } => VerifyResponseWire {
                is_valid: false,
                invalid_reason: Some(reason.clone()),
                payer: payer.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        if wire.is_valid {
            Ok(VerifyResponse::Valid { payer: wire.payer })
        } else {
            let reason = wire
                .invalid_reason
                .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
            Ok(VerifyResponse::Invalid {
                reason,
                payer: wire.payer,
            })
        }
    }
}

/// Facilitator's answer to a settlement request.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleResponse {
    /// Settlement executed.
    Success {
        transaction: Option<String>,
        payer: Option<String>,
        /// Facilitator co-signature over the settlement, when provided.
        signature: Option<String>,
    },
    /// Settlement failed; the reason drives error classification.
    Error {
        reason: String,
        payer: Option<String>,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

impl Serialize for SettleResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            SettleResponse::Success {
                transaction,
                payer,
                signature,
            } => SettleResponseWire {
                success: true,
                transaction: transaction.clone(),
                error_reason: None,
                payer: payer.clone(),
                signature: signature.clone(),
            },
            SettleResponse::Error { reason, payer } => SettleResponseWire {
                success: false,
                transaction: None,
                error_reason: Some(reason.clone()),
                payer: payer.clone(),
                signature: None,
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SettleResponseWire::deserialize(deserializer)?;
        if wire.success {
            Ok(SettleResponse::Success {
                transaction: wire.transaction,
                payer: wire.payer,
                signature: wire.signature,
            })
        } else {
            let reason = wire
                .error_reason
                .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
            Ok(SettleResponse::Error {
                reason,
                payer: wire.payer,
            })
        }
    }
}

/// A payment kind the facilitator reports supporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    pub x402_version: u8,
    pub scheme: String,
    pub network: String,
}

/// Facilitator discovery response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    #[serde(default)]
    pub kinds: Vec<SupportedPaymentKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verify_response_wire_round_trip() {
        let invalid: VerifyResponse = serde_json::from_value(json!({
            "isValid": false,
            "invalidReason": "insufficient balance",
            "payer": "0xabc"
        }))
        .unwrap();
        assert_eq!(
            invalid,
            VerifyResponse::Invalid {
                reason: "insufficient balance".into(),
                payer: Some("0xabc".into())
            }
        );

        let valid = VerifyResponse::Valid {
            payer: Some("0xabc".into()),
        };
        let json = serde_json::to_value(&valid).unwrap();
        assert_eq!(json, json!({"isValid": true, "payer": "0xabc"}));
    }

    #[test]
    fn settle_error_requires_reason() {
        let result = serde_json::from_value::<SettleResponse>(json!({"success": false}));
        assert!(result.is_err());
    }

    #[test]
    fn payload_value_parses_from_string() {
        let payload: TransferAuthorization = serde_json::from_value(json!({
            "from": "0xpayer",
            "to": "0xrecipient",
            "value": "1000000",
            "nonce": "0x01"
        }))
        .unwrap();
        assert_eq!(payload.value, 1_000_000);
        assert!(payload.valid_after.is_none());
    }
}
