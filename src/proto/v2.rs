//! Current (V2) header envelopes.
//!
//! Current clients negotiate the protocol implicitly by reading base64 JSON
//! envelopes from dedicated headers instead of the response body: the
//! challenge travels in `Payment-Required`, the settlement outcome in
//! `Payment-Response`.

use serde::{Deserialize, Serialize};

use crate::proto::PaymentRequirements;
use crate::settlement::{SettlementStatus, VerificationResult};
use crate::util::Base64Bytes;

pub const VERSION: u8 = 2;

/// Challenge envelope carried base64-encoded in the `Payment-Required` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredEnvelope {
    pub x402_version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Canonical URL of the protected resource.
    pub resource: String,
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentRequiredEnvelope {
    pub fn new(error: Option<String>, requirements: &PaymentRequirements) -> Self {
        Self {
            x402_version: VERSION,
            error,
            resource: requirements.resource.clone(),
            accepts: vec![requirements.clone()],
        }
    }

    /// Serializes and base64-encodes the envelope for header transport.
    pub fn encode(&self) -> Result<Base64Bytes<'static>, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(Base64Bytes::encode(json))
    }
}

/// Settlement envelope carried base64-encoded in the `Payment-Response`
/// header, mirroring the challenge's dual-protocol convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementEnvelope {
    pub x402_version: u8,
    pub success: bool,
    pub status: SettlementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SettlementEnvelope {
    pub fn encode(&self) -> Result<Base64Bytes<'static>, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(Base64Bytes::encode(json))
    }
}

impl From<&VerificationResult> for SettlementEnvelope {
    fn from(result: &VerificationResult) -> Self {
        Self {
            x402_version: VERSION,
            success: result.verified,
            status: result.status,
            transaction: result.transaction.clone(),
            payment_hash: result.payment_hash.clone(),
            payer: result.payer.clone(),
            error: result.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_envelope_encodes_and_decodes() {
        let requirements = PaymentRequirements {
            scheme: "exact".into(),
            network: "base".into(),
            max_amount_required: "100000".into(),
            resource: "http://localhost:3000/api/thing".into(),
            description: String::new(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: "0xseller".into(),
            max_timeout_seconds: 60,
            asset: "0xusdc".into(),
            extra: None,
        };
        let envelope = PaymentRequiredEnvelope::new(Some("payment required".into()), &requirements);
        let encoded = envelope.encode().unwrap();
        let decoded: PaymentRequiredEnvelope =
            serde_json::from_slice(&encoded.decode().unwrap()).unwrap();
        assert_eq!(decoded.x402_version, 2);
        assert_eq!(decoded.accepts[0].max_amount_required, "100000");
        assert_eq!(decoded.resource, "http://localhost:3000/api/thing");
    }
}
