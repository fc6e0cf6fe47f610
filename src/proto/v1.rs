//! Legacy (V1) challenge body.
//!
//! Old clients read payment terms from top-level fields of the 402 JSON body;
//! newer V1 clients read the nested `accepts[]` array. The body carries both,
//! mirroring `accepts[0]` at the top level, so a single emission serves every
//! legacy client generation.

use serde::{Deserialize, Serialize};

use crate::proto::PaymentRequirements;

pub const VERSION: u8 = 1;

/// JSON body of a payment-required response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payment options for current V1 clients.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    // Top-level mirror of accepts[0] for the oldest clients.
    pub scheme: String,
    pub network: String,
    pub max_amount_required: String,
    pub pay_to: String,
    pub asset: String,
    pub resource: String,
    pub description: String,
}

impl PaymentRequired {
    /// Builds the dual-representation body from the canonical requirements.
    pub fn new(error: Option<String>, requirements: &PaymentRequirements) -> Self {
        Self {
            x402_version: VERSION,
            error,
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            max_amount_required: requirements.max_amount_required.clone(),
            pay_to: requirements.pay_to.clone(),
            asset: requirements.asset.clone(),
            resource: requirements.resource.clone(),
            description: requirements.description.clone(),
            accepts: vec![requirements.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "base".into(),
            max_amount_required: "100000".into(),
            resource: "http://localhost:3000/api/thing".into(),
            description: "A thing".into(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: "0xseller".into(),
            max_timeout_seconds: 60,
            asset: "0xusdc".into(),
            extra: None,
        }
    }

    #[test]
    fn top_level_fields_mirror_first_accept() {
        let body = PaymentRequired::new(None, &requirements());
        assert_eq!(body.accepts.len(), 1);
        assert_eq!(body.max_amount_required, body.accepts[0].max_amount_required);
        assert_eq!(body.pay_to, body.accepts[0].pay_to);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["x402Version"], 1);
        assert_eq!(json["maxAmountRequired"], "100000");
        assert_eq!(json["accepts"][0]["maxAmountRequired"], "100000");
    }
}
