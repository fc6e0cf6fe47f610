//! Decoding and local sanity validation of client payment headers.
//!
//! The sanity pass runs before any facilitator round-trip: authorizations
//! that are structurally or temporally invalid are rejected locally, so a
//! malformed or expired payment never costs an external call.

use crate::proto::{PaymentPayload, PaymentRequirements};
use crate::timestamp::UnixTimestamp;
use crate::util::Base64Bytes;

/// Rejections from decoding or sanity-checking a payment header.
///
/// Each variant renders a distinct, human-readable reason; clients correct
/// and resubmit.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("payment header is not valid UTF-8")]
    NotUtf8,
    #[error("payment header is not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("malformed payment payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("unsupported payment scheme: {0}")]
    UnsupportedScheme(String),
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),
    #[error("authorization pays {got}, expected recipient {expected}")]
    RecipientMismatch { expected: String, got: String },
    #[error("authorization asset {got} does not match settlement asset {expected}")]
    AssetMismatch { expected: String, got: String },
    #[error("authorized value {value} is below the required amount {required}")]
    InsufficientValue { value: u128, required: u128 },
    #[error("authorization is not yet valid (validAfter {valid_after})")]
    NotYetValid { valid_after: UnixTimestamp },
    #[error("authorization has expired (validBefore {valid_before})")]
    Expired { valid_before: UnixTimestamp },
    #[error("invalid required amount in payment requirements: {0}")]
    BadRequiredAmount(String),
}

/// Decodes a payment header into a [`PaymentPayload`].
///
/// Tolerates an optional case-insensitive `Bearer ` prefix and an optional
/// `base64:` prefix before the base64 JSON envelope. Rejects any payload
/// whose scheme or network is not the one this gateway serves; a payload
/// without an `authorization` sub-structure fails JSON validation.
pub fn decode(header_value: &[u8], network: &str) -> Result<PaymentPayload, AuthorizationError> {
    let text = std::str::from_utf8(header_value).map_err(|_| AuthorizationError::NotUtf8)?;
    let text = text.trim();
    let text = strip_prefix_ignore_case(text, "bearer ").unwrap_or(text);
    let text = text.strip_prefix("base64:").unwrap_or(text);

    let raw = Base64Bytes::from(text.as_bytes()).decode()?;
    let payload: PaymentPayload = serde_json::from_slice(&raw)?;

    if payload.scheme != crate::networks::SCHEME_EXACT {
        return Err(AuthorizationError::UnsupportedScheme(payload.scheme));
    }
    if payload.network != network {
        return Err(AuthorizationError::UnsupportedNetwork(payload.network));
    }
    Ok(payload)
}

/// Validates a decoded payload against the challenge requirements.
///
/// Checks, in order: recipient, settlement asset, authorized value, and the
/// validity window against `now`. All checks are local; nothing here talks
/// to the facilitator.
pub fn sanity_check(
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
    now: UnixTimestamp,
) -> Result<(), AuthorizationError> {
    let authorization = &payload.payload.authorization;

    if !authorization.to.eq_ignore_ascii_case(&requirements.pay_to) {
        return Err(AuthorizationError::RecipientMismatch {
            expected: requirements.pay_to.clone(),
            got: authorization.to.clone(),
        });
    }

    if let Some(asset) = &payload.payload.asset
        && !asset.eq_ignore_ascii_case(&requirements.asset)
    {
        return Err(AuthorizationError::AssetMismatch {
            expected: requirements.asset.clone(),
            got: asset.clone(),
        });
    }

    let required = requirements
        .max_amount_required
        .parse::<u128>()
        .map_err(|_| {
            AuthorizationError::BadRequiredAmount(requirements.max_amount_required.clone())
        })?;
    if authorization.value < required {
        return Err(AuthorizationError::InsufficientValue {
            value: authorization.value,
            required,
        });
    }

    if let Some(valid_after) = authorization.valid_after
        && now < valid_after
    {
        return Err(AuthorizationError::NotYetValid { valid_after });
    }
    if let Some(valid_before) = authorization.valid_before
        && now > valid_before
    {
        return Err(AuthorizationError::Expired { valid_before });
    }

    Ok(())
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    match (text.get(..prefix.len()), text.get(prefix.len()..)) {
        (Some(head), Some(tail)) if head.eq_ignore_ascii_case(prefix) => Some(tail),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{ExactPayload, TransferAuthorization};
    use crate::util::Base64Bytes;
    use serde_json::json;

    fn encoded_payload() -> String {
        encode(json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "base",
            "payload": {
                "signature": "0xsig",
                "authorization": {
                    "from": "0xPayer",
                    "to": "0xSeller",
                    "value": "1000000",
                    "nonce": "0x01"
                }
            }
        }))
    }

    fn encode(value: serde_json::Value) -> String {
        Base64Bytes::encode(serde_json::to_vec(&value).unwrap()).to_string()
    }

    fn payload(value: u128) -> PaymentPayload {
        PaymentPayload {
            x402_version: 1,
            scheme: "exact".into(),
            network: "base".into(),
            payload: ExactPayload {
                signature: "0xsig".into(),
                authorization: TransferAuthorization {
                    from: "0xpayer".into(),
                    to: "0xSeller".into(),
                    value,
                    valid_after: None,
                    valid_before: None,
                    nonce: "0x01".into(),
                },
                asset: None,
            },
        }
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "base".into(),
            max_amount_required: "1000000".into(),
            resource: "https://shop.example/api/buy".into(),
            description: String::new(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: "0xseller".into(),
            max_timeout_seconds: 60,
            asset: "0xusdc".into(),
            extra: None,
        }
    }

    const NOW: UnixTimestamp = UnixTimestamp::from_secs(1_700_000_000);

    #[test]
    fn decodes_bare_base64() {
        let decoded = decode(encoded_payload().as_bytes(), "base").unwrap();
        assert_eq!(decoded.payload.authorization.value, 1_000_000);
    }

    #[test]
    fn strips_bearer_and_base64_prefixes() {
        let bare = encoded_payload();
        for header in [
            format!("Bearer {bare}"),
            format!("bearer {bare}"),
            format!("base64:{bare}"),
            format!("BEARER base64:{bare}"),
        ] {
            assert!(decode(header.as_bytes(), "base").is_ok(), "failed: {header}");
        }
    }

    #[test]
    fn rejects_wrong_scheme_and_network() {
        let wrong_scheme = encode(json!({
            "scheme": "upto", "network": "base",
            "payload": {"signature": "0x", "authorization": {
                "from": "0xa", "to": "0xb", "value": "1", "nonce": "0x01"}}
        }));
        assert!(matches!(
            decode(wrong_scheme.as_bytes(), "base"),
            Err(AuthorizationError::UnsupportedScheme(_))
        ));

        let wrong_network = encode(json!({
            "scheme": "exact", "network": "avalanche",
            "payload": {"signature": "0x", "authorization": {
                "from": "0xa", "to": "0xb", "value": "1", "nonce": "0x01"}}
        }));
        assert!(matches!(
            decode(wrong_network.as_bytes(), "base"),
            Err(AuthorizationError::UnsupportedNetwork(_))
        ));
    }

    #[test]
    fn rejects_missing_authorization_structure() {
        let no_authorization = encode(json!({
            "scheme": "exact", "network": "base",
            "payload": {"signature": "0xsig"}
        }));
        assert!(matches!(
            decode(no_authorization.as_bytes(), "base"),
            Err(AuthorizationError::MalformedPayload(_))
        ));
    }

    #[test]
    fn rejects_garbage_base64() {
        assert!(matches!(
            decode(b"!!!not-base64!!!", "base"),
            Err(AuthorizationError::InvalidBase64(_))
        ));
    }

    #[test]
    fn accepts_matching_payload() {
        assert!(sanity_check(&payload(1_000_000), &requirements(), NOW).is_ok());
    }

    #[test]
    fn recipient_comparison_is_case_insensitive() {
        // payload pays 0xSeller, requirements say 0xseller
        assert!(sanity_check(&payload(1_000_000), &requirements(), NOW).is_ok());
    }

    #[test]
    fn rejects_recipient_mismatch_naming_expected() {
        let mut p = payload(1_000_000);
        p.payload.authorization.to = "0xsomeoneelse".into();
        let err = sanity_check(&p, &requirements(), NOW).unwrap_err();
        assert_eq!(
            err.to_string(),
            "authorization pays 0xsomeoneelse, expected recipient 0xseller"
        );
    }

    #[test]
    fn rejects_asset_mismatch() {
        let mut p = payload(1_000_000);
        p.payload.asset = Some("0xdai".into());
        let err = sanity_check(&p, &requirements(), NOW).unwrap_err();
        assert!(matches!(err, AuthorizationError::AssetMismatch { .. }));
    }

    #[test]
    fn missing_asset_is_tolerated() {
        let mut p = payload(1_000_000);
        p.payload.asset = None;
        assert!(sanity_check(&p, &requirements(), NOW).is_ok());
    }

    #[test]
    fn rejects_value_below_requirement_citing_both() {
        let err = sanity_check(&payload(500_000), &requirements(), NOW).unwrap_err();
        assert_eq!(
            err.to_string(),
            "authorized value 500000 is below the required amount 1000000"
        );
    }

    #[test]
    fn rejects_not_yet_valid() {
        let mut p = payload(1_000_000);
        p.payload.authorization.valid_after = Some(NOW + 100);
        let err = sanity_check(&p, &requirements(), NOW).unwrap_err();
        assert!(matches!(err, AuthorizationError::NotYetValid { .. }));
    }

    #[test]
    fn rejects_expired() {
        let mut p = payload(1_000_000);
        p.payload.authorization.valid_before = Some(UnixTimestamp::from_secs(NOW.as_secs() - 100));
        let err = sanity_check(&p, &requirements(), NOW).unwrap_err();
        assert!(matches!(err, AuthorizationError::Expired { .. }));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let mut p = payload(1_000_000);
        p.payload.authorization.valid_after = Some(NOW);
        p.payload.authorization.valid_before = Some(NOW);
        assert!(sanity_check(&p, &requirements(), NOW).is_ok());
    }
}
