//! Converts registry entries into protocol-level payment requirements.
//!
//! The builder is deliberately infallible in the field it must never fail
//! on: the recipient. Price or endpoint misconfiguration is an error, but a
//! missing recipient falls back through override, configured default, and
//! hardcoded default so the gateway can always produce some valid challenge.

use serde_json::{Map, Value, json};
use url::Url;

use crate::config::GatewayConfig;
use crate::proto::PaymentRequirements;
use crate::registry::ResourceConfig;
use crate::util::{MoneyAmount, MoneyAmountError};

/// Challenge construction failures. Both are configuration errors, surfaced
/// as 500s by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("invalid price for resource {resource}: {source}")]
    InvalidPrice {
        resource: String,
        #[source]
        source: MoneyAmountError,
    },
    #[error("invalid endpoint for resource {resource}: {source}")]
    InvalidEndpoint {
        resource: String,
        #[source]
        source: url::ParseError,
    },
}

/// Builds the canonical [`PaymentRequirements`] for one resource.
///
/// The configured decimal price converts to the asset's smallest unit by
/// truncation; the endpoint resolves against the configured base URL unless
/// already absolute; the recipient normalizes to lowercase.
pub fn build_requirements(
    resource: &ResourceConfig,
    config: &GatewayConfig,
) -> Result<PaymentRequirements, ChallengeError> {
    let amount = MoneyAmount::parse(&resource.price)
        .and_then(|m| m.to_token_units(config.asset.decimals))
        .map_err(|source| ChallengeError::InvalidPrice {
            resource: resource.id.clone(),
            source,
        })?;

    let resource_url = resolve_endpoint(resource, config)?;

    let pay_to = resource
        .pay_to
        .as_deref()
        .unwrap_or(&config.default_pay_to)
        .to_lowercase();

    let mut extra = Map::new();
    extra.insert("resourceId".to_string(), json!(resource.id));
    extra.insert("resourceName".to_string(), json!(resource.name));
    extra.insert("tokenSymbol".to_string(), json!(config.asset.symbol));
    extra.insert("cacheTtl".to_string(), json!(resource.cache_ttl_seconds));
    if let Some(burn) = resource.burn_percentage {
        extra.insert("burnPercentage".to_string(), json!(burn));
    }
    for (key, value) in &resource.extra {
        extra.insert(key.clone(), value.clone());
    }

    Ok(PaymentRequirements {
        scheme: crate::networks::SCHEME_EXACT.to_string(),
        network: config.network.clone(),
        max_amount_required: amount.to_string(),
        resource: resource_url,
        description: resource.description.clone(),
        mime_type: resource.mime_type.clone(),
        output_schema: resource.output_schema.clone(),
        pay_to,
        max_timeout_seconds: resource.max_timeout_seconds,
        asset: config.asset.address.to_string(),
        extra: Some(Value::Object(extra)),
    })
}

/// Absolute endpoints pass through; relative paths join the configured base.
fn resolve_endpoint(
    resource: &ResourceConfig,
    config: &GatewayConfig,
) -> Result<String, ChallengeError> {
    if let Ok(absolute) = Url::parse(&resource.endpoint) {
        return Ok(absolute.to_string());
    }
    config
        .resource_base_url
        .join(&resource.endpoint)
        .map(|u| u.to_string())
        .map_err(|source| ChallengeError::InvalidEndpoint {
            resource: resource.id.clone(),
            source,
        })
}
