//! Static registry of priced resources.
//!
//! Resources are declared at process start and never mutated. An unknown
//! identifier is a deployment mistake, not a missing payment, so lookups fail
//! with a configuration error that the gateway surfaces as a 500 rather than
//! a 402 challenge.

use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Pricing and endpoint metadata for a single protected resource.
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    /// Stable identifier used in registry lookups and challenge extensions.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Price as a decimal currency string, e.g. `"1.00"`.
    pub price: String,
    /// Callable endpoint: absolute URL, or a path joined against the
    /// configured resource base URL.
    pub endpoint: String,
    /// Description included in challenges.
    pub description: String,
    /// MIME type of the resource output.
    pub mime_type: String,
    /// HTTP method clients call the resource with.
    pub method: String,
    /// Client-facing cache lifetime hint, seconds. Forwarded in challenge
    /// extensions; the gateway itself never caches.
    pub cache_ttl_seconds: u64,
    /// Upper bound on payment validity and facilitator call time.
    pub max_timeout_seconds: u64,
    /// Recipient override; falls back to the configured default.
    pub pay_to: Option<String>,
    /// Portion of the payment burned by the resource handler, percent.
    pub burn_percentage: Option<u8>,
    /// Optional JSON schema describing the resource output.
    pub output_schema: Option<Value>,
    /// Free-form annotations merged into challenge extensions.
    pub extra: BTreeMap<String, Value>,
}

impl ResourceConfig {
    /// Creates a resource with defaults: JSON output over GET, 60 second
    /// timeout, no cache hint, endpoint derived from the identifier.
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: impl Into<String>) -> Self {
        let id = id.into();
        let endpoint = format!("/api/{id}");
        Self {
            id,
            name: name.into(),
            price: price.into(),
            endpoint,
            description: String::new(),
            mime_type: "application/json".to_string(),
            method: "GET".to_string(),
            cache_ttl_seconds: 0,
            max_timeout_seconds: 60,
            pay_to: None,
            burn_percentage: None,
            output_schema: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl_seconds = seconds;
        self
    }

    pub fn with_max_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    pub fn with_pay_to(mut self, pay_to: impl Into<String>) -> Self {
        self.pay_to = Some(pay_to.into());
        self
    }

    pub fn with_burn_percentage(mut self, percent: u8) -> Self {
        self.burn_percentage = Some(percent);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Lookup failure: the identifier was never registered.
#[derive(Debug, thiserror::Error)]
#[error("unknown resource: {0}")]
pub struct UnknownResource(pub String);

/// Read-only map from resource identifier to [`ResourceConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, ResourceConfig>,
}

impl ResourceRegistry {
    pub fn new(resources: impl IntoIterator<Item = ResourceConfig>) -> Self {
        let resources = resources
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        Self { resources }
    }

    /// Finds a resource by identifier.
    pub fn lookup(&self, id: &str) -> Result<&ResourceConfig, UnknownResource> {
        self.resources
            .get(id)
            .ok_or_else(|| UnknownResource(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_registered_resource() {
        let registry = ResourceRegistry::new([ResourceConfig::new("buy-1usd", "Buy $1", "1.00")]);
        let resource = registry.lookup("buy-1usd").unwrap();
        assert_eq!(resource.price, "1.00");
        assert_eq!(resource.endpoint, "/api/buy-1usd");
    }

    #[test]
    fn lookup_rejects_unknown_identifier() {
        let registry = ResourceRegistry::new([]);
        let err = registry.lookup("nope").unwrap_err();
        assert_eq!(err.to_string(), "unknown resource: nope");
    }
}
