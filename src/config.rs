//! Gateway configuration with layered environment fallbacks.
//!
//! Every value resolves in a fixed precedence order: explicit environment
//! variable, then a hardcoded default. The struct is built once at startup
//! and shared immutably; nothing reads the environment at request time.
//!
//! Environment:
//! - `FACILITATOR_URL` - base URL of the settlement facilitator
//! - `X402_API_KEY` - static bearer key for facilitator auth
//! - `X402_KEY_ID` / `X402_KEY_SECRET` - key pair for derived request tokens
//! - `X402_PAY_TO` - default settlement recipient address
//! - `RESOURCE_BASE_URL` - base for resolving relative resource endpoints
//! - `X402_DEBUG` - enables redacted facilitator request/response logging

use once_cell::sync::OnceCell;
use std::env;
use url::Url;

use crate::networks::{self, KnownAsset};

/// Hardcoded fallback facilitator, used when `FACILITATOR_URL` is unset.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Hardcoded fallback base for relative resource endpoints.
pub const DEFAULT_RESOURCE_BASE_URL: &str = "http://localhost:3000";

/// Hardcoded fallback settlement recipient. A challenge must always be
/// producible, even on a box with no configuration at all.
pub const DEFAULT_PAY_TO: &str = "0xb7e2cc9c58febf6fa7e1db60b6e90d2e93bdac74";

/// Hosted facilitator hostname that gained a versioned path.
const HOSTED_FACILITATOR_HOST: &str = "api.cdp.coinbase.com";
/// Default path on the hosted facilitator when none is configured.
const HOSTED_FACILITATOR_PATH: &str = "/platform/v2/x402";
/// Deprecated hostname, rewritten to its documented successor.
const DEPRECATED_FACILITATOR_HOST: &str = "facilitator.cdp.coinbase.com";

static FALLBACK_WARNED: OnceCell<()> = OnceCell::new();

/// Credentials for authenticating to the facilitator.
///
/// A static bearer key wins over a key pair. With neither configured, calls
/// go out unauthenticated; the facilitator may reject them, but the failure
/// stays diagnosable instead of being silently mocked away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilitatorAuth {
    /// Send `Authorization: Bearer <key>` verbatim.
    BearerKey(String),
    /// Derive a short-lived signed token per operation.
    KeyPair { key_id: String, secret: String },
    /// No credentials configured.
    None,
}

/// Immutable gateway configuration, constructed once at process start.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Resolved facilitator base URL (trailing slash guaranteed).
    pub facilitator_url: Url,
    /// Facilitator credentials.
    pub auth: FacilitatorAuth,
    /// Default settlement recipient, lowercase.
    pub default_pay_to: String,
    /// Base URL for resolving relative resource endpoints.
    pub resource_base_url: Url,
    /// Network tag accepted in authorizations and quoted in challenges.
    pub network: String,
    /// Settlement asset quoted in challenges.
    pub asset: KnownAsset,
    /// Log facilitator traffic (redacted) at debug level.
    pub debug_payments: bool,
}

/// Configuration construction errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
}

impl GatewayConfig {
    /// Builds configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable source.
    ///
    /// `from_env` delegates here; tests inject maps instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let facilitator_url = resolve_facilitator_url(lookup("FACILITATOR_URL").as_deref())?;

        let auth = if let Some(key) = lookup("X402_API_KEY").filter(|k| !k.is_empty()) {
            FacilitatorAuth::BearerKey(key)
        } else if let (Some(key_id), Some(secret)) =
            (lookup("X402_KEY_ID"), lookup("X402_KEY_SECRET"))
        {
            FacilitatorAuth::KeyPair { key_id, secret }
        } else {
            FacilitatorAuth::None
        };

        let default_pay_to = lookup("X402_PAY_TO")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_PAY_TO.to_string())
            .to_lowercase();

        let resource_base_url = lookup("RESOURCE_BASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_RESOURCE_BASE_URL.to_string());
        let resource_base_url =
            Url::parse(&resource_base_url).map_err(|source| ConfigError::InvalidUrl {
                name: "RESOURCE_BASE_URL",
                source,
            })?;

        let debug_payments = lookup("X402_DEBUG")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            facilitator_url,
            auth,
            default_pay_to,
            resource_base_url,
            network: networks::NETWORK_BASE.to_string(),
            asset: networks::USDC_BASE,
            debug_payments,
        })
    }
}

/// Resolves the facilitator base URL from an optional configured value.
///
/// - Rewrites the deprecated hostname to its successor.
/// - Appends the documented default path when the hosted facilitator is
///   configured bare.
/// - Falls back to [`DEFAULT_FACILITATOR_URL`], warning once per process.
///
/// The result always carries a trailing slash so `Url::join` treats the last
/// path segment as a directory.
pub fn resolve_facilitator_url(configured: Option<&str>) -> Result<Url, ConfigError> {
    let raw = match configured.filter(|v| !v.is_empty()) {
        Some(value) => value.to_string(),
        None => {
            if FALLBACK_WARNED.set(()).is_ok() {
                tracing::warn!(
                    url = DEFAULT_FACILITATOR_URL,
                    "FACILITATOR_URL not configured, using default facilitator"
                );
            }
            DEFAULT_FACILITATOR_URL.to_string()
        }
    };

    let mut url = Url::parse(raw.trim_end_matches('/')).map_err(|source| {
        ConfigError::InvalidUrl {
            name: "FACILITATOR_URL",
            source,
        }
    })?;

    if url.host_str() == Some(DEPRECATED_FACILITATOR_HOST) {
        // Old hosted endpoint; the successor serves the same API.
        url.set_host(Some(HOSTED_FACILITATOR_HOST))
            .map_err(|source| ConfigError::InvalidUrl {
                name: "FACILITATOR_URL",
                source,
            })?;
    }

    if url.host_str() == Some(HOSTED_FACILITATOR_HOST) && matches!(url.path(), "" | "/") {
        url.set_path(HOSTED_FACILITATOR_PATH);
    }

    // Trailing slash so joins append rather than replace the last segment.
    let mut normalized = url.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|source| ConfigError::InvalidUrl {
        name: "FACILITATOR_URL",
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn defaults_apply_with_empty_environment() {
        let config = GatewayConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.facilitator_url.as_str(), "https://x402.org/facilitator/");
        assert_eq!(config.auth, FacilitatorAuth::None);
        assert_eq!(config.default_pay_to, DEFAULT_PAY_TO);
        assert_eq!(config.network, "base");
        assert!(!config.debug_payments);
    }

    #[test]
    fn static_key_wins_over_key_pair() {
        let vars = HashMap::from([
            ("X402_API_KEY", "static-key"),
            ("X402_KEY_ID", "kid"),
            ("X402_KEY_SECRET", "shh"),
        ]);
        let config = GatewayConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.auth, FacilitatorAuth::BearerKey("static-key".into()));
    }

    #[test]
    fn key_pair_used_without_static_key() {
        let vars = HashMap::from([("X402_KEY_ID", "kid"), ("X402_KEY_SECRET", "shh")]);
        let config = GatewayConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(
            config.auth,
            FacilitatorAuth::KeyPair {
                key_id: "kid".into(),
                secret: "shh".into()
            }
        );
    }

    #[test]
    fn recipient_is_lowercased() {
        let vars = HashMap::from([("X402_PAY_TO", "0xABCDEF0123456789abcdef0123456789ABCDEF01")]);
        let config = GatewayConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(
            config.default_pay_to,
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn deprecated_host_rewrites_to_successor() {
        let url =
            resolve_facilitator_url(Some("https://facilitator.cdp.coinbase.com")).unwrap();
        assert_eq!(url.host_str(), Some("api.cdp.coinbase.com"));
        assert_eq!(url.path(), "/platform/v2/x402/");
    }

    #[test]
    fn hosted_host_gains_default_path() {
        let url = resolve_facilitator_url(Some("https://api.cdp.coinbase.com")).unwrap();
        assert_eq!(url.as_str(), "https://api.cdp.coinbase.com/platform/v2/x402/");
    }

    #[test]
    fn explicit_url_passes_through() {
        let url = resolve_facilitator_url(Some("https://facilitator.example/pay")).unwrap();
        assert_eq!(url.as_str(), "https://facilitator.example/pay/");
    }
}
