//! HTTP client for a remote settlement facilitator.
//!
//! Speaks JSON to the facilitator's `POST /verify`, `POST /settle`, and
//! `GET /supported` endpoints. Authentication is pluggable per
//! [`FacilitatorAuth`]: a static bearer key is sent verbatim, a key pair
//! derives a short-lived HMAC token per operation, and with no credentials
//! the request goes out unauthenticated so the facilitator's rejection stays
//! diagnosable.
//!
//! Request/response bodies can be logged at debug level with signatures and
//! secrets truncated; the log path is gated behind the config debug flag.

use hmac::{Hmac, Mac};
use http::{HeaderValue, StatusCode};
use reqwest::Client;
use sha2::Sha256;
use std::time::Duration;
use url::Url;

use crate::config::{FacilitatorAuth, GatewayConfig};
use crate::facilitator::Facilitator;
use crate::proto::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};
use crate::timestamp::UnixTimestamp;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a derived auth token, seconds.
const TOKEN_TTL_SECS: u64 = 120;

/// Errors from facilitator round-trips.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("credential generation failed: {0}")]
    Credentials(String),
}

/// A client for one facilitator deployment.
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    supported_url: Url,
    client: Client,
    auth: FacilitatorAuth,
    timeout: Option<Duration>,
    debug_payments: bool,
}

impl FacilitatorClient {
    /// Builds a client from the gateway configuration: resolved facilitator
    /// URL, credentials, and the debug-logging toggle.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, FacilitatorClientError> {
        let client = Self::try_new(config.facilitator_url.clone())?;
        Ok(Self {
            auth: config.auth.clone(),
            debug_payments: config.debug_payments,
            ..client
        })
    }

    /// Builds an unauthenticated client against a base URL.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let join = |segment: &str, context: &'static str| {
            base_url
                .join(segment)
                .map_err(|source| FacilitatorClientError::UrlParse { context, source })
        };
        let verify_url = join("./verify", "constructing ./verify URL")?;
        let settle_url = join("./settle", "constructing ./settle URL")?;
        let supported_url = join("./supported", "constructing ./supported URL")?;
        Ok(Self {
            base_url,
            verify_url,
            settle_url,
            supported_url,
            client: Client::new(),
            auth: FacilitatorAuth::None,
            timeout: None,
            debug_payments: false,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn with_auth(mut self, auth: FacilitatorAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Bounds every request. The gateway also applies a per-resource
    /// deadline around each call; this is the transport-level backstop.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_debug_payments(mut self, enabled: bool) -> Self {
        self.debug_payments = enabled;
        self
    }

    /// Produces the `Authorization` value for one operation, or `None` when
    /// no credentials are configured.
    fn auth_header(
        &self,
        method: &str,
        path: &str,
    ) -> Result<Option<HeaderValue>, FacilitatorClientError> {
        let value = match &self.auth {
            FacilitatorAuth::None => return Ok(None),
            FacilitatorAuth::BearerKey(key) => format!("Bearer {key}"),
            FacilitatorAuth::KeyPair { key_id, secret } => {
                let token = derive_token(key_id, secret, method, path, UnixTimestamp::now())?;
                format!("Bearer {token}")
            }
        };
        HeaderValue::from_str(&value)
            .map(Some)
            .map_err(|e| FacilitatorClientError::Credentials(e.to_string()))
    }

    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        self.post_json(&self.verify_url.clone(), "POST /verify", request)
            .await
    }

    pub async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(&self.settle_url.clone(), "POST /settle", request)
            .await
    }

    pub async fn supported(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        self.get_json(&self.supported_url.clone(), "GET /supported")
            .await
    }

    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        if self.debug_payments {
            let body = serde_json::to_string(payload).unwrap_or_default();
            tracing::debug!(context, body = %redact(&body), "facilitator request");
        }
        let mut req = self.client.post(url.clone()).json(payload);
        if let Some(value) = self.auth_header("POST", url.path())? {
            req = req.header(http::header::AUTHORIZATION, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req
            .send()
            .await
            .map_err(|source| FacilitatorClientError::Http { context, source })?;
        self.read_json(response, context).await
    }

    async fn get_json<R>(&self, url: &Url, context: &'static str) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let mut req = self.client.get(url.clone());
        if let Some(value) = self.auth_header("GET", url.path())? {
            req = req.header(http::header::AUTHORIZATION, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req
            .send()
            .await
            .map_err(|source| FacilitatorClientError::Http { context, source })?;
        self.read_json(response, context).await
    }

    async fn read_json<R>(
        &self,
        response: reqwest::Response,
        context: &'static str,
    ) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        if response.status() == StatusCode::OK {
            let bytes = response
                .bytes()
                .await
                .map_err(|source| FacilitatorClientError::ResponseBodyRead { context, source })?;
            if self.debug_payments {
                let body = String::from_utf8_lossy(&bytes);
                tracing::debug!(context, body = %redact(&body), "facilitator response");
            }
            serde_json::from_slice(&bytes)
                .map_err(|source| FacilitatorClientError::JsonDeserialization { context, source })
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|source| FacilitatorClientError::ResponseBodyRead { context, source })?;
            Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body,
            })
        }
    }
}

impl Facilitator for FacilitatorClient {
    type Error = FacilitatorClientError;

    async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        FacilitatorClient::verify(self, request).await
    }

    async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        FacilitatorClient::settle(self, request).await
    }

    async fn supported(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        FacilitatorClient::supported(self).await
    }
}

impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|source| FacilitatorClientError::UrlParse {
            context: "parsing base URL",
            source,
        })?;
        FacilitatorClient::try_new(url)
    }
}

/// Derives a short-lived token scoped to one HTTP method and path.
///
/// Format: `{key_id}.{expiry}.{hex MAC over "METHOD path\nexpiry"}`. The
/// facilitator recomputes the MAC with the shared secret to accept.
fn derive_token(
    key_id: &str,
    secret: &str,
    method: &str,
    path: &str,
    now: UnixTimestamp,
) -> Result<String, FacilitatorClientError> {
    let expiry = now + TOKEN_TTL_SECS;
    let message = format!("{method} {path}\n{expiry}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| FacilitatorClientError::Credentials(e.to_string()))?;
    mac.update(message.as_bytes());
    let mac = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{key_id}.{expiry}.{mac}"))
}

/// Truncates sensitive material for debug logs.
fn redact(value: &str) -> String {
    const KEEP: usize = 48;
    if value.len() <= KEEP {
        value.to_string()
    } else {
        let head: String = value.chars().take(KEEP).collect();
        format!("{head}… ({} bytes)", value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{ExactPayload, PaymentPayload, PaymentRequirements, TransferAuthorization};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verify_request() -> VerifyRequest {
        let payload = PaymentPayload {
            x402_version: 1,
            scheme: "exact".into(),
            network: "base".into(),
            payload: ExactPayload {
                signature: "0xsig".into(),
                authorization: TransferAuthorization {
                    from: "0xpayer".into(),
                    to: "0xseller".into(),
                    value: 1_000_000,
                    valid_after: None,
                    valid_before: None,
                    nonce: "0x01".into(),
                },
                asset: None,
            },
        };
        let requirements = PaymentRequirements {
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
        };
        VerifyRequest::new(&payload, &requirements)
    }

    #[test]
    fn token_is_scoped_to_method_path_and_expiry() {
        let now = UnixTimestamp::from_secs(1_700_000_000);
        let token = derive_token("kid", "shh", "POST", "/facilitator/verify", now).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "kid");
        assert_eq!(parts[1], "1700000120");
        // A different path yields a different MAC.
        let other = derive_token("kid", "shh", "POST", "/facilitator/settle", now).unwrap();
        assert_ne!(token, other);
        // Same inputs are deterministic.
        let again = derive_token("kid", "shh", "POST", "/facilitator/verify", now).unwrap();
        assert_eq!(token, again);
    }

    #[test]
    fn redact_truncates_long_values() {
        let long = "a".repeat(200);
        let redacted = redact(&long);
        assert!(redacted.len() < long.len());
        assert!(redacted.contains("(200 bytes)"));
        assert_eq!(redact("short"), "short");
    }

    #[test]
    fn endpoint_urls_join_the_base() {
        let client = FacilitatorClient::try_from("https://facilitator.example/pay").unwrap();
        assert_eq!(client.verify_url.as_str(), "https://facilitator.example/pay/verify");
        assert_eq!(client.settle_url.as_str(), "https://facilitator.example/pay/settle");
        assert_eq!(
            client.supported_url.as_str(),
            "https://facilitator.example/pay/supported"
        );
    }

    #[tokio::test]
    async fn verify_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"isValid": true, "payer": "0xpayer"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = FacilitatorClient::try_from(server.uri().as_str()).unwrap();
        let response = client.verify(&verify_request()).await.unwrap();
        assert_eq!(
            response,
            VerifyResponse::Valid {
                payer: Some("0xpayer".into())
            }
        );
    }

    #[tokio::test]
    async fn settle_round_trip_with_static_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .and(header("Authorization", "Bearer api-key-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "transaction": "0xabc"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = FacilitatorClient::try_from(server.uri().as_str())
            .unwrap()
            .with_auth(FacilitatorAuth::BearerKey("api-key-1".into()));
        let response = client.settle(&verify_request()).await.unwrap();
        assert_eq!(
            response,
            SettleResponse::Success {
                transaction: Some("0xabc".into()),
                payer: None,
                signature: None,
            }
        );
    }

    #[tokio::test]
    async fn non_200_maps_to_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = FacilitatorClient::try_from(server.uri().as_str()).unwrap();
        let err = client.verify(&verify_request()).await.unwrap_err();
        match err {
            FacilitatorClientError::HttpStatus { status, body, .. } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
