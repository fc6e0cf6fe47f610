//! Tower middleware enforcing payment on priced routes.
//!
//! One [`PaymentGate`] is built per process and stamps out per-route layers
//! via [`PaymentGate::for_resource`]. Each request walks a fixed pipeline:
//! registry lookup, challenge construction, header extraction, authorization
//! decode and sanity check, rate-limit admission, facilitator verify/settle,
//! and only then the inner handler. Settlement runs before the handler, so a
//! handler that starts executing is always paid for.
//!
//! Responses speak both protocol generations at once: a 402 carries the
//! legacy JSON body and the base64 `Payment-Required` header envelope, and a
//! paid response carries the flat `X-Settlement-*` headers alongside the
//! `Payment-Response` envelope.

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::Response;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};

use crate::authorization::{self, AuthorizationError};
use crate::challenge::{self, ChallengeError};
use crate::config::GatewayConfig;
use crate::facilitator::Facilitator;
use crate::headers;
use crate::proto::{PaymentRequirements, TransferAuthorization, v1, v2};
use crate::rate_limit::{FixedWindowLimiter, RateLimitDecision, RateLimiter};
use crate::registry::{ResourceRegistry, UnknownResource};
use crate::settlement::{
    SettleErrorClassifier, SettlementStatus, VerificationResult, verify_and_settle,
};
use crate::timestamp::UnixTimestamp;

/// Everything the inner handler may want to know about the payment that
/// admitted it. Injected as a request extension; read-only downstream.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    pub resource_id: String,
    pub requirements: PaymentRequirements,
    pub authorization: TransferAuthorization,
    pub payer: Option<String>,
    pub transaction: Option<String>,
    pub payment_hash: Option<String>,
    pub facilitator_signature: Option<String>,
    pub status: SettlementStatus,
    /// Absorbed transient error; present only when `status` is pending.
    pub settlement_error: Option<String>,
}

/// Gate failures, each mapped to exactly one response status.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    UnknownResource(#[from] UnknownResource),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error("payment required")]
    PaymentRequired(Box<PaymentRequirements>),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error("rate limit exceeded, retry in {reset_in_seconds}s")]
    RateLimited { reset_in_seconds: u64 },
    #[error("facilitator call failed: {0}")]
    Facilitator(String),
    #[error("payment rejected: {reason}")]
    Rejected { reason: String },
}

struct GateState<F> {
    facilitator: F,
    config: GatewayConfig,
    registry: ResourceRegistry,
    rate_limiter: Arc<dyn RateLimiter>,
    classifier: SettleErrorClassifier,
}

/// The per-process middleware instance.
///
/// Holds the facilitator, configuration, registry, and rate limiter behind
/// one `Arc`; [`for_resource`](Self::for_resource) derives cheap per-route
/// layers from it.
pub struct PaymentGate<F> {
    state: Arc<GateState<F>>,
}

impl<F> Clone for PaymentGate<F> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<F> PaymentGate<F> {
    pub fn new(facilitator: F, config: GatewayConfig, registry: ResourceRegistry) -> Self {
        Self {
            state: Arc::new(GateState {
                facilitator,
                config,
                registry,
                rate_limiter: Arc::new(FixedWindowLimiter::default()),
                classifier: SettleErrorClassifier::standard(),
            }),
        }
    }

    /// Swaps in a different admission policy, e.g. a distributed counter.
    pub fn with_rate_limiter(self, limiter: impl RateLimiter + 'static) -> Self
    where
        F: Clone,
    {
        let state = &self.state;
        Self {
            state: Arc::new(GateState {
                facilitator: state.facilitator.clone(),
                config: state.config.clone(),
                registry: state.registry.clone(),
                rate_limiter: Arc::new(limiter),
                classifier: SettleErrorClassifier::standard(),
            }),
        }
    }

    /// Creates the layer guarding one registered resource.
    pub fn for_resource(&self, resource_id: impl Into<String>) -> PaymentGateLayer<F> {
        PaymentGateLayer {
            state: self.state.clone(),
            resource_id: Arc::from(resource_id.into()),
        }
    }
}

/// A [`tower::Layer`] bound to one resource identifier.
pub struct PaymentGateLayer<F> {
    state: Arc<GateState<F>>,
    resource_id: Arc<str>,
}

impl<F> Clone for PaymentGateLayer<F> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            resource_id: self.resource_id.clone(),
        }
    }
}

impl<S, F> Layer<S> for PaymentGateLayer<F>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = PaymentGateService<F>;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentGateService {
            state: self.state.clone(),
            resource_id: self.resource_id.clone(),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// The service produced by [`PaymentGateLayer`].
pub struct PaymentGateService<F> {
    state: Arc<GateState<F>>,
    resource_id: Arc<str>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<F> Clone for PaymentGateService<F> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            resource_id: self.resource_id.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<F> Service<Request> for PaymentGateService<F>
where
    F: Facilitator + Send + Sync + 'static,
    F::Error: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let state = self.state.clone();
        let resource_id = self.resource_id.clone();
        let inner = self.inner.clone();
        Box::pin(async move { Ok(handle(state, resource_id, inner, req).await) })
    }
}

async fn handle<F>(
    state: Arc<GateState<F>>,
    resource_id: Arc<str>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
    mut req: Request,
) -> Response
where
    F: Facilitator,
{
    let outcome = match gate(&state, &resource_id, req.headers()).await {
        Ok(outcome) => outcome,
        Err(err) => return error_response(err),
    };

    req.extensions_mut().insert(outcome.context);

    let mut response = match inner.oneshot(req).await {
        Ok(response) => response,
        Err(infallible) => match infallible {},
    };

    apply_settlement_headers(response.headers_mut(), &outcome.result, &outcome.rate);
    headers::expose_payment_headers(response.headers_mut());
    response
}

struct GateOutcome {
    context: PaymentContext,
    result: VerificationResult,
    rate: RateLimitDecision,
}

/// Runs the pre-handler pipeline for one request.
async fn gate<F>(
    state: &GateState<F>,
    resource_id: &str,
    req_headers: &HeaderMap,
) -> Result<GateOutcome, GateError>
where
    F: Facilitator,
{
    let resource = state.registry.lookup(resource_id)?;
    let requirements = challenge::build_requirements(resource, &state.config)?;

    let header = req_headers
        .get(headers::PAYMENT_SIGNATURE)
        .or_else(|| req_headers.get(headers::X_PAYMENT));
    let header = match header {
        Some(value) => value.as_bytes(),
        None => return Err(GateError::PaymentRequired(Box::new(requirements))),
    };

    let payload = authorization::decode(header, &state.config.network)?;
    authorization::sanity_check(&payload, &requirements, UnixTimestamp::now())?;

    let rate = state
        .rate_limiter
        .admit(Some(&payload.payload.authorization.from));
    if !rate.allowed {
        return Err(GateError::RateLimited {
            reset_in_seconds: rate.reset_in_seconds,
        });
    }

    let call_timeout = Duration::from_secs(resource.max_timeout_seconds);
    let result = verify_and_settle(
        &state.facilitator,
        &payload,
        &requirements,
        &state.classifier,
        call_timeout,
    )
    .await
    .map_err(|e| GateError::Facilitator(e.to_string()))?;

    if !result.verified {
        return Err(GateError::Rejected {
            reason: result
                .error
                .clone()
                .unwrap_or_else(|| "payment rejected".to_string()),
        });
    }

    let context = PaymentContext {
        resource_id: resource.id.clone(),
        requirements,
        authorization: payload.payload.authorization.clone(),
        payer: result.payer.clone(),
        transaction: result.transaction.clone(),
        payment_hash: result.payment_hash.clone(),
        facilitator_signature: result.facilitator_signature.clone(),
        status: result.status,
        settlement_error: result.error.clone(),
    };

    Ok(GateOutcome {
        context,
        result,
        rate,
    })
}

fn apply_settlement_headers(
    headers: &mut HeaderMap,
    result: &VerificationResult,
    rate: &RateLimitDecision,
) {
    insert_header(headers, headers::X_SETTLEMENT_STATUS, &result.status.to_string());
    if let Some(transaction) = &result.transaction {
        insert_header(headers, headers::X_SETTLEMENT_TX_HASH, transaction);
    }
    if let Some(hash) = &result.payment_hash {
        insert_header(headers, headers::X_PAYMENT_HASH, hash);
    }
    if let Some(signature) = &result.facilitator_signature {
        insert_header(headers, headers::X_FACILITATOR_SIGNATURE, signature);
    }
    if let Some(payer) = &result.payer {
        insert_header(headers, headers::X_PAYER_ADDRESS, payer);
    }
    if result.status == SettlementStatus::Pending
        && let Some(error) = &result.error
    {
        insert_header(headers, headers::X_SETTLEMENT_ERROR, error);
    }
    insert_header(
        headers,
        headers::X_RATELIMIT_REMAINING,
        &rate.remaining.to_string(),
    );

    match v2::SettlementEnvelope::from(result).encode() {
        Ok(envelope) => insert_header(headers, headers::PAYMENT_RESPONSE, &envelope.to_string()),
        Err(err) => tracing::error!(%err, "failed to encode settlement envelope"),
    }
}

/// Maps a gate failure to its response. Every branch carries the CORS
/// exposure header; the 402 branch emits both protocol generations.
fn error_response(err: GateError) -> Response {
    let mut response = match err {
        GateError::UnknownResource(err) => {
            tracing::error!(%err, "gate misconfiguration");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            )
        }
        GateError::Challenge(err) => {
            tracing::error!(%err, "gate misconfiguration");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            )
        }
        GateError::PaymentRequired(requirements) => challenge_response(&requirements),
        GateError::Authorization(err) => {
            json_response(StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
        }
        GateError::RateLimited { reset_in_seconds } => {
            let mut response = json_response(
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "rate limit exceeded",
                    "retryAfterSeconds": reset_in_seconds,
                }),
            );
            insert_header(response.headers_mut(), headers::X_RATELIMIT_REMAINING, "0");
            insert_header(
                response.headers_mut(),
                headers::X_RATELIMIT_RESET,
                &reset_in_seconds.to_string(),
            );
            response
        }
        GateError::Facilitator(message) => {
            tracing::error!(error = %message, "facilitator call failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("facilitator call failed: {message}") }),
            )
        }
        GateError::Rejected { reason } => {
            json_response(StatusCode::FORBIDDEN, json!({ "error": reason }))
        }
    };
    headers::expose_payment_headers(response.headers_mut());
    response
}

/// Builds the dual-protocol 402: legacy JSON body plus the base64 challenge
/// envelope in `Payment-Required`.
fn challenge_response(requirements: &PaymentRequirements) -> Response {
    let error = Some("payment required".to_string());

    let body = match serde_json::to_vec(&v1::PaymentRequired::new(error.clone(), requirements)) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(%err, "failed to serialize challenge body");
            Vec::new()
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::PAYMENT_REQUIRED;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    match v2::PaymentRequiredEnvelope::new(error, requirements).encode() {
        Ok(envelope) => insert_header(
            response.headers_mut(),
            headers::PAYMENT_REQUIRED,
            &envelope.to_string(),
        ),
        Err(err) => tracing::error!(%err, "failed to encode challenge envelope"),
    }

    response
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(name, "dropping header with non-ASCII value"),
    }
}
