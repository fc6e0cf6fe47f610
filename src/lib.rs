//! Payment-gating middleware for priced HTTP resources over the x402
//! micropayment protocol.
//!
//! The crate wraps priced routes in a [`tower::Layer`] that intercepts each
//! request, issues a 402 challenge when no payment accompanies it, validates
//! and rate-limits signed transfer authorizations, and settles verified
//! payments through a remote facilitator before the handler runs. Resource
//! handlers, wallet signing, and on-chain mechanics stay outside the crate.
//!
//! Responses are emitted for two client generations at once: legacy clients
//! read the 402 JSON body and flat `X-Settlement-*` headers, current clients
//! read base64 envelopes from the `Payment-Required` and `Payment-Response`
//! headers.
//!
//! ## Example
//!
//! ```no_run
//! use axum::{Router, routing::get};
//! use x402_paygate::{
//!     FacilitatorClient, GatewayConfig, PaymentGate, ResourceConfig, ResourceRegistry,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let facilitator = FacilitatorClient::from_config(&config)?;
//! let registry = ResourceRegistry::new([
//!     ResourceConfig::new("buy-1usd", "Buy $1 credit", "1.00"),
//! ]);
//! let gate = PaymentGate::new(facilitator, config, registry);
//!
//! let app: Router = Router::new().route(
//!     "/api/buy-1usd",
//!     get(|| async { "purchased" }).layer(gate.for_resource("buy-1usd")),
//! );
//! # Ok(())
//! # }
//! ```
//!
//! Handlers can read the settled payment from the [`gateway::PaymentContext`]
//! request extension.

pub mod authorization;
pub mod challenge;
pub mod config;
pub mod facilitator;
pub mod facilitator_client;
pub mod gateway;
pub mod headers;
pub mod networks;
pub mod proto;
pub mod rate_limit;
pub mod registry;
pub mod settlement;
pub mod timestamp;
pub mod util;

pub use config::{FacilitatorAuth, GatewayConfig};
pub use facilitator::Facilitator;
pub use facilitator_client::FacilitatorClient;
pub use gateway::{PaymentContext, PaymentGate, PaymentGateLayer, PaymentGateService};
pub use rate_limit::{FixedWindowLimiter, RateLimiter};
pub use registry::{ResourceConfig, ResourceRegistry};
pub use settlement::{SettlementStatus, VerificationResult};
