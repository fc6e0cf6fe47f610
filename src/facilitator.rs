//! The verification and settlement interface the gateway depends on.
//!
//! The gateway never executes transfers itself; it delegates to an external
//! facilitator through this trait. Production deployments use
//! [`crate::facilitator_client::FacilitatorClient`]; tests script the trait
//! directly.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::proto::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};

/// Asynchronous verify/settle/discovery interface of a settlement facilitator.
pub trait Facilitator {
    type Error: Debug + Display;

    /// Checks a payment authorization against requirements: signature
    /// validity, balance sufficiency, scheme and network compatibility.
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    /// Executes settlement for a previously verified authorization.
    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;

    /// Reports the payment kinds the facilitator can process.
    fn supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }

    fn supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send {
        self.as_ref().supported()
    }
}
