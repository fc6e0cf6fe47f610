//! Well-known scheme, network, and asset identifiers.
//!
//! The gateway supports a single payment scheme (`exact`, fixed-amount
//! ERC-3009 style transfers) on a single network per deployment. The default
//! deployment settles USDC on Base.

/// The only supported payment scheme tag.
pub const SCHEME_EXACT: &str = "exact";

/// Default network tag for challenges and authorization validation.
pub const NETWORK_BASE: &str = "base";

/// A settlement asset the gateway knows how to quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownAsset {
    /// Token contract address, lowercase hex.
    pub address: &'static str,
    /// Number of decimals in the token's smallest unit.
    pub decimals: u32,
    /// Ticker symbol surfaced in challenge extensions.
    pub symbol: &'static str,
}

/// USDC on Base mainnet.
pub const USDC_BASE: KnownAsset = KnownAsset {
    address: "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
    decimals: 6,
    symbol: "USDC",
};
