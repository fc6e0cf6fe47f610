//! Helper types: base64 header envelopes and decimal price math.

pub mod b64;
pub mod money_amount;

pub use b64::Base64Bytes;
pub use money_amount::{MoneyAmount, MoneyAmountError};
