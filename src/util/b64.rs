//! Base64 helpers for header-encoded protocol envelopes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use std::borrow::Cow;
use std::fmt::Display;

/// Bytes holding standard-alphabet base64 text.
///
/// Payment headers carry base64-encoded JSON envelopes in both directions.
/// This wrapper keeps the encoded form as bytes (copy-on-write, so decoding a
/// borrowed header value allocates nothing up front) and converts to and from
/// the raw JSON on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, [u8]>);

impl Base64Bytes<'_> {
    /// Encodes raw bytes into base64 text.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        Base64Bytes(Cow::Owned(b64.encode(input.as_ref()).into_bytes()))
    }

    /// Decodes the held base64 text back to raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }
}

impl AsRef<[u8]> for Base64Bytes<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> From<&'a [u8]> for Base64Bytes<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Base64Bytes(Cow::Borrowed(slice))
    }
}

impl Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.0.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let encoded = Base64Bytes::encode(b"{\"x402Version\":2}");
        assert_eq!(encoded.decode().unwrap(), b"{\"x402Version\":2}");
    }

    #[test]
    fn rejects_invalid_input() {
        let bogus = Base64Bytes::from(&b"not base64!!"[..]);
        assert!(bogus.decode().is_err());
    }
}
