//! HMAC-SHA256 request signing for Binance's signed endpoints.
//!
//! Only the signed-GET shape (account, positionRisk) is needed here —
//! Binance futures account monitoring never signs a POST body.

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const RECV_WINDOW_MS: i64 = 5_000;

#[derive(Clone)]
pub struct BinanceSigner {
    api_key: String,
    secret_key: String,
}

impl std::fmt::Debug for BinanceSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceSigner")
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl BinanceSigner {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn hmac_sha256_hex(&self, message: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Appends `timestamp` and `signature` to a set of already-encoded
    /// query parameters, returning the full signed query string.
    pub fn sign_query(&self, params: &[(&str, String)], timestamp_ms: i64) -> String {
        let mut pairs: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        pairs.push(("timestamp".to_string(), timestamp_ms.to_string()));
        pairs.push(("recvWindow".to_string(), RECV_WINDOW_MS.to_string()));

        let query = serde_urlencoded::to_string(&pairs).expect("query params are valid utf8");
        let signature = self.hmac_sha256_hex(&query);
        format!("{query}&signature={signature}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_query_is_deterministic_for_fixed_timestamp() {
        let signer = BinanceSigner::new("key", "secret");
        let a = signer.sign_query(&[("symbol", "BTCUSDT".to_string())], 1_700_000_000_000);
        let b = signer.sign_query(&[("symbol", "BTCUSDT".to_string())], 1_700_000_000_000);
        assert_eq!(a, b);
        assert!(a.contains("signature="));
        assert!(a.contains("recvWindow=5000"));
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let a = BinanceSigner::new("key", "secret-a")
            .sign_query(&[], 1_700_000_000_000);
        let b = BinanceSigner::new("key", "secret-b")
            .sign_query(&[], 1_700_000_000_000);
        assert_ne!(a, b);
    }
}
