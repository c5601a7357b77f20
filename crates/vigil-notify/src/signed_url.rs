use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of a signed thumbnail URL.
pub const DEFAULT_TTL_SECS: u64 = 60;

/// Issues and verifies short-lived HMAC-signed thumbnail URLs.
///
/// Validity is entirely self-contained in the URL's `expires` and `sig`
/// query parameters; nothing is stored per URL, so verification works on
/// any replica holding the same secret. Verification failures are a plain
/// `false` with no indication of which check failed.
pub struct SignedUrlService {
    secret: Vec<u8>,
}

impl SignedUrlService {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Generates a signed thumbnail URL valid for `ttl_seconds`.
    pub fn generate(&self, event_id: &str, base_url: &str, ttl_seconds: u64) -> String {
        self.generate_at(event_id, base_url, ttl_seconds, Utc::now())
    }

    /// [`SignedUrlService::generate`] with an injected clock.
    pub fn generate_at(
        &self,
        event_id: &str,
        base_url: &str,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> String {
        let expires = now.timestamp() + ttl_seconds as i64;
        let sig = self.sign(event_id, expires);
        format!(
            "{}/v1/events/{event_id}/thumbnail?expires={expires}&sig={sig}",
            base_url.trim_end_matches('/'),
        )
    }

    /// Verifies a signature extracted from a thumbnail URL.
    pub fn verify(&self, event_id: &str, expires: i64, signature: &str) -> bool {
        self.verify_at(event_id, expires, signature, Utc::now())
    }

    /// [`SignedUrlService::verify`] with an injected clock.
    ///
    /// Rejects expired tokens, then compares signatures in constant time.
    pub fn verify_at(
        &self,
        event_id: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(sig_bytes) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(format!("{event_id}:{expires}").as_bytes());
        mac.verify_slice(&sig_bytes).is_ok()
    }

    fn sign(&self, event_id: &str, expires: i64) -> String {
        // new_from_slice accepts keys of any length for HMAC
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(format!("{event_id}:{expires}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
