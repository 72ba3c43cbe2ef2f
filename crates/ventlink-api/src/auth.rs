//! Request signing with the device's pre-shared key.
//!
//! Each request carries `s = hex(HMAC-SHA256(key, "{m}|{r}|{d}|{i}|{t}"))`
//! where the fields are the method, request id, device id, PSK identity and
//! unix timestamp. The device recomputes the tag and answers with an
//! `auth` error frame on mismatch.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// The signed portion of a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedHeader<'a> {
    pub method: &'a str,
    pub request_id: u32,
    pub device_id: &'a str,
    pub timestamp: i64,
}

/// Holds the PSK identity and key and produces request signatures.
#[derive(Clone)]
pub struct PskSigner {
    identity: String,
    key: SecretString,
}

impl std::fmt::Debug for PskSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskSigner")
            .field("identity", &self.identity)
            .field("key", &"****")
            .finish()
    }
}

impl PskSigner {
    pub fn new(identity: impl Into<String>, key: SecretString) -> Self {
        Self {
            identity: identity.into(),
            key,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Compute the hex signature for a request header.
    pub fn sign(&self, header: &SignedHeader<'_>) -> Result<String, Error> {
        let mac = self.mac_for(header)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a hex signature in constant time.
    ///
    /// Used by device emulators and tests; the client only signs.
    pub fn verify(&self, header: &SignedHeader<'_>, signature: &str) -> bool {
        let Ok(tag) = hex::decode(signature) else {
            return false;
        };
        self.mac_for(header)
            .is_ok_and(|mac| mac.verify_slice(&tag).is_ok())
    }

    fn mac_for(&self, header: &SignedHeader<'_>) -> Result<HmacSha256, Error> {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret().as_bytes())
            .map_err(|e| Error::Authentication {
                message: format!("unusable key: {e}"),
            })?;
        mac.update(canonical(header, &self.identity).as_bytes());
        Ok(mac)
    }
}

fn canonical(header: &SignedHeader<'_>, identity: &str) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        header.method, header.request_id, header.device_id, identity, header.timestamp
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn header(request_id: u32) -> SignedHeader<'static> {
        SignedHeader {
            method: "get",
            request_id,
            device_id: "VA-0042",
            timestamp: 1_760_000_000,
        }
    }

    #[test]
    fn signature_round_trips_through_verify() {
        let signer = PskSigner::new("VA-0042", SecretString::from("s3cret".to_string()));
        let sig = signer.sign(&header(7)).unwrap();

        assert_eq!(sig.len(), 64);
        assert!(signer.verify(&header(7), &sig));
    }

    #[test]
    fn signature_depends_on_every_header_field() {
        let signer = PskSigner::new("VA-0042", SecretString::from("s3cret".to_string()));
        let sig = signer.sign(&header(7)).unwrap();

        assert!(!signer.verify(&header(8), &sig));

        let other_key = PskSigner::new("VA-0042", SecretString::from("other".to_string()));
        assert!(!other_key.verify(&header(7), &sig));

        let other_identity = PskSigner::new("bridge", SecretString::from("s3cret".to_string()));
        assert!(!other_identity.verify(&header(7), &sig));
    }

    #[test]
    fn verify_rejects_non_hex_input() {
        let signer = PskSigner::new("id", SecretString::from("k".to_string()));
        assert!(!signer.verify(&header(1), "not-hex"));
    }

    #[test]
    fn debug_output_hides_key() {
        let signer = PskSigner::new("id", SecretString::from("hunter2".to_string()));
        let dbg = format!("{signer:?}");
        assert!(!dbg.contains("hunter2"));
    }
}
