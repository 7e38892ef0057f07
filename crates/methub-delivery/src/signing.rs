use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of the raw payload, hex-encoded.
pub fn compute_signature(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret)
        .unwrap_or_else(|_| HmacSha256::new_from_slice(b"default").expect("hmac accepts any key length"));
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Header value in Meta's `X-Hub-Signature-256` format.
pub fn signature_header(secret: &[u8], payload: &[u8]) -> String {
    format!("sha256={}", compute_signature(secret, payload))
}

/// Verify a `sha256=<hex>` header against the raw payload. Comparison is
/// constant-time via the MAC verifier.
pub fn verify_signature_header(secret: &[u8], payload: &[u8], header_value: &str) -> bool {
    let Some(hex_sig) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(signature) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips() {
        let header = signature_header(b"topsecret", b"{\"a\":1}");
        assert!(header.starts_with("sha256="));
        assert!(verify_signature_header(b"topsecret", b"{\"a\":1}", &header));
    }

    #[test]
    fn verification_rejects_wrong_secret_payload_and_format() {
        let header = signature_header(b"topsecret", b"{\"a\":1}");
        assert!(!verify_signature_header(b"other", b"{\"a\":1}", &header));
        assert!(!verify_signature_header(b"topsecret", b"{\"a\":2}", &header));
        assert!(!verify_signature_header(b"topsecret", b"{\"a\":1}", "md5=abc"));
        assert!(!verify_signature_header(b"topsecret", b"{\"a\":1}", "sha256=zz"));
    }
}
