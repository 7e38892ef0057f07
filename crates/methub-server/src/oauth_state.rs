use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// OAuth state is valid for ten minutes.
pub const MAX_STATE_AGE_MS: i64 = 600_000;

/// The signed payload carried through the OAuth redirect:
/// workspace id, user id and issue time in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    pub wid: String,
    pub uid: String,
    pub ts: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("malformed state parameter")]
    Malformed,
    #[error("state signature mismatch")]
    BadSignature,
    #[error("state expired")]
    Expired,
}

/// Encode as `base64(payload) + "." + hex(HMAC_SHA256(secret, payload))`.
pub fn sign_state(secret: &[u8], payload: &StatePayload) -> String {
    let json = serde_json::to_vec(payload).unwrap_or_default();
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&json);

    let mut mac = HmacSha256::new_from_slice(secret)
        .unwrap_or_else(|_| HmacSha256::new_from_slice(b"default").expect("hmac accepts any key length"));
    mac.update(&json);
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("{encoded}.{signature}")
}

/// Verify signature and freshness, returning the payload. Rejects on
/// signature mismatch and when the payload is older than ten minutes.
pub fn verify_state(secret: &[u8], state: &str, now_ms: i64) -> Result<StatePayload, StateError> {
    let (encoded, signature_hex) = state.split_once('.').ok_or(StateError::Malformed)?;
    let json = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| StateError::Malformed)?;
    let signature = hex::decode(signature_hex).map_err(|_| StateError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| StateError::BadSignature)?;
    mac.update(&json);
    mac.verify_slice(&signature)
        .map_err(|_| StateError::BadSignature)?;

    let payload: StatePayload =
        serde_json::from_slice(&json).map_err(|_| StateError::Malformed)?;

    if now_ms - payload.ts > MAX_STATE_AGE_MS {
        return Err(StateError::Expired);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(ts: i64) -> StatePayload {
        StatePayload {
            wid: "ws1".to_string(),
            uid: "user1".to_string(),
            ts,
        }
    }

    #[test]
    fn round_trips_with_same_secret() {
        let now = 1_700_000_000_000;
        let state = sign_state(b"secret", &payload(now));
        let verified = verify_state(b"secret", &state, now + 1000).unwrap();
        assert_eq!(verified, payload(now));
    }

    #[test]
    fn rejects_changed_secret() {
        let now = 1_700_000_000_000;
        let state = sign_state(b"secret", &payload(now));
        assert_eq!(
            verify_state(b"other", &state, now),
            Err(StateError::BadSignature)
        );
    }

    #[test]
    fn rejects_stale_payload() {
        let now = 1_700_000_000_000;
        let state = sign_state(b"secret", &payload(now));
        assert_eq!(
            verify_state(b"secret", &state, now + MAX_STATE_AGE_MS + 1),
            Err(StateError::Expired)
        );
        // Right at the boundary is still accepted.
        assert!(verify_state(b"secret", &state, now + MAX_STATE_AGE_MS).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let now = 1_700_000_000_000;
        let state = sign_state(b"secret", &payload(now));
        let (_, sig) = state.split_once('.').unwrap();
        let forged_json = serde_json::to_vec(&payload(now + 1)).unwrap();
        let forged = format!(
            "{}.{}",
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(forged_json),
            sig
        );
        assert_eq!(
            verify_state(b"secret", &forged, now),
            Err(StateError::BadSignature)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            verify_state(b"secret", "not-a-state", 0),
            Err(StateError::Malformed)
        );
        assert_eq!(
            verify_state(b"secret", "abc.zzz", 0),
            Err(StateError::Malformed)
        );
    }
}
