//! HMAC-SHA256 settlement proofs
//!
//! Two proof formats, one per settlement channel:
//! - client verify: signature over `"{intent_id}|{payment_id}"`
//! - provider webhook: signature over the raw request body
//!
//! Verification is constant-time via `Mac::verify_slice`. Any malformed
//! input (bad hex, empty header) verifies as false rather than erroring,
//! so callers uniformly map failure to a signature rejection.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a client-side settlement proof
///
/// The client signs `"{intent_id}|{payment_id}"` with the shared secret
/// and sends the signature hex-encoded.
pub fn verify_client_signature(
    intent_id: &str,
    payment_id: &str,
    signature_hex: &str,
    secret: &str,
) -> bool {
    let payload = format!("{intent_id}|{payment_id}");
    verify_hex(payload.as_bytes(), signature_hex, secret)
}

/// Verify a provider webhook signature over the raw request body
pub fn verify_webhook_signature(payload: &[u8], signature_hex: &str, secret: &str) -> bool {
    verify_hex(payload, signature_hex, secret)
}

fn verify_hex(payload: &[u8], signature_hex: &str, secret: &str) -> bool {
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&sig_bytes).is_ok()
}

/// Produce a hex signature over a payload, as a client or the provider
/// would. HMAC accepts keys of any length, so the fallback never fires.
pub fn sign_hex(payload: &[u8], secret: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_client_signature_roundtrip() {
        let sig = sign_hex(b"int_1|pay_1", SECRET);
        assert!(verify_client_signature("int_1", "pay_1", &sig, SECRET));
    }

    #[test]
    fn test_client_signature_tampered() {
        let sig = sign_hex(b"int_1|pay_1", SECRET);
        // Different payment id
        assert!(!verify_client_signature("int_1", "pay_2", &sig, SECRET));
        // Different secret
        assert!(!verify_client_signature("int_1", "pay_1", &sig, "other"));
    }

    #[test]
    fn test_malformed_signature_is_false() {
        assert!(!verify_client_signature("int_1", "pay_1", "not-hex!!", SECRET));
        assert!(!verify_client_signature("int_1", "pay_1", "", SECRET));
    }

    #[test]
    fn test_webhook_signature_over_raw_body() {
        let body = br#"{"event":"payment.captured","payload":{"order_id":"int_1"}}"#;
        let sig = sign_hex(body, SECRET);
        assert!(verify_webhook_signature(body, &sig, SECRET));

        // One flipped byte fails
        let mut tampered = body.to_vec();
        tampered[0] = b'[';
        assert!(!verify_webhook_signature(&tampered, &sig, SECRET));
    }
}
