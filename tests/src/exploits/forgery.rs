//! # Forgery Attacks
//!
//! The attacker can run script in the front-end and build arbitrary
//! arguments, but never sees the signing key.

#[cfg(test)]
mod tests {
    use crate::support::{Bridge, T0};
    use ipc_security::{
        canonical_json, InvocationError, SecureChannelApi, SecureMessage, SecurityViolation,
    };
    use rand::RngCore;
    use serde_json::{json, Value};

    fn flip_hex(text: &str, index: usize) -> String {
        let mut bytes = hex::decode(text).unwrap();
        bytes[index] ^= 0x01;
        hex::encode(bytes)
    }

    #[tokio::test]
    async fn test_self_signed_envelope_rejected() {
        let bridge = Bridge::new();
        let mut nonce = [0u8; 16];
        let mut signature = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);
        rand::thread_rng().fill_bytes(&mut signature);

        let forged = json!({
            "payload": {"email": "admin@b.com"},
            "timestamp": T0,
            "nonce": hex::encode(nonce),
            "signature": hex::encode(signature),
        });

        assert_eq!(
            bridge
                .call_raw(&bridge.trusted_caller(), "auth:sign-in", vec![forged])
                .await,
            Err(InvocationError::Rejected)
        );
        assert_eq!(bridge.calls_to("auth:sign-in"), 0);
    }

    #[tokio::test]
    async fn test_payload_swap_rejected() {
        let bridge = Bridge::new();
        let mut envelope = bridge
            .gateway
            .create_secure_message(json!({"id": 1, "amount": 10}))
            .unwrap()
            .to_value();
        envelope["payload"] = json!({"id": 1, "amount": 10_000});

        assert_eq!(
            bridge
                .call_raw(&bridge.trusted_caller(), "db:save-record", vec![envelope])
                .await,
            Err(InvocationError::Rejected)
        );
        assert_eq!(bridge.calls_to("db:save-record"), 0);
    }

    #[tokio::test]
    async fn test_timestamp_refresh_rejected() {
        let bridge = Bridge::new();
        let mut envelope = bridge.gateway.create_secure_message(json!("old")).unwrap().to_value();

        // Stretch the envelope's life by moving its timestamp forward.
        bridge.clock.advance(40_000);
        envelope["timestamp"] = json!(T0 + 40_000);

        assert_eq!(
            bridge
                .call_raw(&bridge.trusted_caller(), "db:save-record", vec![envelope])
                .await,
            Err(InvocationError::Rejected)
        );
    }

    #[test]
    fn test_every_field_bit_flip_is_signature_failure() {
        let bridge = Bridge::new();
        let original = bridge.gateway.create_secure_message(json!({"v": 1})).unwrap().to_value();

        let mut tampered = Vec::new();
        for i in 0..16 {
            let mut v = original.clone();
            v["nonce"] = json!(flip_hex(v["nonce"].as_str().unwrap(), i));
            tampered.push(v);
        }
        for i in 0..32 {
            let mut v = original.clone();
            v["signature"] = json!(flip_hex(v["signature"].as_str().unwrap(), i));
            tampered.push(v);
        }
        for bit in 0..16 {
            let mut v = original.clone();
            v["timestamp"] = json!(T0 ^ (1u64 << bit));
            tampered.push(v);
        }
        let mut v = original.clone();
        v["payload"] = json!({"v": 3});
        tampered.push(v);

        for value in tampered {
            let message = SecureMessage::from_value(&value).unwrap();
            assert_eq!(
                bridge.gateway.verify_message(message),
                Err(SecurityViolation::SignatureInvalid)
            );
        }
        assert_eq!(bridge.gateway.security_stats().cached_nonce_count, 0);
    }

    #[tokio::test]
    async fn test_malformed_envelopes_rejected() {
        let bridge = Bridge::new();
        let good = bridge.gateway.create_secure_message(json!(1)).unwrap().to_value();

        let mut missing_nonce = good.clone();
        missing_nonce.as_object_mut().unwrap().remove("nonce");
        let mut short_nonce = good.clone();
        short_nonce["nonce"] = json!("abcd");
        let mut string_timestamp = good.clone();
        string_timestamp["timestamp"] = json!(T0.to_string());
        let mut negative_timestamp = good.clone();
        negative_timestamp["timestamp"] = json!(-1);
        let mut not_hex = good.clone();
        not_hex["signature"] = json!("zz".repeat(32));

        let cases: Vec<Value> = vec![
            json!(null),
            json!([]),
            json!("envelope"),
            json!({}),
            missing_nonce,
            short_nonce,
            string_timestamp,
            negative_timestamp,
            not_hex,
        ];

        for case in cases {
            assert!(matches!(
                SecureMessage::from_value(&case),
                Err(SecurityViolation::MalformedEnvelope { .. })
            ));
            assert_eq!(
                bridge
                    .call_raw(&bridge.trusted_caller(), "auth:sign-up", vec![case])
                    .await,
                Err(InvocationError::Rejected)
            );
        }
        assert_eq!(bridge.calls_to("auth:sign-up"), 0);

        // The untouched envelope is still usable afterwards.
        assert!(bridge
            .call_raw(&bridge.trusted_caller(), "auth:sign-up", vec![good])
            .await
            .is_ok());
    }

    #[test]
    fn test_envelope_from_another_process_rejected() {
        let ours = Bridge::new();
        let theirs = Bridge::new();
        let message = theirs.gateway.create_secure_message(json!("hello")).unwrap();
        assert_eq!(
            ours.gateway.verify_message(message),
            Err(SecurityViolation::SignatureInvalid)
        );
    }

    #[test]
    fn test_key_order_does_not_matter_to_mac() {
        let bridge = Bridge::new();
        let message = bridge
            .gateway
            .create_secure_message(json!({"z": 1, "a": {"k": [true, null]}}))
            .unwrap();
        let mut reordered = message.clone();
        reordered.payload = serde_json::from_str(r#"{"a":{"k":[true,null]},"z":1}"#).unwrap();

        assert_eq!(canonical_json(&message.payload), canonical_json(&reordered.payload));
        assert!(bridge.gateway.verify_message(reordered).is_ok());
    }
}
