//! # Gateway Lifecycle
//!
//! Key rotation, background eviction and shutdown as seen from the transport.

#[cfg(test)]
mod tests {
    use crate::support::{Bridge, T0};
    use ipc_security::{
        EvictionPolicy, InvocationError, SecureChannelApi, SecurityConfig, SecurityViolation,
    };
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_rotation_kills_in_flight_envelopes() {
        let bridge = Bridge::new();
        let caller = bridge.trusted_caller();

        let in_flight = bridge
            .gateway
            .create_secure_message(json!({"email": "a@b.com"}))
            .unwrap()
            .to_value();

        assert_eq!(bridge.gateway.rotate_key(), Ok(1));

        let result = bridge
            .call_raw(&caller, "auth:sign-in", vec![in_flight])
            .await;
        assert_eq!(result, Err(InvocationError::Rejected));
        assert_eq!(bridge.calls_to("auth:sign-in"), 0);

        // The front-end recovers by re-creating the envelope.
        assert!(bridge
            .call("auth:sign-in", json!({"email": "a@b.com"}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_rotation_resets_replay_set_and_bumps_generation() {
        let bridge = Bridge::new();
        for i in 0..3 {
            bridge.call("db:save-record", json!({"id": i})).await.unwrap();
        }
        assert_eq!(bridge.gateway.security_stats().cached_nonce_count, 3);

        bridge.gateway.rotate_key().unwrap();
        bridge.gateway.rotate_key().unwrap();

        let stats = bridge.gateway.security_stats();
        assert_eq!(stats.cached_nonce_count, 0);
        assert_eq!(stats.key_generation, 2);
        assert_eq!(stats.key_length, 32);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_ages_out_nonces() {
        let bridge = Bridge::with_config(SecurityConfig {
            sweep_interval_ms: 60_000,
            ..Default::default()
        });
        bridge.gateway.spawn_sweeper().unwrap();

        for i in 0..10 {
            bridge.call("db:save-record", json!({"id": i})).await.unwrap();
        }
        assert_eq!(bridge.gateway.security_stats().cached_nonce_count, 10);

        bridge.clock.set(T0 + 120_000);
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(bridge.gateway.security_stats().cached_nonce_count, 0);
        bridge.gateway.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_whole_cache_sweeper_clears_above_threshold() {
        let bridge = Bridge::with_config(SecurityConfig {
            max_cached_nonces: 10,
            clear_threshold_percent: 80,
            eviction: EvictionPolicy::WholeCache,
            sweep_interval_ms: 1_000,
            ..Default::default()
        });

        for i in 0..8 {
            bridge.call("db:save-record", json!({"id": i})).await.unwrap();
        }
        bridge.gateway.spawn_sweeper().unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        // 8 of 10 is not above 80%.
        assert_eq!(bridge.gateway.security_stats().cached_nonce_count, 8);

        bridge.call("db:save-record", json!({"id": 8})).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(bridge.gateway.security_stats().cached_nonce_count, 0);

        bridge.gateway.shutdown();
    }

    #[tokio::test]
    async fn test_whole_cache_clear_reopens_replay_window() {
        // Legacy eviction forgets fresh nonces too; a captured envelope can
        // be accepted again after a clear while still inside the window.
        let bridge = Bridge::with_config(SecurityConfig {
            max_cached_nonces: 2,
            clear_threshold_percent: 50,
            eviction: EvictionPolicy::WholeCache,
            ..Default::default()
        });
        let captured = bridge.gateway.create_secure_message(json!("pay")).unwrap();

        assert!(bridge.gateway.verify_message(captured.clone()).is_ok());
        assert!(bridge
            .gateway
            .verify_message(bridge.gateway.create_secure_message(json!("x")).unwrap())
            .is_ok());
        bridge.gateway.sweep_now();

        assert!(bridge.gateway.verify_message(captured).is_ok());
    }

    #[tokio::test]
    async fn test_time_indexed_sweep_keeps_fresh_nonces() {
        let bridge = Bridge::new();
        let captured = bridge.gateway.create_secure_message(json!("pay")).unwrap();
        assert!(bridge.gateway.verify_message(captured.clone()).is_ok());

        bridge.clock.advance(20_000);
        bridge.gateway.sweep_now();

        assert_eq!(
            bridge.gateway.verify_message(captured),
            Err(SecurityViolation::ReplayDetected)
        );
    }

    #[tokio::test]
    async fn test_shutdown_forgets_nonces_and_stops_sweeper() {
        let bridge = Bridge::new();
        bridge.gateway.spawn_sweeper().unwrap();
        bridge.call("db:save-record", json!({"id": 1})).await.unwrap();

        bridge.gateway.shutdown();

        assert!(!bridge.gateway.is_sweeper_running());
        assert_eq!(bridge.gateway.security_stats().cached_nonce_count, 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_every_registered_operation() {
        let bridge = Bridge::new();
        let caller = bridge.trusted_caller();
        let captured = bridge
            .gateway
            .prepare_args("auth:sign-in", vec![json!({"email": "a@b.com"})])
            .unwrap();
        assert!(bridge
            .call_raw(&caller, "auth:sign-in", captured.clone())
            .await
            .is_ok());

        bridge.gateway.shutdown();

        // Forgotten nonces must not reopen the replay window.
        assert_eq!(
            bridge.call_raw(&caller, "auth:sign-in", captured).await,
            Err(InvocationError::Rejected)
        );
        assert_eq!(
            bridge.call_raw(&caller, "app:get-version", vec![]).await,
            Err(InvocationError::Rejected)
        );
        assert_eq!(bridge.calls().len(), 1);
        assert!(bridge.gateway.create_secure_message(json!(1)).is_err());
    }
}
