//! Tests for the login-code broker: bijection, single use, TTL expiry.

use std::time::Duration;

use botbridge_server::auth::AuthCodeBroker;

#[tokio::test]
async fn issue_is_idempotent_and_consume_is_single_use() {
    let broker = AuthCodeBroker::new(Duration::from_secs(60));

    let code = broker.issue("user-1");
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    // A second issue while the code is live returns the same code.
    assert_eq!(broker.issue("user-1"), code);
    assert_eq!(broker.live_codes(), 1);

    // First consume hits, second misses.
    assert_eq!(broker.consume(&code), Some("user-1".to_string()));
    assert_eq!(broker.consume(&code), None);
    assert_eq!(broker.live_codes(), 0);
}

#[tokio::test]
async fn distinct_uids_get_distinct_codes() {
    let broker = AuthCodeBroker::new(Duration::from_secs(60));

    let a = broker.issue("user-a");
    let b = broker.issue("user-b");
    assert_ne!(a, b);

    assert_eq!(broker.consume(&b), Some("user-b".to_string()));
    // Consuming b must not disturb a's pairing.
    assert_eq!(broker.consume(&a), Some("user-a".to_string()));
}

#[tokio::test(start_paused = true)]
async fn code_expires_after_ttl() {
    let broker = AuthCodeBroker::new(Duration::from_secs(5));

    let code = broker.issue("user-1");
    tokio::time::sleep(Duration::from_secs(6)).await;

    // Expired: the pairing behaves as if it never existed.
    assert_eq!(broker.consume(&code), None);
    assert_eq!(broker.live_codes(), 0);

    let fresh = broker.issue("user-1");
    assert_eq!(broker.consume(&fresh), Some("user-1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn stale_expiry_does_not_evict_a_reissued_code() {
    let broker = AuthCodeBroker::new(Duration::from_secs(5));

    let first = broker.issue("user-1");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(broker.consume(&first), Some("user-1".to_string()));

    // Reissued at t=3; the first code's timer fires at t=5 and must
    // leave this pairing alone.
    let second = broker.issue("user-1");
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(broker.consume(&second), Some("user-1".to_string()));
}
