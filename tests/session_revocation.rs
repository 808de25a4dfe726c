//! Logging in from two devices, then revoking all sessions, invalidates
//! both.

use std::time::Duration;

use tradecore::session::{generate_session_id, MemoryStore, SessionStore};
use uuid::Uuid;

#[tokio::test]
async fn revoke_all_invalidates_every_device() {
    let store = MemoryStore::new();
    let user_id = Uuid::new_v4();
    let ttl = Duration::from_secs(3600);

    let c1 = generate_session_id();
    let c2 = generate_session_id();
    store.store_session(user_id, &c1, ttl).await.expect("store c1");
    store.store_session(user_id, &c2, ttl).await.expect("store c2");

    assert!(store.validate_session(user_id, &c1).await.expect("validate c1"));
    assert!(store.validate_session(user_id, &c2).await.expect("validate c2"));

    store.revoke_all(user_id).await.expect("revoke all");

    assert!(!store.validate_session(user_id, &c1).await.expect("validate c1 after revoke"));
    assert!(!store.validate_session(user_id, &c2).await.expect("validate c2 after revoke"));
}

#[tokio::test]
async fn deleting_one_session_leaves_the_other_device_logged_in() {
    let store = MemoryStore::new();
    let user_id = Uuid::new_v4();
    let ttl = Duration::from_secs(3600);

    let c1 = generate_session_id();
    let c2 = generate_session_id();
    store.store_session(user_id, &c1, ttl).await.expect("store c1");
    store.store_session(user_id, &c2, ttl).await.expect("store c2");

    store.delete_session(user_id, &c1).await.expect("delete c1");

    assert!(!store.validate_session(user_id, &c1).await.expect("validate c1"));
    assert!(store.validate_session(user_id, &c2).await.expect("validate c2"));
}

#[tokio::test]
async fn an_unknown_session_never_validates() {
    let store = MemoryStore::new();
    let user_id = Uuid::new_v4();

    assert!(!store
        .validate_session(user_id, "never-issued")
        .await
        .expect("validate unknown session"));
}
