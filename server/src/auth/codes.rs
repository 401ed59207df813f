//! Short-lived numeric login codes.
//!
//! The broker maintains a bijection between live codes and uids: at
//! most one live code per uid and exactly one uid per live code. Codes
//! are single-use and expire after a fixed TTL.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;

const CODE_ALPHABET: &[u8] = b"0123456789";
const CODE_LEN: usize = 6;

pub struct AuthCodeBroker {
    ttl: Duration,
    code_to_uid: DashMap<String, String>,
    uid_to_code: DashMap<String, String>,
}

impl AuthCodeBroker {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            ttl,
            code_to_uid: DashMap::new(),
            uid_to_code: DashMap::new(),
        })
    }

    /// Issue a code for a uid. Idempotent while a code is live: the
    /// existing code is returned unchanged and its TTL is not renewed.
    pub fn issue(self: &Arc<Self>, uid: &str) -> String {
        if let Some(code) = self.uid_to_code.get(uid) {
            return code.value().clone();
        }

        // Claim a fresh code, regenerating on collision. The entry API
        // makes claim-if-vacant a single step.
        let code = loop {
            let candidate = generate_code();
            match self.code_to_uid.entry(candidate.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(uid.to_string());
                    break candidate;
                }
                Entry::Occupied(_) => continue,
            }
        };
        self.uid_to_code.insert(uid.to_string(), code.clone());

        // Expiry holds only the (code, uid) pair and re-validates the
        // pairing before removing — the code may have been consumed and
        // reissued to someone else by the time the timer fires.
        let broker = Arc::clone(self);
        let expire_code = code.clone();
        let expire_uid = uid.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(broker.ttl).await;
            broker.expire(&expire_code, &expire_uid);
        });

        tracing::debug!(uid = %uid, "login code issued");
        code
    }

    /// Look up a code and consume it. Both mapping directions are
    /// removed on hit; a second consume of the same code misses.
    pub fn consume(&self, code: &str) -> Option<String> {
        let (_, uid) = self.code_to_uid.remove(code)?;
        self.uid_to_code.remove_if(&uid, |_, live| live == code);
        tracing::debug!(uid = %uid, "login code consumed");
        Some(uid)
    }

    /// TTL teardown. No-op if the pairing is already gone.
    fn expire(&self, code: &str, uid: &str) {
        let removed = self
            .code_to_uid
            .remove_if(code, |_, live_uid| live_uid == uid)
            .is_some();
        if removed {
            self.uid_to_code.remove_if(uid, |_, live_code| live_code == code);
            tracing::debug!(uid = %uid, "login code expired");
        }
    }

    /// Number of live codes (for tests and the stats surface).
    pub fn live_codes(&self) -> usize {
        self.code_to_uid.len()
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
