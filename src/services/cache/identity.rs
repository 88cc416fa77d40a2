//! In-process identity cache with a fixed TTL per entry.
//!
//! - Keyed by credential.
//! - `get` hands out an independent copy (`cached = true` on the copy only).
//! - Every `put` schedules its own one-shot expiry task. The TTL is counted from
//!   the put and is not refreshed on hit.
//! - Every scheduled task is tracked until it fires, so `clear` / `close` can abort
//!   all of them, including tasks whose entry was overwritten since. `evict`
//!   aborts the tasks of its own credential only.
//!
//! Expiry tasks run on the ambient Tokio runtime. Outside one, `put` stores
//! nothing.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::{runtime::Handle, task::AbortHandle};

use crate::services::auth::credential::fingerprint;
use crate::services::auth::identity::Identity;

pub const DEFAULT_TTL: Duration = Duration::from_millis(60_000);

#[derive(Debug)]
struct CacheEntry {
    identity: Identity,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Timer {
    credential: String,
    handle: AbortHandle,
}

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<String, CacheEntry>,
    timers: HashMap<u64, Timer>,
    next_timer_id: u64,
    closed: bool,
}

impl Slots {
    fn abort_timers(&mut self) -> usize {
        let n = self.timers.len();
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
        n
    }

    fn abort_timers_for(&mut self, credential: &str) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, timer| {
            if timer.credential == credential {
                timer.handle.abort();
                false
            } else {
                true
            }
        });
        before - self.timers.len()
    }
}

#[derive(Debug)]
pub struct IdentityCache {
    ttl: Duration,
    slots: Arc<Mutex<Slots>>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl IdentityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache hit returns a deep copy flagged as cached; the stored snapshot is untouched.
    pub fn get(&self, credential: &str) -> Option<Identity> {
        let slots = self.slots.lock();
        slots
            .entries
            .get(credential)
            .map(|entry| entry.identity.clone().into_cached())
    }

    /// When the entry for `credential` was stored.
    pub fn created_at(&self, credential: &str) -> Option<DateTime<Utc>> {
        self.slots
            .lock()
            .entries
            .get(credential)
            .map(|entry| entry.created_at)
    }

    /// Store a freshly resolved identity and schedule its eviction.
    ///
    /// Last write wins for concurrent puts of the same credential; each put keeps
    /// its own timer. No-op once the cache is closed, or when called outside a
    /// Tokio runtime (there would be nothing to run the expiry on).
    pub fn put(&self, credential: &str, identity: Identity) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(
                credential = %fingerprint(credential),
                "no tokio runtime; identity not cached"
            );
            return;
        };

        let mut slots = self.slots.lock();
        if slots.closed {
            tracing::debug!(
                credential = %fingerprint(credential),
                "identity cache closed; not caching"
            );
            return;
        }

        let timer_id = slots.next_timer_id;
        slots.next_timer_id += 1;

        // The slots lock is held until the timer is registered, so the task
        // cannot observe the map before its own entry and handle are in place.
        let task = runtime.spawn(expire(
            Arc::downgrade(&self.slots),
            credential.to_owned(),
            timer_id,
            self.ttl,
        ));
        slots.timers.insert(
            timer_id,
            Timer {
                credential: credential.to_owned(),
                handle: task.abort_handle(),
            },
        );

        slots.entries.insert(
            credential.to_owned(),
            CacheEntry {
                identity: identity.into_stored(),
                created_at: Utc::now(),
            },
        );
    }

    /// Drop the entry for `credential` and abort its pending expiries.
    /// Returns whether an entry existed.
    ///
    /// A later `put` of the same credential gets a full TTL.
    pub fn evict(&self, credential: &str) -> bool {
        let mut slots = self.slots.lock();
        let aborted = slots.abort_timers_for(credential);
        let existed = slots.entries.remove(credential).is_some();

        tracing::debug!(
            credential = %fingerprint(credential),
            timers = aborted,
            "cached identity evicted"
        );
        existed
    }

    /// Drop every entry and abort every pending expiry. Idempotent.
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        let aborted = slots.abort_timers();
        let dropped = slots.entries.len();
        slots.entries.clear();

        tracing::debug!(entries = dropped, timers = aborted, "identity cache cleared");
    }

    /// `clear`, then refuse further puts. No expiry can fire after this returns.
    pub fn close(&self) {
        self.slots.lock().closed = true;
        self.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.lock().closed
    }

    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expiry tasks scheduled and not yet fired or aborted.
    pub fn pending_timers(&self) -> usize {
        self.slots.lock().timers.len()
    }
}

impl Drop for IdentityCache {
    fn drop(&mut self) {
        self.slots.lock().abort_timers();
    }
}

async fn expire(slots: Weak<Mutex<Slots>>, credential: String, timer_id: u64, ttl: Duration) {
    tokio::time::sleep(ttl).await;

    let Some(slots) = slots.upgrade() else {
        return;
    };
    let mut slots = slots.lock();

    // Aborted concurrently with firing: `clear` already owns the outcome.
    if slots.timers.remove(&timer_id).is_none() {
        return;
    }
    if slots.entries.remove(&credential).is_some() {
        tracing::debug!(credential = %fingerprint(&credential), "cached identity expired");
    }
}
