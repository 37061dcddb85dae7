//! In-flight request coalescing.
//!
//! At most one fetch per request key is outstanding at any time. The first
//! caller for a key becomes the *leader* and performs the fetch; callers
//! arriving while it is in flight become *followers* and wait for the
//! leader's outcome, which is delivered to each of them exactly once.
//!
//! ```text
//!  Absent ──join_or_lead──▶ Pending(waiters) ──resolve──▶ Absent
//!                              ▲        │
//!                              └─join───┘ (follower queued)
//! ```

use crate::types::Response;
use crate::Error;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

/// What every waiter on a key receives.
pub type Outcome = std::result::Result<Response, Error>;

#[derive(Default)]
struct PendingGroup {
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Role assigned by [`DedupCoordinator::join_or_lead`].
#[derive(Debug)]
pub enum Role {
    Leader,
    Follower(Follower),
}

/// Handle a follower awaits for the leader's outcome.
#[derive(Debug)]
pub struct Follower {
    key: String,
    rx: oneshot::Receiver<Outcome>,
}

impl Follower {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn wait(self) -> Outcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            // Sender dropped without a send: the group was torn down unresolved.
            Err(_) => Err(Error::Cancelled { key: self.key }),
        }
    }
}

/// Per-key pending groups behind a single mutex.
///
/// The lock is never held across an `.await`, so the existence check and
/// the insert in [`join_or_lead`](Self::join_or_lead) are one indivisible step.
#[derive(Default)]
pub struct DedupCoordinator {
    groups: Mutex<HashMap<String, PendingGroup>>,
}

impl DedupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn groups(&self) -> MutexGuard<'_, HashMap<String, PendingGroup>> {
        // Every critical section leaves the map consistent, so a poisoned
        // lock is still safe to use.
        self.groups.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn join_or_lead(&self, key: &str) -> Role {
        let mut groups = self.groups();
        match groups.entry(key.to_string()) {
            Entry::Occupied(mut group) => {
                let (tx, rx) = oneshot::channel();
                group.get_mut().waiters.push(tx);
                Role::Follower(Follower {
                    key: key.to_string(),
                    rx,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingGroup::default());
                Role::Leader
            }
        }
    }

    /// Remove the group for `key` and deliver `outcome` to each waiter.
    /// Returns the number of followers notified; 0 if no group existed.
    pub fn resolve(&self, key: &str, outcome: Outcome) -> usize {
        let Some(group) = self.groups().remove(key) else {
            return 0;
        };
        let notified = group.waiters.len();
        for tx in group.waiters {
            // A follower that gave up waiting is not an error.
            let _ = tx.send(outcome.clone());
        }
        if notified > 0 {
            tracing::debug!(key, followers = notified, "fanned out shared outcome");
        }
        notified
    }

    pub fn resolve_success(&self, key: &str, response: Response) -> usize {
        self.resolve(key, Ok(response))
    }

    pub fn resolve_failure(&self, key: &str, error: Error) -> usize {
        self.resolve(key, Err(error))
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.groups().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.groups().len()
    }

    pub fn waiter_count(&self, key: &str) -> usize {
        self.groups().get(key).map(|g| g.waiters.len()).unwrap_or(0)
    }
}

/// Leadership of one pending group.
///
/// Consumed by exactly one of [`succeed`](Self::succeed) or
/// [`fail`](Self::fail). Dropping it unresolved (e.g. the leader's future
/// was cancelled) fails the group with [`Error::Cancelled`] so followers
/// never wait forever.
#[derive(Debug)]
pub struct LeaderTicket {
    coordinator: Arc<DedupCoordinator>,
    key: String,
    resolved: bool,
}

impl LeaderTicket {
    pub(crate) fn new(coordinator: Arc<DedupCoordinator>, key: impl Into<String>) -> Self {
        Self {
            coordinator,
            key: key.into(),
            resolved: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn succeed(mut self, response: Response) -> usize {
        self.resolved = true;
        self.coordinator.resolve_success(&self.key, response)
    }

    pub fn fail(mut self, error: Error) -> usize {
        self.resolved = true;
        self.coordinator.resolve_failure(&self.key, error)
    }
}

impl Drop for LeaderTicket {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::debug!(key = %self.key, "leader dropped before resolving");
            let key = std::mem::take(&mut self.key);
            self.coordinator
                .resolve_failure(&key, Error::Cancelled { key: key.clone() });
        }
    }
}

impl std::fmt::Debug for DedupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCoordinator")
            .field("pending", &self.pending_count())
            .finish()
    }
}
