//! Deterministic object identity and the id <-> handle registry
//!
//! World objects carry no stable identifier of their own. Every participant
//! derives one from the object's spawn transform, so two processes that spawn
//! the same object agree on its id without talking to each other. The server
//! may later hand out a canonical id, which is adopted through
//! [`IdentityRegistry::reassign`].
//!
//! The registry keeps two views behind one mutex:
//! - the lookup index, id -> handle of the live object currently holding it
//! - the attachment, handle -> id the object believes it owns
//!
//! The two can disagree after a collision: the displaced object keeps its
//! attached id, but the index points at the newcomer. A later unregister from
//! the displaced object is then a no-op.

use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Length of every id produced by [`derive_id`].
pub const ID_LENGTH: usize = 64;

/// Hashes a spatial signature into a 64 character uppercase hex id.
pub fn derive_id(signature: &str) -> String {
    let digest = Sha256::digest(signature.as_bytes());
    hex::encode_upper(digest)
}

/// Result of [`IdentityRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome<H> {
    /// Empty id, nothing stored
    Ignored,
    /// The id already pointed at this handle
    Unchanged,
    Inserted,
    /// Last write wins: the id moved away from `previous`
    Replaced { previous: H },
}

/// Result of [`IdentityRegistry::unregister`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnregisterOutcome<H> {
    Ignored,
    Removed,
    /// The id is held by another handle and was left alone
    NotHeld { holder: H },
    Missing,
}

#[derive(Debug)]
struct Entries<H> {
    by_id: HashMap<String, H>,
    attached: HashMap<H, String>,
}

impl<H: Copy + Eq + Hash + Debug> Entries<H> {
    fn register(&mut self, id: &str, handle: H) -> RegisterOutcome<H> {
        if id.is_empty() {
            return RegisterOutcome::Ignored;
        }

        match self.by_id.insert(id.to_string(), handle) {
            None => RegisterOutcome::Inserted,
            Some(previous) if previous == handle => RegisterOutcome::Unchanged,
            Some(previous) => {
                info!(
                    "Identity {} moved from {:?} to {:?}",
                    id, previous, handle
                );
                RegisterOutcome::Replaced { previous }
            }
        }
    }

    fn unregister(&mut self, id: &str, handle: H) -> UnregisterOutcome<H> {
        if id.is_empty() {
            return UnregisterOutcome::Ignored;
        }

        match self.by_id.get(id).copied() {
            Some(holder) if holder == handle => {
                self.by_id.remove(id);
                UnregisterOutcome::Removed
            }
            Some(holder) => {
                debug!(
                    "Skipping unregister of {} by {:?}, held by {:?}",
                    id, handle, holder
                );
                UnregisterOutcome::NotHeld { holder }
            }
            None => {
                warn!(
                    "Unregistering identity {} failed because it is not registered",
                    id
                );
                UnregisterOutcome::Missing
            }
        }
    }
}

/// Session-scoped registry mapping ids to live object handles
///
/// `H` is whatever cheap handle the owning world uses to address its objects.
/// All operations take `&self` and serialize on a single internal mutex.
#[derive(Debug)]
pub struct IdentityRegistry<H> {
    entries: Mutex<Entries<H>>,
}

impl<H: Copy + Eq + Hash + Debug> Default for IdentityRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy + Eq + Hash + Debug> IdentityRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                by_id: HashMap::new(),
                attached: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries<H>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Points `id` at `handle`, replacing any other holder.
    pub fn register(&self, id: &str, handle: H) -> RegisterOutcome<H> {
        self.lock().register(id, handle)
    }

    /// Removes `id` only if `handle` is its current holder.
    pub fn unregister(&self, id: &str, handle: H) -> UnregisterOutcome<H> {
        self.lock().unregister(id, handle)
    }

    pub fn resolve(&self, id: &str) -> Option<H> {
        if id.is_empty() {
            return None;
        }
        self.lock().by_id.get(id).copied()
    }

    /// Id attached to `handle`, whether or not it still holds it in the index.
    pub fn id_of(&self, handle: H) -> Option<String> {
        self.lock().attached.get(&handle).cloned()
    }

    /// Returns the id attached to `handle`, deriving and registering one from
    /// `signature` the first time the handle is seen.
    pub fn get_or_create(&self, handle: H, signature: &str) -> String {
        let mut entries = self.lock();
        if let Some(id) = entries.attached.get(&handle) {
            return id.clone();
        }

        let id = derive_id(signature);
        entries.attached.insert(handle, id.clone());
        entries.register(&id, handle);
        id
    }

    /// Moves `handle` to `new_id`. Returns false when nothing changed.
    pub fn reassign(&self, handle: H, new_id: &str) -> bool {
        if new_id.is_empty() {
            return false;
        }

        let mut entries = self.lock();
        let current = entries.attached.get(&handle).cloned();
        if current.as_deref() == Some(new_id) {
            return false;
        }

        if let Some(current) = &current {
            entries.unregister(current, handle);
        }
        entries.attached.insert(handle, new_id.to_string());
        entries.register(new_id, handle);

        debug!(
            "Reassigned {:?} from {} to {}",
            handle,
            current.as_deref().unwrap_or("<none>"),
            new_id
        );
        true
    }

    /// Drops the identity of a destroyed object.
    pub fn detach(&self, handle: H) -> Option<String> {
        let mut entries = self.lock();
        let id = entries.attached.remove(&handle)?;
        entries.unregister(&id, handle);
        Some(id)
    }

    /// Snapshot of every handle currently reachable through the index.
    pub fn all(&self) -> Vec<H> {
        self.lock().by_id.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().by_id.is_empty()
    }
}
