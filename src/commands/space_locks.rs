use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    sync::{Mutex as AsyncMutex, OwnedMutexGuard},
    time::Instant,
};
use tracing::warn;
use uuid::Uuid;

use super::Error;

/// One async mutex per space
///
/// A booking command holds the lock of every space it reads conflicts from until its write is
/// stored, so two commands on the same space never both see an empty conflict set. Commands on
/// different spaces do not wait on each other.
#[derive(Clone, Debug, Default)]
pub struct SpaceLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

/// Proof that the locks of a set of spaces are held; released on drop
#[derive(Debug)]
pub struct SpaceGuard {
    space_ids: Vec<Uuid>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl SpaceGuard {
    pub fn space_ids(&self) -> &[Uuid] {
        &self.space_ids
    }
}

impl SpaceLocks {
    fn lock_for(&self, space_id: Uuid) -> Arc<AsyncMutex<()>> {
        // The map only holds handles, so a poisoned map is still consistent
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(space_id).or_default().clone()
    }

    /// Lock all `space_ids` within `timeout`
    ///
    /// Locks are taken in ascending id order so that two commands spanning the same pair of
    /// spaces cannot deadlock.
    pub async fn acquire(&self, space_ids: &[Uuid], timeout: Duration) -> Result<SpaceGuard, Error> {
        let mut space_ids = space_ids.to_vec();
        space_ids.sort_unstable();
        space_ids.dedup();

        let deadline = Instant::now() + timeout;
        let mut guards = Vec::with_capacity(space_ids.len());
        for space_id in &space_ids {
            let lock = self.lock_for(*space_id);
            match tokio::time::timeout_at(deadline, lock.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    warn!(%space_id, ?timeout, "timed out waiting for space lock");
                    return Err(Error::SpaceBusy(*space_id));
                }
            }
        }

        Ok(SpaceGuard {
            space_ids,
            _guards: guards,
        })
    }
}
