use crate::{
    domain::{ActivityEvent, ActivityLog},
    ports::activity::{ActivityPort, Error},
};
use chrono::Utc;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

/// Number of entries kept when no capacity is given
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded in-memory activity log
///
/// Once `capacity` entries are stored, the oldest entry is dropped for each new one.
#[derive(Clone, Debug)]
pub struct MemoryActivityLog {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    next_id: u64,
    entries: VecDeque<ActivityLog>,
}

impl MemoryActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity: capacity.max(1),
                next_id: 1,
                entries: VecDeque::new(),
            })),
        }
    }
}

impl Default for MemoryActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

#[async_trait::async_trait]
impl ActivityPort for MemoryActivityLog {
    async fn record(&self, event: ActivityEvent) -> Result<ActivityLog, Error> {
        let mut inner = self.inner.lock()?;
        let entry = ActivityLog {
            id: inner.next_id,
            actor_id: event.actor_id,
            action: event.action,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            details: event.details,
            timestamp: Utc::now(),
        };
        inner.next_id += 1;
        if inner.entries.len() == inner.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry.clone());
        Ok(entry)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityLog>, Error> {
        let inner = self.inner.lock()?;
        Ok(inner.entries.iter().rev().take(limit).cloned().collect())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}
