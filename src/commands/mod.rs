use std::{borrow::Cow, sync::Arc, time::Duration};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    domain::{
        pricing::AmountOverflow, ActivityAction, ActivityEvent, BookingStatus, EntityType,
        InvalidInterval,
    },
    ports::activity::ActivityPort,
};

pub mod amend_booking;
pub mod catalog;
pub mod propose_booking;
pub mod quote_booking;
pub mod report;
mod space_locks;

pub use space_locks::{SpaceGuard, SpaceLocks};

/// Timeouts applied by the domain logic
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a booking command waits for the lock of a space before giving up
    pub lock_timeout: Duration,
    /// How long a mutation waits for the activity sink to store its event
    pub activity_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            activity_timeout: Duration::from_millis(500),
        }
    }
}

pub struct DomainLogic<D, A> {
    database: Arc<D>,
    activity: Arc<A>,
    locks: SpaceLocks,
    config: EngineConfig,
}

impl<D, A> DomainLogic<D, A> {
    pub fn new(database: Arc<D>, activity: Arc<A>, config: EngineConfig) -> Self {
        Self {
            database,
            activity,
            locks: SpaceLocks::default(),
            config,
        }
    }
}

// Manual impl: `derive(Clone)` would require `D: Clone` and `A: Clone`.
impl<D, A> Clone for DomainLogic<D, A> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            activity: self.activity.clone(),
            locks: self.locks.clone(),
            config: self.config,
        }
    }
}

impl<D, A> DomainLogic<D, A>
where
    A: ActivityPort + Send + Sync,
{
    /// Store an activity event without letting the sink affect the caller
    ///
    /// Nothing is recorded without an actor. Errors and timeouts are logged and swallowed.
    pub(crate) async fn record_activity(
        &self,
        actor_id: Option<String>,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: Uuid,
        details: String,
    ) {
        let Some(actor_id) = actor_id else {
            debug!(%entity_type, %entity_id, "no actor, skipping activity event");
            return;
        };
        let event = ActivityEvent {
            actor_id,
            action,
            entity_type,
            entity_id,
            details: Some(details),
        };

        match tokio::time::timeout(self.config.activity_timeout, self.activity.record(event)).await
        {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                warn!(%entity_type, %entity_id, error = %err, "failed to record activity event")
            }
            Err(_) => warn!(%entity_type, %entity_id, "timed out recording activity event"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid interval: {0}")]
    InvalidInterval(#[from] InvalidInterval),

    /// Unknown member, space, booking or payment
    #[error("{entity} {id} does not exist")]
    NotFound { entity: EntityType, id: Uuid },

    /// The requested slot overlaps confirmed bookings of the same space
    #[error("booking conflicts with confirmed bookings {conflicting:?}")]
    BookingConflict { conflicting: Vec<Uuid> },

    #[error("cannot move a booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("invalid state: {0}")]
    InvalidState(Cow<'static, str>),

    /// Time and space of a booking are frozen once a payment for it is marked paid
    #[error("booking {0} is already paid")]
    AlreadyPaid(Uuid),

    #[error("validation error: {0}")]
    Validation(Cow<'static, str>),

    /// Timed out waiting for another operation on the same space
    #[error("space {0} is busy")]
    SpaceBusy(Uuid),

    #[error("storage unavailable: {0:?}")]
    StorageUnavailable(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SpaceBusy(_) | Error::StorageUnavailable(_))
    }
}

impl From<crate::ports::database::Error> for Error {
    fn from(err: crate::ports::database::Error) -> Self {
        use crate::ports::database::Error as DatabaseError;

        match err {
            DatabaseError::NotFound(entity, id) => Error::NotFound { entity, id },
            DatabaseError::Duplicate { field, value } => {
                Error::Validation(format!("{field} '{value}' is already in use").into())
            }
            DatabaseError::Adapter(err) => Error::StorageUnavailable(err),
        }
    }
}

impl From<AmountOverflow> for Error {
    fn from(err: AmountOverflow) -> Self {
        Error::Validation(format!("price {err}; rates or duration too large").into())
    }
}

impl From<crate::ports::activity::Error> for Error {
    fn from(err: crate::ports::activity::Error) -> Self {
        match err {
            crate::ports::activity::Error::Adapter(err) => Error::StorageUnavailable(err),
        }
    }
}
