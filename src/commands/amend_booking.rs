use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use tower::Service;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    domain::{
        pricing, ActivityAction, Booking, BookingStatus, BookingType, EntityType, Interval,
        PaymentStatus,
    },
    ports::{activity::ActivityPort, database::DatabasePort},
};

use super::{DomainLogic, Error, SpaceGuard};

/// How often an amend re-reads a booking that moved to another space while it waited for a lock
const MAX_LOCK_ATTEMPTS: usize = 3;

/// Partial update of a booking; `None` leaves a field as it is
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingChanges {
    pub space_id: Option<Uuid>,
    pub member_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub booking_type: Option<BookingType>,
    pub status: Option<BookingStatus>,
    /// `Some(None)` clears the notes
    pub notes: Option<Option<String>>,
}

#[derive(Clone, Debug)]
pub struct AmendBookingRequest {
    pub actor_id: Option<String>,
    pub booking_id: Uuid,
    pub changes: BookingChanges,
}

impl AmendBookingRequest {
    pub fn cancel(booking_id: Uuid, actor_id: Option<String>) -> Self {
        Self::with_status(booking_id, actor_id, BookingStatus::Cancelled)
    }

    pub fn complete(booking_id: Uuid, actor_id: Option<String>) -> Self {
        Self::with_status(booking_id, actor_id, BookingStatus::Completed)
    }

    fn with_status(booking_id: Uuid, actor_id: Option<String>, status: BookingStatus) -> Self {
        Self {
            actor_id,
            booking_id,
            changes: BookingChanges {
                status: Some(status),
                ..BookingChanges::default()
            },
        }
    }
}

impl<D, A> Service<AmendBookingRequest> for DomainLogic<D, A>
where
    D: DatabasePort + Send + Sync + 'static,
    A: ActivityPort + Send + Sync + 'static,
{
    type Response = Booking;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: AmendBookingRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.amend_booking(req).await })
    }
}

impl<D, A> DomainLogic<D, A>
where
    D: DatabasePort + Send + Sync,
    A: ActivityPort + Send + Sync,
{
    /// Apply `changes` to a booking
    ///
    /// A booking that stays confirmed but moves in time or to another space is admitted again
    /// against the other confirmed bookings of its target space. Nothing is written on rejection.
    pub async fn amend_booking(&self, req: AmendBookingRequest) -> Result<Booking, Error> {
        let changes = &req.changes;
        if let Some(space_id) = changes.space_id {
            self.database.get_space(space_id).await?;
        }
        if let Some(member_id) = changes.member_id {
            self.database.get_member(member_id).await?;
        }

        let (current, guard) = self.lock_booking(req.booking_id, changes.space_id).await?;
        let mut next = merge(&current, changes)?;

        let schedule_changed =
            next.space_id != current.space_id || next.interval != current.interval;
        if schedule_changed {
            let payments = self
                .database
                .list_payments_for_booking(current.booking_id)
                .await?;
            if payments
                .iter()
                .any(|p| p.payment_status == PaymentStatus::Paid)
            {
                return Err(Error::AlreadyPaid(current.booking_id));
            }
        }

        // Leaving `Confirmed` only releases the slot, so it never needs an admission check
        if schedule_changed && next.is_confirmed() {
            let conflicts = self
                .database
                .find_conflicting_bookings(next.space_id, next.interval, Some(next.booking_id))
                .await?;
            if !conflicts.is_empty() {
                let conflicting: Vec<Uuid> = conflicts.iter().map(|b| b.booking_id).collect();
                debug!(booking_id = %next.booking_id, ?conflicting, "rejected booking amendment");
                return Err(Error::BookingConflict { conflicting });
            }
        }

        if schedule_changed || next.booking_type != current.booking_type {
            let space = self.database.get_space(next.space_id).await?;
            next.total_amount =
                pricing::price_interval(&space.rate_card, next.booking_type, &next.interval)?;
        }
        next.updated_at = Utc::now();

        let booking = self.database.update_booking(next).await?;
        drop(guard);

        info!(
            booking_id = %booking.booking_id,
            status = %booking.status,
            "booking updated"
        );
        self.record_activity(
            req.actor_id,
            ActivityAction::Update,
            EntityType::Booking,
            booking.booking_id,
            format!(
                "Updated booking #{} - Status: {}",
                booking.booking_id, booking.status
            ),
        )
        .await;

        Ok(booking)
    }

    /// Shorthand for an amendment to `Cancelled`
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        actor_id: Option<String>,
    ) -> Result<Booking, Error> {
        self.amend_booking(AmendBookingRequest::cancel(booking_id, actor_id))
            .await
    }

    /// Load a booking while holding the locks of its current space and of `target_space`
    ///
    /// The space of a booking only changes under its lock, so once the re-read after locking
    /// matches the first read, the returned booking is current until the guard drops.
    pub(super) async fn lock_booking(
        &self,
        booking_id: Uuid,
        target_space: Option<Uuid>,
    ) -> Result<(Booking, SpaceGuard), Error> {
        let mut seen = self.database.get_booking(booking_id).await?;
        for _ in 0..MAX_LOCK_ATTEMPTS {
            let spaces: Vec<Uuid> = std::iter::once(seen.space_id).chain(target_space).collect();
            let guard = self
                .locks
                .acquire(&spaces, self.config.lock_timeout)
                .await?;
            let current = self.database.get_booking(booking_id).await?;
            if current.space_id == seen.space_id {
                return Ok((current, guard));
            }
            seen = current;
        }
        Err(Error::SpaceBusy(seen.space_id))
    }
}

/// Booking as it would look after `changes`, with lifecycle and interval rules checked
fn merge(current: &Booking, changes: &BookingChanges) -> Result<Booking, Error> {
    let status = changes.status.unwrap_or(current.status);
    if !current.status.can_transition_to(status) {
        return Err(Error::InvalidTransition {
            from: current.status,
            to: status,
        });
    }

    let interval = Interval::new(
        changes.start_time.unwrap_or(current.interval.start()),
        changes.end_time.unwrap_or(current.interval.end()),
    )?;

    let next = Booking {
        space_id: changes.space_id.unwrap_or(current.space_id),
        member_id: changes.member_id.unwrap_or(current.member_id),
        interval,
        booking_type: changes.booking_type.unwrap_or(current.booking_type),
        status,
        notes: changes.notes.clone().unwrap_or_else(|| current.notes.clone()),
        ..current.clone()
    };

    let frozen_fields_changed = next.space_id != current.space_id
        || next.member_id != current.member_id
        || next.interval != current.interval
        || next.booking_type != current.booking_type;
    if current.status.is_terminal() && frozen_fields_changed {
        return Err(Error::InvalidState(
            format!(
                "booking {} is {}; only its notes can change",
                current.booking_id, current.status
            )
            .into(),
        ));
    }

    Ok(next)
}
