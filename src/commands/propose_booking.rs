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
    domain::{pricing, ActivityAction, Booking, BookingStatus, BookingType, EntityType, Interval},
    ports::{
        activity::ActivityPort,
        database::{self, DatabasePort},
    },
};

use super::{DomainLogic, Error};

#[derive(Clone, Debug)]
pub struct ProposeBookingRequest {
    /// Who is asking; `None` skips the activity event
    pub actor_id: Option<String>,
    pub space_id: Uuid,
    pub member_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub booking_type: BookingType,
    pub notes: Option<String>,
    /// Idempotency key for safe client retries
    ///
    /// A second request with the same key returns the booking created by the first one.
    pub request_key: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ProposeBookingResponse {
    pub booking: Booking,
    /// `true` when the booking was created by an earlier request with the same key
    pub replayed: bool,
}

impl<D, A> Service<ProposeBookingRequest> for DomainLogic<D, A>
where
    D: DatabasePort + Send + Sync + 'static,
    A: ActivityPort + Send + Sync + 'static,
{
    type Response = ProposeBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ProposeBookingRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.propose_booking(req).await })
    }
}

impl<D, A> DomainLogic<D, A>
where
    D: DatabasePort + Send + Sync,
    A: ActivityPort + Send + Sync,
{
    /// Admit a new booking if its space is free over the whole interval
    pub async fn propose_booking(
        &self,
        req: ProposeBookingRequest,
    ) -> Result<ProposeBookingResponse, Error> {
        let interval = Interval::new(req.start_time, req.end_time)?;
        let member = self.database.get_member(req.member_id).await?;
        let space = self.database.get_space(req.space_id).await?;

        let guard = self
            .locks
            .acquire(&[space.space_id], self.config.lock_timeout)
            .await?;

        if let Some(key) = &req.request_key {
            if let Some(existing) = self
                .database
                .find_booking_by_request_key(key.clone())
                .await?
            {
                return replay(existing, &req, interval);
            }
        }

        let conflicts = self
            .database
            .find_conflicting_bookings(space.space_id, interval, None)
            .await?;
        if !conflicts.is_empty() {
            let conflicting: Vec<Uuid> = conflicts.iter().map(|b| b.booking_id).collect();
            debug!(space_id = %space.space_id, ?conflicting, "rejected overlapping booking");
            return Err(Error::BookingConflict { conflicting });
        }

        let now = Utc::now();
        let booking = Booking {
            booking_id: Uuid::new_v4(),
            space_id: space.space_id,
            member_id: member.member_id,
            interval,
            booking_type: req.booking_type,
            total_amount: pricing::price_interval(&space.rate_card, req.booking_type, &interval)?,
            status: BookingStatus::Confirmed,
            notes: req.notes.clone(),
            request_key: req.request_key.clone(),
            created_at: now,
            updated_at: now,
        };
        let booking = match self.database.create_booking(booking).await {
            Ok(booking) => booking,
            // Same key raced in through another space's lock
            Err(database::Error::Duplicate { .. }) if req.request_key.is_some() => {
                let key = req.request_key.clone().unwrap_or_default();
                match self.database.find_booking_by_request_key(key).await? {
                    Some(existing) => return replay(existing, &req, interval),
                    None => return Err(Error::StorageUnavailable("request key vanished".into())),
                }
            }
            Err(err) => return Err(err.into()),
        };
        drop(guard);

        info!(
            booking_id = %booking.booking_id,
            space_id = %booking.space_id,
            total_amount = %booking.total_amount,
            "booking confirmed"
        );
        self.record_activity(
            req.actor_id,
            ActivityAction::Create,
            EntityType::Booking,
            booking.booking_id,
            format!(
                "Created booking #{} for space {}",
                booking.booking_id, booking.space_id
            ),
        )
        .await;

        Ok(ProposeBookingResponse {
            booking,
            replayed: false,
        })
    }
}

/// Answer a retried request with the booking its key already created
fn replay(
    existing: Booking,
    req: &ProposeBookingRequest,
    interval: Interval,
) -> Result<ProposeBookingResponse, Error> {
    let same_request = existing.space_id == req.space_id
        && existing.member_id == req.member_id
        && existing.interval == interval
        && existing.booking_type == req.booking_type;
    if !same_request {
        return Err(Error::Validation(
            "request key was already used for a different booking".into(),
        ));
    }

    debug!(booking_id = %existing.booking_id, "replaying booking for known request key");
    Ok(ProposeBookingResponse {
        booking: existing,
        replayed: true,
    })
}
