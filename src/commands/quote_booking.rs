use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{pricing, BookingType, Interval},
    ports::{activity::ActivityPort, database::DatabasePort},
};

use super::{DomainLogic, Error};

/// Price a prospective booking without reserving anything
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBookingRequest {
    pub space_id: Uuid,
    pub booking_type: BookingType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBookingResponse {
    pub space_id: Uuid,
    pub booking_type: BookingType,
    #[serde(flatten)]
    pub interval: Interval,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_amount: Decimal,
}

impl<D, A> Service<QuoteBookingRequest> for DomainLogic<D, A>
where
    D: DatabasePort + Send + Sync + 'static,
    A: ActivityPort + Send + Sync + 'static,
{
    type Response = QuoteBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: QuoteBookingRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.quote_booking(req).await })
    }
}

impl<D, A> DomainLogic<D, A>
where
    D: DatabasePort + Send + Sync,
{
    pub async fn quote_booking(
        &self,
        req: QuoteBookingRequest,
    ) -> Result<QuoteBookingResponse, Error> {
        let interval = Interval::new(req.start_time, req.end_time)?;
        let space = self.database.get_space(req.space_id).await?;
        let total_amount = pricing::price_interval(&space.rate_card, req.booking_type, &interval)?;

        Ok(QuoteBookingResponse {
            space_id: space.space_id,
            booking_type: req.booking_type,
            interval,
            total_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commands::test_support::{at, seeded},
        domain::EntityType,
    };
    use chrono::Duration;
    use rstest::*;
    use rust_decimal_macros::dec;
    use speculoos::prelude::*;
    use tower::{BoxError, ServiceExt};

    #[rstest]
    #[case(BookingType::Hourly, Duration::hours(2), dec!(20.00))]
    #[case(BookingType::Daily, Duration::hours(25), dec!(160.00))]
    #[tokio::test]
    async fn test_call(
        #[case] booking_type: BookingType,
        #[case] length: Duration,
        #[case] expected: Decimal,
    ) -> Result<(), BoxError> {
        // GIVEN a space at $10/h and $80/day
        let (mut logic, _, space) = seeded().await;

        // WHEN quoting
        let res = ServiceExt::<QuoteBookingRequest>::ready(&mut logic)
            .await?
            .call(QuoteBookingRequest {
                space_id: space.space_id,
                booking_type,
                start_time: at(8, 0),
                end_time: at(8, 0) + length,
            })
            .await?;

        // THEN the amount follows the rate card and nothing is booked
        assert_that!(res.total_amount).is_equal_to(expected);
        assert_that!(logic.database().list_bookings().await?).has_length(0);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_space() {
        let (logic, _, _) = seeded().await;

        let res = logic
            .quote_booking(QuoteBookingRequest {
                space_id: Uuid::new_v4(),
                booking_type: BookingType::Hourly,
                start_time: at(8, 0),
                end_time: at(9, 0),
            })
            .await;

        assert_that!(res).is_err().matches(|err| {
            matches!(err, Error::NotFound { entity: EntityType::Space, .. })
        });
    }

    #[tokio::test]
    async fn test_invalid_interval() {
        let (logic, _, space) = seeded().await;

        let res = logic
            .quote_booking(QuoteBookingRequest {
                space_id: space.space_id,
                booking_type: BookingType::Hourly,
                start_time: at(9, 0),
                end_time: at(8, 0),
            })
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::InvalidInterval(_)));
    }

    #[rstest]
    #[case(BookingType::Hourly)]
    #[case(BookingType::Daily)]
    #[tokio::test]
    async fn test_rate_overflow(#[case] booking_type: BookingType) {
        // GIVEN a space stored with rates no validation would accept
        let (logic, _, mut space) = seeded().await;
        space.rate_card.hourly_rate = Decimal::MAX;
        space.rate_card.daily_rate = Decimal::MAX;
        logic.database().update_space(space.clone()).await.unwrap();

        // WHEN quoting thirty days, on a separate task
        let res = tokio::spawn(async move {
            logic
                .quote_booking(QuoteBookingRequest {
                    space_id: space.space_id,
                    booking_type,
                    start_time: at(8, 0),
                    end_time: at(8, 0) + Duration::days(30),
                })
                .await
        })
        .await;

        // THEN it is refused rather than panicking
        assert_that!(res)
            .is_ok()
            .is_err()
            .matches(|err| matches!(err, Error::Validation(_)));
    }
}
