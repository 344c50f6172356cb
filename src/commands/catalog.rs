//! Members, spaces and payments.
//!
//! Plain create/read/update operations. Every successful write emits an activity event the same
//! way booking commands do.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::{
        pricing, ActivityAction, ActivityLog, Booking, EntityType, Member, MembershipType, Payment,
        PaymentMethod, PaymentStatus, RateCard, Space, SpaceKind, SpaceStatus,
    },
    ports::{activity::ActivityPort, database::DatabasePort},
};

use super::{DomainLogic, Error};

/// Number of activity entries returned when the caller gives no limit
pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;
/// Upper bound on the number of activity entries returned at once
pub const MAX_ACTIVITY_LIMIT: usize = 500;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub membership_type: MembershipType,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub membership_type: Option<MembershipType>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSpace {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SpaceKind,
    pub capacity: u32,
    pub hourly_rate: Decimal,
    pub daily_rate: Decimal,
    #[serde(default)]
    pub status: Option<SpaceStatus>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceChanges {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<SpaceKind>,
    pub capacity: Option<u32>,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub status: Option<SpaceStatus>,
    pub description: Option<String>,
    pub amenities: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChanges {
    pub amount: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

fn validate_member(member: &Member) -> Result<(), Error> {
    if member.full_name.trim().chars().count() < 2 {
        return Err(Error::Validation(
            "name must be at least 2 characters".into(),
        ));
    }
    if !member.email.contains('@') {
        return Err(Error::Validation("invalid email address".into()));
    }
    if member.phone.trim().chars().count() < 10 {
        return Err(Error::Validation(
            "phone number must be at least 10 digits".into(),
        ));
    }
    Ok(())
}

fn validate_space(space: &Space) -> Result<(), Error> {
    if space.name.trim().chars().count() < 2 {
        return Err(Error::Validation(
            "space name must be at least 2 characters".into(),
        ));
    }
    if space.capacity < 1 {
        return Err(Error::Validation("capacity must be at least 1".into()));
    }
    if !space.rate_card.is_valid() {
        return Err(Error::Validation(
            format!("rates must be positive and at most {}", pricing::MAX_AMOUNT).into(),
        ));
    }
    Ok(())
}

fn validate_payment(payment: &Payment) -> Result<(), Error> {
    if payment.amount <= Decimal::ZERO {
        return Err(Error::Validation("amount must be a positive number".into()));
    }
    if payment.amount > pricing::MAX_AMOUNT {
        return Err(Error::Validation(
            format!("amount must be at most {}", pricing::MAX_AMOUNT).into(),
        ));
    }
    Ok(())
}

/// Stamp the payment date when a payment becomes paid without one
fn stamp_paid(payment: &mut Payment, now: DateTime<Utc>) {
    if payment.payment_status == PaymentStatus::Paid && payment.payment_date.is_none() {
        payment.payment_date = Some(now);
    }
}

impl<D, A> DomainLogic<D, A>
where
    D: DatabasePort + Send + Sync,
    A: ActivityPort + Send + Sync,
{
    pub async fn get_member(&self, member_id: Uuid) -> Result<Member, Error> {
        Ok(self.database.get_member(member_id).await?)
    }

    pub async fn list_members(&self) -> Result<Vec<Member>, Error> {
        Ok(self.database.list_members().await?)
    }

    pub async fn create_member(
        &self,
        actor_id: Option<String>,
        new: NewMember,
    ) -> Result<Member, Error> {
        let now = Utc::now();
        let member = Member {
            member_id: Uuid::new_v4(),
            full_name: new.full_name,
            email: new.email,
            phone: new.phone,
            membership_type: new.membership_type,
            is_active: new.is_active.unwrap_or(true),
            joined_date: now,
            created_at: now,
            updated_at: now,
        };
        validate_member(&member)?;

        let member = self.database.create_member(member).await?;
        info!(member_id = %member.member_id, "member created");
        self.record_activity(
            actor_id,
            ActivityAction::Create,
            EntityType::Member,
            member.member_id,
            format!("Created member: {}", member.full_name),
        )
        .await;
        Ok(member)
    }

    pub async fn update_member(
        &self,
        actor_id: Option<String>,
        member_id: Uuid,
        changes: MemberChanges,
    ) -> Result<Member, Error> {
        let current = self.database.get_member(member_id).await?;
        let member = Member {
            full_name: changes.full_name.unwrap_or(current.full_name),
            email: changes.email.unwrap_or(current.email),
            phone: changes.phone.unwrap_or(current.phone),
            membership_type: changes.membership_type.unwrap_or(current.membership_type),
            is_active: changes.is_active.unwrap_or(current.is_active),
            updated_at: Utc::now(),
            ..current
        };
        validate_member(&member)?;

        let member = self.database.update_member(member).await?;
        self.record_activity(
            actor_id,
            ActivityAction::Update,
            EntityType::Member,
            member.member_id,
            format!("Updated member: {}", member.full_name),
        )
        .await;
        Ok(member)
    }

    pub async fn get_space(&self, space_id: Uuid) -> Result<Space, Error> {
        Ok(self.database.get_space(space_id).await?)
    }

    pub async fn list_spaces(&self) -> Result<Vec<Space>, Error> {
        Ok(self.database.list_spaces().await?)
    }

    pub async fn create_space(
        &self,
        actor_id: Option<String>,
        new: NewSpace,
    ) -> Result<Space, Error> {
        let now = Utc::now();
        let space = Space {
            space_id: Uuid::new_v4(),
            name: new.name,
            kind: new.kind,
            capacity: new.capacity,
            rate_card: RateCard {
                hourly_rate: new.hourly_rate,
                daily_rate: new.daily_rate,
            },
            status: new.status.unwrap_or(SpaceStatus::Available),
            description: new.description,
            amenities: new.amenities,
            created_at: now,
            updated_at: now,
        };
        validate_space(&space)?;

        let space = self.database.create_space(space).await?;
        info!(space_id = %space.space_id, "space created");
        self.record_activity(
            actor_id,
            ActivityAction::Create,
            EntityType::Space,
            space.space_id,
            format!("Created space: {}", space.name),
        )
        .await;
        Ok(space)
    }

    /// Update a space
    ///
    /// New rates only apply to bookings priced after the change.
    pub async fn update_space(
        &self,
        actor_id: Option<String>,
        space_id: Uuid,
        changes: SpaceChanges,
    ) -> Result<Space, Error> {
        let current = self.database.get_space(space_id).await?;
        let space = Space {
            name: changes.name.unwrap_or(current.name),
            kind: changes.kind.unwrap_or(current.kind),
            capacity: changes.capacity.unwrap_or(current.capacity),
            rate_card: RateCard {
                hourly_rate: changes
                    .hourly_rate
                    .unwrap_or(current.rate_card.hourly_rate),
                daily_rate: changes.daily_rate.unwrap_or(current.rate_card.daily_rate),
            },
            status: changes.status.unwrap_or(current.status),
            description: changes.description.or(current.description),
            amenities: changes.amenities.unwrap_or(current.amenities),
            updated_at: Utc::now(),
            ..current
        };
        validate_space(&space)?;

        let space = self.database.update_space(space).await?;
        self.record_activity(
            actor_id,
            ActivityAction::Update,
            EntityType::Space,
            space.space_id,
            format!("Updated space: {}", space.name),
        )
        .await;
        Ok(space)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, Error> {
        Ok(self.database.get_booking(booking_id).await?)
    }

    pub async fn list_bookings(&self) -> Result<Vec<Booking>, Error> {
        Ok(self.database.list_bookings().await?)
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Payment, Error> {
        Ok(self.database.get_payment(payment_id).await?)
    }

    pub async fn list_payments(&self) -> Result<Vec<Payment>, Error> {
        Ok(self.database.list_payments().await?)
    }

    /// Record a payment while holding the lock of the booking's space
    ///
    /// A paid payment freezes the schedule of its booking, so it is serialized with amendments.
    pub async fn record_payment(
        &self,
        actor_id: Option<String>,
        new: NewPayment,
    ) -> Result<Payment, Error> {
        let (booking, guard) = self.lock_booking(new.booking_id, None).await?;
        let now = Utc::now();
        let mut payment = Payment {
            payment_id: Uuid::new_v4(),
            booking_id: booking.booking_id,
            amount: new.amount,
            payment_method: new.payment_method,
            payment_status: new.payment_status.unwrap_or(PaymentStatus::Pending),
            payment_date: new.payment_date,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        validate_payment(&payment)?;
        stamp_paid(&mut payment, now);

        let payment = self.database.create_payment(payment).await?;
        drop(guard);

        info!(
            payment_id = %payment.payment_id,
            booking_id = %payment.booking_id,
            amount = %payment.amount,
            "payment recorded"
        );
        self.record_activity(
            actor_id,
            ActivityAction::Create,
            EntityType::Payment,
            payment.payment_id,
            format!(
                "Recorded payment of ${} for booking #{}",
                payment.amount, payment.booking_id
            ),
        )
        .await;
        Ok(payment)
    }

    pub async fn update_payment(
        &self,
        actor_id: Option<String>,
        payment_id: Uuid,
        changes: PaymentChanges,
    ) -> Result<Payment, Error> {
        let seen = self.database.get_payment(payment_id).await?;
        let (_, guard) = self.lock_booking(seen.booking_id, None).await?;
        let current = self.database.get_payment(payment_id).await?;
        let now = Utc::now();
        let mut payment = Payment {
            amount: changes.amount.unwrap_or(current.amount),
            payment_method: changes.payment_method.unwrap_or(current.payment_method),
            payment_status: changes.payment_status.unwrap_or(current.payment_status),
            payment_date: changes.payment_date.or(current.payment_date),
            notes: changes.notes.or(current.notes),
            updated_at: now,
            ..current
        };
        validate_payment(&payment)?;
        stamp_paid(&mut payment, now);

        let payment = self.database.update_payment(payment).await?;
        drop(guard);

        self.record_activity(
            actor_id,
            ActivityAction::Update,
            EntityType::Payment,
            payment.payment_id,
            format!(
                "Updated payment #{} - Status: {}",
                payment.payment_id, payment.payment_status
            ),
        )
        .await;
        Ok(payment)
    }

    /// Most recent activity first, `limit` capped at [`MAX_ACTIVITY_LIMIT`]
    pub async fn recent_activity(&self, limit: Option<usize>) -> Result<Vec<ActivityLog>, Error> {
        let limit = limit
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
            .min(MAX_ACTIVITY_LIMIT);
        Ok(self.activity.recent(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::propose_booking::ProposeBookingRequest;
    use crate::commands::test_support::{at, seeded, MemoryLogic, ACTOR};
    use crate::domain::BookingType;
    use std::time::Duration;
    use rstest::*;
    use rust_decimal_macros::dec;
    use speculoos::prelude::*;

    fn new_member(email: &str) -> NewMember {
        NewMember {
            full_name: "Grace Hopper".to_string(),
            email: email.to_string(),
            phone: "5550001111".to_string(),
            membership_type: MembershipType::Annual,
            is_active: None,
        }
    }

    fn new_space() -> NewSpace {
        NewSpace {
            name: "Hot desk 3".to_string(),
            kind: SpaceKind::Desk,
            capacity: 1,
            hourly_rate: dec!(4.50),
            daily_rate: dec!(25),
            status: None,
            description: None,
            amenities: vec!["monitor".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_and_update_member() {
        let (logic, _, _) = seeded().await;

        let member = logic
            .create_member(Some(ACTOR.to_string()), new_member("grace@example.com"))
            .await
            .unwrap();
        assert_that!(member.is_active).is_true();

        let updated = logic
            .update_member(
                Some(ACTOR.to_string()),
                member.member_id,
                MemberChanges {
                    is_active: Some(false),
                    ..MemberChanges::default()
                },
            )
            .await;
        assert_that!(updated)
            .is_ok()
            .matches(|m| !m.is_active && m.email == "grace@example.com");

        let logs = logic.recent_activity(None).await.unwrap();
        assert_that!(logs).matches(|logs| {
            logs.len() == 2
                && logs[0].action == ActivityAction::Update
                && logs[1].action == ActivityAction::Create
                && logs[1].details.as_deref() == Some("Created member: Grace Hopper")
        });
    }

    #[rstest]
    #[case(NewMember { full_name: "G".to_string(), ..new_member("g@example.com") })]
    #[case(new_member("not-an-email"))]
    #[case(NewMember { phone: "555".to_string(), ..new_member("g@example.com") })]
    #[tokio::test]
    async fn test_invalid_member(#[case] new: NewMember) {
        let (logic, _, _) = seeded().await;

        let res = logic.create_member(None, new).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_member_email() {
        let (logic, member, _) = seeded().await;

        let res = logic.create_member(None, new_member(&member.email)).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_and_update_space() {
        let (logic, _, _) = seeded().await;

        let space = logic.create_space(None, new_space()).await.unwrap();
        assert_that!(space.status).is_equal_to(SpaceStatus::Available);

        let res = logic
            .update_space(
                None,
                space.space_id,
                SpaceChanges {
                    status: Some(SpaceStatus::Maintenance),
                    daily_rate: Some(dec!(30)),
                    ..SpaceChanges::default()
                },
            )
            .await;
        assert_that!(res).is_ok().matches(|s| {
            s.status == SpaceStatus::Maintenance
                && s.rate_card.daily_rate == dec!(30)
                && s.rate_card.hourly_rate == dec!(4.50)
        });
    }

    #[rstest]
    #[case(NewSpace { capacity: 0, ..new_space() })]
    #[case(NewSpace { hourly_rate: dec!(0), ..new_space() })]
    #[case(NewSpace { daily_rate: dec!(-1), ..new_space() })]
    #[case(NewSpace { hourly_rate: dec!(100000000000000000000), ..new_space() })]
    #[tokio::test]
    async fn test_invalid_space(#[case] new: NewSpace) {
        let (logic, _, _) = seeded().await;

        let res = logic.create_space(None, new).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_record_and_settle_payment() {
        let (logic, member, space) = seeded().await;
        let booking = logic
            .propose_booking(ProposeBookingRequest {
                actor_id: None,
                space_id: space.space_id,
                member_id: member.member_id,
                start_time: at(9, 0),
                end_time: at(11, 0),
                booking_type: BookingType::Hourly,
                notes: None,
                request_key: None,
            })
            .await
            .unwrap()
            .booking;

        let payment = logic
            .record_payment(
                Some(ACTOR.to_string()),
                NewPayment {
                    booking_id: booking.booking_id,
                    amount: booking.total_amount,
                    payment_method: PaymentMethod::CreditCard,
                    payment_status: None,
                    payment_date: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_that!(payment.payment_status).is_equal_to(PaymentStatus::Pending);
        assert_that!(payment.payment_date).is_none();

        let res = logic
            .update_payment(
                None,
                payment.payment_id,
                PaymentChanges {
                    payment_status: Some(PaymentStatus::Paid),
                    ..PaymentChanges::default()
                },
            )
            .await;
        assert_that!(res)
            .is_ok()
            .matches(|p| p.payment_status == PaymentStatus::Paid && p.payment_date.is_some());
    }

    #[tokio::test]
    async fn test_payment_for_missing_booking() {
        let (logic, _, _) = seeded().await;

        let res = logic
            .record_payment(
                None,
                NewPayment {
                    booking_id: Uuid::new_v4(),
                    amount: dec!(10),
                    payment_method: PaymentMethod::Cash,
                    payment_status: None,
                    payment_date: None,
                    notes: None,
                },
            )
            .await;

        assert_that!(res).is_err().matches(|err| {
            matches!(err, Error::NotFound { entity: EntityType::Booking, .. })
        });
    }

    async fn booked(logic: &MemoryLogic, member: &Member, space: &Space) -> Booking {
        logic
            .propose_booking(ProposeBookingRequest {
                actor_id: None,
                space_id: space.space_id,
                member_id: member.member_id,
                start_time: at(9, 0),
                end_time: at(11, 0),
                booking_type: BookingType::Hourly,
                notes: None,
                request_key: None,
            })
            .await
            .unwrap()
            .booking
    }

    fn paid(booking: &Booking) -> NewPayment {
        NewPayment {
            booking_id: booking.booking_id,
            amount: booking.total_amount,
            payment_method: PaymentMethod::BankTransfer,
            payment_status: Some(PaymentStatus::Paid),
            payment_date: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_payments_wait_for_space_lock() {
        // GIVEN a booking whose space is held by a booking command
        let (logic, member, space) = seeded().await;
        let booking = booked(&logic, &member, &space).await;
        let pending = logic
            .record_payment(
                None,
                NewPayment {
                    payment_status: None,
                    ..paid(&booking)
                },
            )
            .await
            .unwrap();
        let held = logic
            .locks()
            .acquire(&[space.space_id], Duration::from_secs(1))
            .await
            .unwrap();

        // WHEN paying for it
        let recorded = logic.record_payment(None, paid(&booking)).await;
        let updated = logic
            .update_payment(
                None,
                pending.payment_id,
                PaymentChanges {
                    payment_status: Some(PaymentStatus::Paid),
                    ..PaymentChanges::default()
                },
            )
            .await;

        // THEN both wait on the space and give up without writing
        for res in [recorded, updated] {
            assert_that!(res)
                .is_err()
                .matches(|err| matches!(err, Error::SpaceBusy(id) if *id == space.space_id));
        }
        let payments = logic
            .database()
            .list_payments_for_booking(booking.booking_id)
            .await
            .unwrap();
        assert_that!(payments).matches(|payments| {
            payments.len() == 1 && payments[0].payment_status == PaymentStatus::Pending
        });

        // AND succeed once the space is released
        drop(held);
        assert_that!(logic.record_payment(None, paid(&booking)).await).is_ok();
    }

    #[tokio::test]
    async fn test_payment_update_detail() {
        let (logic, member, space) = seeded().await;
        let booking = booked(&logic, &member, &space).await;
        let payment = logic
            .record_payment(
                None,
                NewPayment {
                    payment_status: None,
                    ..paid(&booking)
                },
            )
            .await
            .unwrap();

        logic
            .update_payment(
                Some(ACTOR.to_string()),
                payment.payment_id,
                PaymentChanges {
                    payment_status: Some(PaymentStatus::Paid),
                    ..PaymentChanges::default()
                },
            )
            .await
            .unwrap();

        let logs = logic.recent_activity(Some(1)).await.unwrap();
        let expected = format!("Updated payment #{} - Status: paid", payment.payment_id);
        assert_that!(logs[0].details.clone()).is_equal_to(Some(expected));
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(1000000000.01))]
    #[tokio::test]
    async fn test_invalid_payment_amount(#[case] amount: Decimal) {
        let (logic, member, space) = seeded().await;
        let booking = booked(&logic, &member, &space).await;

        let res = logic
            .record_payment(
                None,
                NewPayment {
                    amount,
                    ..paid(&booking)
                },
            )
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Validation(_)));
    }
}
