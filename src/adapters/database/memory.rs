use crate::{
    domain::{Booking, EntityType, Interval, Member, Payment, Space},
    ports::database::{DatabasePort, Error},
};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Debug, Default)]
struct Tables {
    members: HashMap<Uuid, Member>,
    spaces: HashMap<Uuid, Space>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
}

/// Clone the rows of a table, newest first
fn newest_first<T: Clone>(
    rows: &HashMap<Uuid, T>,
    created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.values().cloned().collect();
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows
}

fn insert<T>(table: &mut HashMap<Uuid, T>, id: Uuid, row: T) -> Result<(), Error> {
    match table.entry(id) {
        Entry::Occupied(_) => Err(Error::Duplicate {
            field: "id",
            value: id.to_string(),
        }),
        Entry::Vacant(entry) => {
            entry.insert(row);
            Ok(())
        }
    }
}

fn replace<T>(
    table: &mut HashMap<Uuid, T>,
    entity_type: EntityType,
    id: Uuid,
    row: T,
) -> Result<(), Error> {
    match table.get_mut(&id) {
        Some(existing) => {
            *existing = row;
            Ok(())
        }
        None => Err(Error::NotFound(entity_type, id)),
    }
}

impl Tables {
    fn check_email_free(&self, member_id: Uuid, email: &str) -> Result<(), Error> {
        let taken = self.members.values().any(|member| {
            member.member_id != member_id && member.email.eq_ignore_ascii_case(email)
        });
        if taken {
            return Err(Error::Duplicate {
                field: "email",
                value: email.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DatabasePort for MemoryDatabase {
    async fn get_member(&self, member_id: Uuid) -> Result<Member, Error> {
        self.tables
            .lock()?
            .members
            .get(&member_id)
            .cloned()
            .ok_or(Error::NotFound(EntityType::Member, member_id))
    }

    async fn list_members(&self) -> Result<Vec<Member>, Error> {
        Ok(newest_first(&self.tables.lock()?.members, |m| m.created_at))
    }

    async fn create_member(&self, member: Member) -> Result<Member, Error> {
        let mut tables = self.tables.lock()?;
        tables.check_email_free(member.member_id, &member.email)?;
        insert(&mut tables.members, member.member_id, member.clone())?;
        Ok(member)
    }

    async fn update_member(&self, member: Member) -> Result<Member, Error> {
        let mut tables = self.tables.lock()?;
        tables.check_email_free(member.member_id, &member.email)?;
        replace(
            &mut tables.members,
            EntityType::Member,
            member.member_id,
            member.clone(),
        )?;
        Ok(member)
    }

    async fn get_space(&self, space_id: Uuid) -> Result<Space, Error> {
        self.tables
            .lock()?
            .spaces
            .get(&space_id)
            .cloned()
            .ok_or(Error::NotFound(EntityType::Space, space_id))
    }

    async fn list_spaces(&self) -> Result<Vec<Space>, Error> {
        Ok(newest_first(&self.tables.lock()?.spaces, |s| s.created_at))
    }

    async fn create_space(&self, space: Space) -> Result<Space, Error> {
        let mut tables = self.tables.lock()?;
        insert(&mut tables.spaces, space.space_id, space.clone())?;
        Ok(space)
    }

    async fn update_space(&self, space: Space) -> Result<Space, Error> {
        let mut tables = self.tables.lock()?;
        replace(&mut tables.spaces, EntityType::Space, space.space_id, space.clone())?;
        Ok(space)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, Error> {
        self.tables
            .lock()?
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or(Error::NotFound(EntityType::Booking, booking_id))
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, Error> {
        Ok(newest_first(&self.tables.lock()?.bookings, |b| b.created_at))
    }

    async fn create_booking(&self, booking: Booking) -> Result<Booking, Error> {
        let mut tables = self.tables.lock()?;
        // Request keys are unique, like a UNIQUE column would be
        if let Some(key) = &booking.request_key {
            if tables
                .bookings
                .values()
                .any(|b| b.request_key.as_ref() == Some(key))
            {
                return Err(Error::Duplicate {
                    field: "request key",
                    value: key.clone(),
                });
            }
        }
        insert(&mut tables.bookings, booking.booking_id, booking.clone())?;
        Ok(booking)
    }

    async fn update_booking(&self, booking: Booking) -> Result<Booking, Error> {
        let mut tables = self.tables.lock()?;
        replace(&mut tables.bookings, EntityType::Booking, booking.booking_id, booking.clone())?;
        Ok(booking)
    }

    async fn find_conflicting_bookings(
        &self,
        space_id: Uuid,
        interval: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>, Error> {
        let tables = self.tables.lock()?;
        let mut conflicts: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| Some(b.booking_id) != exclude)
            .filter(|b| b.conflicts_with(space_id, &interval))
            .cloned()
            .collect();
        conflicts.sort_by_key(|b| b.interval.start());
        Ok(conflicts)
    }

    async fn find_booking_by_request_key(
        &self,
        request_key: String,
    ) -> Result<Option<Booking>, Error> {
        Ok(self
            .tables
            .lock()?
            .bookings
            .values()
            .find(|b| b.request_key.as_deref() == Some(request_key.as_str()))
            .cloned())
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Payment, Error> {
        self.tables
            .lock()?
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or(Error::NotFound(EntityType::Payment, payment_id))
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, Error> {
        Ok(newest_first(&self.tables.lock()?.payments, |p| p.created_at))
    }

    async fn list_payments_for_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>, Error> {
        let payments = newest_first(&self.tables.lock()?.payments, |p| p.created_at)
            .into_iter()
            .filter(|p| p.booking_id == booking_id)
            .collect();
        Ok(payments)
    }

    async fn create_payment(&self, payment: Payment) -> Result<Payment, Error> {
        let mut tables = self.tables.lock()?;
        insert(&mut tables.payments, payment.payment_id, payment.clone())?;
        Ok(payment)
    }

    async fn update_payment(&self, payment: Payment) -> Result<Payment, Error> {
        let mut tables = self.tables.lock()?;
        replace(&mut tables.payments, EntityType::Payment, payment.payment_id, payment.clone())?;
        Ok(payment)
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus we erase the error
/// and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::domain::BookingStatus;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use speculoos::prelude::*;

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_create_retrieve_member() {
        let database = MemoryDatabase::default();
        let member = member();

        let res = database.create_member(member.clone()).await;
        assert_that!(res).is_ok();

        let res = database.get_member(member.member_id).await;
        assert_that!(res).is_ok().is_equal_to(member);
    }

    #[tokio::test]
    async fn test_get_missing_space() {
        let database = MemoryDatabase::default();
        let space_id = Uuid::new_v4();

        let res = database.get_space(space_id).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::NotFound(EntityType::Space, id) if *id == space_id));
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let database = MemoryDatabase::default();
        let first = member();
        let mut second = member();
        second.email = first.email.to_uppercase();

        assert_that!(database.create_member(first).await).is_ok();
        let res = database.create_member(second).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Duplicate { field: "email", .. }));
    }

    #[tokio::test]
    async fn test_update_missing_booking() {
        let database = MemoryDatabase::default();
        let booking = booking(Uuid::new_v4(), Uuid::new_v4(), at(9), at(10));

        let res = database.update_booking(booking).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::NotFound(EntityType::Booking, _)));
    }

    #[tokio::test]
    async fn test_find_conflicting_bookings() {
        // GIVEN a space with a confirmed, a cancelled, and a non-overlapping booking, plus an
        // overlapping booking on another space
        let database = MemoryDatabase::default();
        let space = space(dec!(10), dec!(80));
        let member_id = Uuid::new_v4();
        let confirmed = booking(space.space_id, member_id, at(10), at(12));
        let mut cancelled = booking(space.space_id, member_id, at(11), at(13));
        cancelled.status = BookingStatus::Cancelled;
        let later = booking(space.space_id, member_id, at(14), at(15));
        let elsewhere = booking(Uuid::new_v4(), member_id, at(10), at(12));
        for b in [&confirmed, &cancelled, &later, &elsewhere] {
            database.create_booking(b.clone()).await.unwrap();
        }

        // WHEN looking for conflicts with [12:00, 13:00]
        let interval = Interval::new(at(12), at(13)).unwrap();
        let res = database
            .find_conflicting_bookings(space.space_id, interval, None)
            .await;

        // THEN only the confirmed booking touching 12:00 is returned
        assert_that!(res)
            .is_ok()
            .matches(|found| found.len() == 1 && found[0].booking_id == confirmed.booking_id);

        // AND excluding it leaves nothing
        let res = database
            .find_conflicting_bookings(space.space_id, interval, Some(confirmed.booking_id))
            .await;
        assert_that!(res).is_ok().matches(|found| found.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_request_key() {
        let database = MemoryDatabase::default();
        let mut first = booking(Uuid::new_v4(), Uuid::new_v4(), at(9), at(10));
        first.request_key = Some("req-1".to_string());
        let mut second = booking(Uuid::new_v4(), Uuid::new_v4(), at(11), at(12));
        second.request_key = Some("req-1".to_string());

        assert_that!(database.create_booking(first.clone()).await).is_ok();
        let res = database.create_booking(second).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Duplicate { .. }));

        let res = database
            .find_booking_by_request_key("req-1".to_string())
            .await;
        assert_that!(res).is_ok().is_equal_to(Some(first));
    }
}
