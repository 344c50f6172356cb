use uuid::Uuid;

use crate::domain::{Booking, EntityType, Interval, Member, Payment, Space};

/// Storage for the records of the coworking space
///
/// Reads and writes are keyed by id. The admission engine only relies on
/// [`DatabasePort::find_conflicting_bookings`] returning the confirmed bookings that exist at the
/// time of the call; serializing check-then-write per space is the caller's job.
#[mockall::automock]
#[async_trait::async_trait]
pub trait DatabasePort {
    async fn get_member(&self, member_id: Uuid) -> Result<Member, Error>;
    async fn list_members(&self) -> Result<Vec<Member>, Error>;
    async fn create_member(&self, member: Member) -> Result<Member, Error>;
    async fn update_member(&self, member: Member) -> Result<Member, Error>;

    async fn get_space(&self, space_id: Uuid) -> Result<Space, Error>;
    async fn list_spaces(&self) -> Result<Vec<Space>, Error>;
    async fn create_space(&self, space: Space) -> Result<Space, Error>;
    async fn update_space(&self, space: Space) -> Result<Space, Error>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, Error>;
    async fn list_bookings(&self) -> Result<Vec<Booking>, Error>;
    async fn create_booking(&self, booking: Booking) -> Result<Booking, Error>;
    async fn update_booking(&self, booking: Booking) -> Result<Booking, Error>;
    /// Confirmed bookings on `space_id` overlapping `interval`, bounds included
    ///
    /// `exclude` removes one booking from the result, so an amended booking does not conflict
    /// with itself.
    async fn find_conflicting_bookings(
        &self,
        space_id: Uuid,
        interval: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>, Error>;
    async fn find_booking_by_request_key(&self, request_key: String)
        -> Result<Option<Booking>, Error>;

    async fn get_payment(&self, payment_id: Uuid) -> Result<Payment, Error>;
    async fn list_payments(&self) -> Result<Vec<Payment>, Error>;
    async fn list_payments_for_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>, Error>;
    async fn create_payment(&self, payment: Payment) -> Result<Payment, Error>;
    async fn update_payment(&self, payment: Payment) -> Result<Payment, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No record of this type exists with the given id
    #[error("{0} {1} does not exist")]
    NotFound(EntityType, Uuid),

    /// A unique field already belongs to another record
    ///
    /// Used for member emails and booking request keys.
    #[error("{field} '{value}' is already in use")]
    Duplicate { field: &'static str, value: String },

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
