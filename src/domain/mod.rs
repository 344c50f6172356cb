use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod interval;
pub mod pricing;

pub use interval::{Interval, InvalidInterval};

/// A person holding a coworking membership
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Unique identifier for the `Member`
    #[serde(rename = "id")]
    pub member_id: Uuid,
    pub full_name: String,
    /// Unique across members
    pub email: String,
    pub phone: String,
    pub membership_type: MembershipType,
    pub is_active: bool,
    pub joined_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipType {
    Daily,
    Weekly,
    Monthly,
    Annual,
}

/// A bookable physical resource: a desk, an office or a room
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    #[serde(rename = "id")]
    pub space_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SpaceKind,
    pub capacity: u32,
    #[serde(flatten)]
    pub rate_card: RateCard,
    pub status: SpaceStatus,
    pub description: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    Desk,
    PrivateOffice,
    MeetingRoom,
    ConferenceRoom,
}

/// Operational status of a space
///
/// This is informational only. Admission of a booking depends on the confirmed bookings of the
/// space, not on this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceStatus {
    Available,
    Occupied,
    Maintenance,
}

/// Prices used to compute the cost of a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCard {
    #[serde(with = "rust_decimal::serde::str")]
    pub hourly_rate: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub daily_rate: Decimal,
}

impl RateCard {
    /// Both rates must be strictly positive and at most [`pricing::MAX_AMOUNT`]
    pub fn is_valid(&self) -> bool {
        [self.hourly_rate, self.daily_rate]
            .iter()
            .all(|rate| *rate > Decimal::ZERO && *rate <= pricing::MAX_AMOUNT)
    }
}

/// A reservation of one space by one member over a time interval
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "id")]
    pub booking_id: Uuid,
    pub space_id: Uuid,
    pub member_id: Uuid,
    #[serde(flatten)]
    pub interval: Interval,
    pub booking_type: BookingType,
    /// Derived from the space's rate card, the booking type and the interval
    #[serde(with = "rust_decimal::serde::str")]
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub notes: Option<String>,
    /// Caller-supplied key that makes creation safe to retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Whether this booking currently holds its time slot
    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    /// Whether this booking blocks `interval` on `space_id`
    pub fn conflicts_with(&self, space_id: Uuid, interval: &Interval) -> bool {
        self.space_id == space_id && self.is_confirmed() && self.interval.overlaps(interval)
    }
}

/// Which rate of the rate card applies to a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Hourly,
    Daily,
}

/// Lifecycle of a booking
///
/// `Confirmed` is the initial status. `Cancelled` and `Completed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Confirmed)
    }

    /// Staying in the same status is always allowed
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        *self == next || *self == BookingStatus::Confirmed
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// A payment recorded against a booking
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "id")]
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    BankTransfer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Overdue,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

/// Kind of record an activity entry or lookup refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Member,
    Space,
    Booking,
    Payment,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Member => "member",
            EntityType::Space => "space",
            EntityType::Booking => "booking",
            EntityType::Payment => "payment",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Create,
    Update,
}

/// Details for an activity event, before it is stored
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityEvent {
    /// Who performed the mutation
    pub actor_id: String,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    /// Human-readable summary
    ///
    /// Kept as free text since the wording differs per entity and evolves over time.
    pub details: Option<String>,
}

/// A stored activity event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    /// Monotonic sequence number assigned by the sink
    pub id: u64,
    #[serde(rename = "userId")]
    pub actor_id: String,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}
