use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    commands::{amend_booking::BookingChanges, propose_booking::ProposeBookingRequest},
    domain::{BookingStatus, BookingType},
};

/// Body of `POST /bookings`
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingApiRequest {
    pub space_id: Uuid,
    pub member_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub booking_type: BookingType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub request_key: Option<String>,
}

impl CreateBookingApiRequest {
    /// `header_key` wins over a key in the body
    pub fn into_command(
        self,
        actor_id: Option<String>,
        header_key: Option<String>,
    ) -> ProposeBookingRequest {
        ProposeBookingRequest {
            actor_id,
            space_id: self.space_id,
            member_id: self.member_id,
            start_time: self.start_time,
            end_time: self.end_time,
            booking_type: self.booking_type,
            notes: self.notes,
            request_key: header_key.or(self.request_key),
        }
    }
}

/// Body of `PATCH /bookings/{id}`; absent fields stay unchanged
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingApiRequest {
    pub space_id: Option<Uuid>,
    pub member_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub booking_type: Option<BookingType>,
    pub status: Option<BookingStatus>,
    /// An empty string clears the notes
    pub notes: Option<String>,
}

impl From<UpdateBookingApiRequest> for BookingChanges {
    fn from(req: UpdateBookingApiRequest) -> Self {
        BookingChanges {
            space_id: req.space_id,
            member_id: req.member_id,
            start_time: req.start_time,
            end_time: req.end_time,
            booking_type: req.booking_type,
            status: req.status,
            notes: req
                .notes
                .map(|notes| Some(notes).filter(|notes| !notes.is_empty())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    #[test]
    fn test_empty_notes_clear() {
        let changes: BookingChanges = serde_json::from_str::<UpdateBookingApiRequest>(
            r#"{"notes": "", "status": "cancelled"}"#,
        )
        .unwrap()
        .into();

        assert_that!(changes.notes).is_equal_to(Some(None));
        assert_that!(changes.status).is_equal_to(Some(BookingStatus::Cancelled));
        assert_that!(changes.start_time).is_none();
    }

    #[test]
    fn test_header_key_wins() {
        let req: CreateBookingApiRequest = serde_json::from_value(serde_json::json!({
            "spaceId": Uuid::new_v4(),
            "memberId": Uuid::new_v4(),
            "startTime": "2024-03-04T09:00:00Z",
            "endTime": "2024-03-04T10:00:00Z",
            "bookingType": "hourly",
            "requestKey": "from-body",
        }))
        .unwrap();

        let cmd = req.into_command(None, Some("from-header".to_string()));

        assert_that!(cmd.request_key).is_equal_to(Some("from-header".to_string()));
    }
}
