//! Admission control and pricing for coworking space bookings.
//!
//! Confirmed bookings of a space never overlap, with both interval ends inclusive. The domain
//! logic in [`commands`] only talks to storage and the activity log through the traits in
//! [`ports`], and [`adapters`] provides in-memory implementations plus the HTTP API.

pub mod adapters;
pub mod commands;
pub mod domain;
pub mod ports;
