//! Booking price calculation.
//!
//! Pure functions over a rate card and an interval, no storage access. Amounts are fixed-point
//! decimals rounded to cents.

use rust_decimal::{Decimal, RoundingStrategy};

use super::{interval::Interval, BookingType, RateCard};

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// Largest rate or payment amount accepted from callers
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// The computed amount does not fit in a `Decimal`
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("amount is out of range")]
pub struct AmountOverflow;

/// Round a monetary amount to 2 decimal places, halves away from zero.
///
/// The result always carries a scale of 2, so `20` renders as `20.00`.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Sum amounts, failing instead of overflowing
pub fn sum_money(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, AmountOverflow> {
    let total = amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or(AmountOverflow)?;
    Ok(round_money(total))
}

/// Price of holding a space for `interval` at the given rates
///
/// * `Hourly` bookings pay for the exact fractional number of hours.
/// * `Daily` bookings pay for every started day: 25 hours is charged as 2 days.
pub fn price_interval(
    rate_card: &RateCard,
    booking_type: BookingType,
    interval: &Interval,
) -> Result<Decimal, AmountOverflow> {
    let millis = interval.duration().num_milliseconds();

    let amount = match booking_type {
        BookingType::Hourly => rate_card
            .hourly_rate
            .checked_mul(Decimal::from(millis))
            .and_then(|amount| amount.checked_div(Decimal::from(MILLIS_PER_HOUR))),
        BookingType::Daily => {
            // Ceiling division; the interval is never empty so millis > 0
            let days = (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
            rate_card.daily_rate.checked_mul(Decimal::from(days))
        }
    };

    amount.map(round_money).ok_or(AmountOverflow)
}
