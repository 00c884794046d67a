use serde::Serialize;

use crate::error::{BookingError, BookingResult};
use crate::models::{SeatRef, SeatType};

/// Seat-type surcharge in percent of the showtime base price.
pub fn multiplier_percent(seat_type: SeatType) -> i64 {
    match seat_type {
        SeatType::Standard => 100,
        SeatType::Premium => 130,
        SeatType::Vip => 180,
        SeatType::Couple => 220,
    }
}

/// Price of one seat, rounded half-up to a whole currency unit.
pub fn seat_price(base_price: i64, seat_type: SeatType) -> BookingResult<i64> {
    if base_price <= 0 {
        return Err(BookingError::validation("base price must be positive"));
    }
    base_price
        .checked_mul(multiplier_percent(seat_type))
        .and_then(|scaled| scaled.checked_add(50))
        .map(|scaled| scaled / 100)
        .ok_or_else(|| BookingError::validation("seat price overflows"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteLine {
    pub seat: String,
    pub seat_type: SeatType,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub total: i64,
}

/// Prices a selection; an empty selection is an error, never a zero total.
pub fn quote(base_price: i64, seats: &[SeatRef]) -> BookingResult<Quote> {
    if seats.is_empty() {
        return Err(BookingError::validation("select at least one seat"));
    }

    let mut lines = Vec::with_capacity(seats.len());
    let mut total: i64 = 0;
    for seat in seats {
        let price = seat_price(base_price, seat.seat_type())?;
        total = total
            .checked_add(price)
            .ok_or_else(|| BookingError::validation("total overflows"))?;
        lines.push(QuoteLine { seat: seat.label(), seat_type: seat.seat_type(), price });
    }

    Ok(Quote { lines, total })
}

pub fn total(base_price: i64, seats: &[SeatRef]) -> BookingResult<i64> {
    quote(base_price, seats).map(|q| q.total)
}
