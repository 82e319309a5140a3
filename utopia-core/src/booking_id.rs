use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{SeatLocation, UserRef};

/// Public reference a customer uses for a reservation.
///
/// A pure function of seat and user: the same user re-booking the same seat
/// after a cancellation gets the same id back. Uniqueness among active
/// tickets comes from the one-reservation-per-seat rule, not from the hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    pub fn generate(seat: &SeatLocation, user: &UserRef) -> Self {
        let input = format!(
            "{} {} {} {}",
            seat.flight().flight_number,
            seat.row(),
            seat.seat(),
            user.id
        );
        BookingId(hex::encode(Md5::digest(input.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BookingId {
    fn from(value: String) -> Self {
        BookingId(value)
    }
}

impl From<&str> for BookingId {
    fn from(value: &str) -> Self {
        BookingId(value.to_string())
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
