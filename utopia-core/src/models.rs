use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BookingError, BookingResult};

/// Reference to a flight as the ticket table keys it.
///
/// `id` is the internal key; `flight_number` is the customer-visible number
/// that goes into booking identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightRef {
    pub id: i32,
    pub flight_number: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i32,
}

/// Seat class as stored on the ticket row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum SeatClass {
    First,
    Business,
    Economy,
}

impl SeatClass {
    pub fn code(self) -> i32 {
        match self {
            SeatClass::First => 1,
            SeatClass::Business => 2,
            SeatClass::Economy => 3,
        }
    }
}

impl From<SeatClass> for i32 {
    fn from(class: SeatClass) -> Self {
        class.code()
    }
}

impl TryFrom<i32> for SeatClass {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SeatClass::First),
            2 => Ok(SeatClass::Business),
            3 => Ok(SeatClass::Economy),
            other => Err(format!("unknown seat class {}", other)),
        }
    }
}

/// The (flight, row, seat) triple identifying one bookable seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SeatParts")]
pub struct SeatLocation {
    flight: FlightRef,
    row: i32,
    seat: String,
}

#[derive(Deserialize)]
struct SeatParts {
    flight: FlightRef,
    row: i32,
    seat: String,
}

impl TryFrom<SeatParts> for SeatLocation {
    type Error = BookingError;

    fn try_from(parts: SeatParts) -> Result<Self, Self::Error> {
        SeatLocation::new(parts.flight, parts.row, parts.seat)
    }
}

impl SeatLocation {
    pub fn new(flight: FlightRef, row: i32, seat: impl Into<String>) -> BookingResult<Self> {
        let seat = seat.into();
        if row < 1 {
            return Err(BookingError::InvalidSeat(format!("row {} is below 1", row)));
        }
        if seat.trim().is_empty() {
            return Err(BookingError::InvalidSeat("seat label is empty".to_string()));
        }
        Ok(Self { flight, row, seat })
    }

    pub fn flight(&self) -> FlightRef {
        self.flight
    }

    pub fn row(&self) -> i32 {
        self.row
    }

    pub fn seat(&self) -> &str {
        &self.seat
    }
}

impl fmt::Display for SeatLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.flight.flight_number, self.row, self.seat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airport {
    pub code: String,
    pub name: String,
}

impl fmt::Display for Airport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: i32,
    pub flight_number: i32,
    pub departure_airport: Airport,
    pub departure_date: DateTime<Utc>,
    pub destination: Airport,
    pub arrival_date: DateTime<Utc>,
}

impl Flight {
    pub fn reference(&self) -> FlightRef {
        FlightRef {
            id: self.id,
            flight_number: self.flight_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl User {
    pub fn reference(&self) -> UserRef {
        UserRef { id: self.id }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.display_name, &self.username) {
            (Some(name), _) => f.write_str(name),
            (None, Some(username)) => f.write_str(username),
            (None, None) => f.write_str("unknown user"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight() -> FlightRef {
        FlightRef { id: 7, flight_number: 152 }
    }

    #[test]
    fn test_seat_location_equality_is_by_value() {
        let a = SeatLocation::new(flight(), 1, "A").unwrap();
        let b = SeatLocation::new(flight(), 1, "A").unwrap();
        let c = SeatLocation::new(flight(), 1, "B").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut seen = std::collections::HashSet::new();
        seen.insert(a);
        assert!(seen.contains(&b));
        assert_eq!(b.to_string(), "152/1/A");
    }

    #[test]
    fn test_seat_location_rejects_bad_row_and_label() {
        assert!(matches!(
            SeatLocation::new(flight(), 0, "A"),
            Err(BookingError::InvalidSeat(_))
        ));
        assert!(matches!(
            SeatLocation::new(flight(), 3, "  "),
            Err(BookingError::InvalidSeat(_))
        ));
    }

    #[test]
    fn test_seat_location_deserialize_validates() {
        let seat: SeatLocation = serde_json::from_str(
            r#"{"flight":{"id":7,"flight_number":152},"row":4,"seat":"C"}"#,
        )
        .unwrap();
        assert_eq!(seat, SeatLocation::new(flight(), 4, "C").unwrap());

        let bad_row = serde_json::from_str::<SeatLocation>(
            r#"{"flight":{"id":7,"flight_number":152},"row":0,"seat":"C"}"#,
        );
        assert!(bad_row.is_err());

        let blank = serde_json::from_str::<SeatLocation>(
            r#"{"flight":{"id":7,"flight_number":152},"row":2,"seat":""}"#,
        );
        assert!(blank.is_err());
    }

    #[test]
    fn test_seat_class_codes() {
        assert_eq!(SeatClass::try_from(2), Ok(SeatClass::Business));
        assert!(SeatClass::try_from(4).is_err());
        assert_eq!(serde_json::to_string(&SeatClass::Economy).unwrap(), "3");
    }

    #[test]
    fn test_user_display_fallback() {
        let mut user = User {
            id: 1,
            username: Some("jdoe".to_string()),
            display_name: None,
            email: None,
            phone: None,
        };
        assert_eq!(user.to_string(), "jdoe");

        user.display_name = Some("Jane Doe".to_string());
        assert_eq!(user.to_string(), "Jane Doe");

        user.display_name = None;
        user.username = None;
        assert_eq!(user.to_string(), "unknown user");
    }
}
