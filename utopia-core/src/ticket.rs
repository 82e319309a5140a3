use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking_id::BookingId;
use crate::models::{SeatClass, SeatLocation, UserRef};
use crate::{BookingError, BookingResult, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Unbooked,
    Reserved,
    Paid,
}

/// Outcome of [`Ticket::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Released,
    AlreadyUnbooked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Settlement {
    Pending { timeout: DateTime<Utc> },
    Paid { price: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Reservation {
    reserver: UserRef,
    booking_id: BookingId,
    settlement: Settlement,
}

/// One seat on one flight, and whoever currently holds it.
///
/// The reservation fields only exist together: a reserver always comes with
/// a booking id and exactly one of a payment deadline or a paid price.
/// Releasing drops all of them at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id: SeatLocation,
    seat_class: SeatClass,
    reservation: Option<Reservation>,
}

/// Flat column view of a ticket, as the store reads and writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketColumns {
    pub id: SeatLocation,
    pub seat_class: i32,
    pub reserver: Option<UserRef>,
    pub price: Option<i32>,
    pub reservation_timeout: Option<DateTime<Utc>>,
    pub booking_id: Option<BookingId>,
}

impl Ticket {
    /// A fresh, unbooked seat.
    pub fn new(id: SeatLocation, seat_class: SeatClass) -> Self {
        Self {
            id,
            seat_class,
            reservation: None,
        }
    }

    pub fn id(&self) -> &SeatLocation {
        &self.id
    }

    pub fn seat_class(&self) -> SeatClass {
        self.seat_class
    }

    pub fn status(&self) -> TicketStatus {
        match &self.reservation {
            None => TicketStatus::Unbooked,
            Some(r) => match r.settlement {
                Settlement::Pending { .. } => TicketStatus::Reserved,
                Settlement::Paid { .. } => TicketStatus::Paid,
            },
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.reservation.is_some()
    }

    pub fn reserver(&self) -> Option<UserRef> {
        self.reservation.as_ref().map(|r| r.reserver)
    }

    pub fn booking_id(&self) -> Option<&BookingId> {
        self.reservation.as_ref().map(|r| &r.booking_id)
    }

    pub fn price(&self) -> Option<i32> {
        match self.reservation.as_ref().map(|r| &r.settlement) {
            Some(Settlement::Paid { price }) => Some(*price),
            _ => None,
        }
    }

    pub fn reservation_timeout(&self) -> Option<DateTime<Utc>> {
        match self.reservation.as_ref().map(|r| &r.settlement) {
            Some(Settlement::Pending { timeout }) => Some(*timeout),
            _ => None,
        }
    }

    /// Unbooked → Reserved.
    pub fn reserve(&mut self, user: UserRef, timeout: DateTime<Utc>) -> BookingResult<&BookingId> {
        if self.reservation.is_some() {
            return Err(BookingError::AlreadyReserved(self.id.clone()));
        }
        let booking_id = BookingId::generate(&self.id, &user);
        let reservation = self.reservation.insert(Reservation {
            reserver: user,
            booking_id,
            settlement: Settlement::Pending { timeout },
        });
        Ok(&reservation.booking_id)
    }

    /// Reserved → Paid. Paying again at the same price is a no-op; returns
    /// whether anything changed.
    pub fn confirm_payment(&mut self, price: i32) -> BookingResult<bool> {
        let reservation = self
            .reservation
            .as_mut()
            .ok_or_else(|| BookingError::NotReserved(self.id.clone()))?;

        match reservation.settlement {
            Settlement::Paid { price: paid } if paid == price => Ok(false),
            Settlement::Paid { price: paid } => Err(BookingError::PaymentConflict {
                paid,
                offered: price,
            }),
            Settlement::Pending { .. } => {
                reservation.settlement = Settlement::Paid { price };
                Ok(true)
            }
        }
    }

    /// Reserved → Unbooked, clearing reserver, booking id and deadline together.
    pub fn release(&mut self) -> BookingResult<Release> {
        match self.status() {
            TicketStatus::Unbooked => Ok(Release::AlreadyUnbooked),
            TicketStatus::Paid => Err(BookingError::AlreadyPaid(self.id.clone())),
            TicketStatus::Reserved => {
                self.reservation = None;
                Ok(Release::Released)
            }
        }
    }

    /// Moves the payment deadline of a pending reservation.
    pub fn reschedule_timeout(&mut self, timeout: DateTime<Utc>) -> BookingResult<()> {
        match self.reservation.as_mut() {
            None => Err(BookingError::InvalidTransition(format!(
                "seat {} has no reservation to time out",
                self.id
            ))),
            Some(Reservation {
                settlement: Settlement::Paid { .. },
                ..
            }) => Err(BookingError::InvalidTransition(format!(
                "seat {} is paid; only unconfirmed bookings time out",
                self.id
            ))),
            Some(reservation) => {
                reservation.settlement = Settlement::Pending { timeout };
                Ok(())
            }
        }
    }

    /// True when the reservation is still pending and its deadline is at or before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reservation_timeout().is_some_and(|timeout| timeout <= now)
    }

    pub fn columns(&self) -> TicketColumns {
        TicketColumns {
            id: self.id.clone(),
            seat_class: self.seat_class.code(),
            reserver: self.reserver(),
            price: self.price(),
            reservation_timeout: self.reservation_timeout(),
            booking_id: self.booking_id().cloned(),
        }
    }
}

impl TryFrom<TicketColumns> for Ticket {
    type Error = StoreError;

    /// Rebuilds a ticket from stored columns, refusing any combination that
    /// breaks the reservation invariant.
    fn try_from(columns: TicketColumns) -> Result<Self, Self::Error> {
        let seat_class = SeatClass::try_from(columns.seat_class)
            .map_err(StoreError::Corrupt)?;

        let reservation = match (
            columns.reserver,
            columns.booking_id,
            columns.price,
            columns.reservation_timeout,
        ) {
            (None, None, None, None) => None,
            (None, _, _, _) => {
                return Err(StoreError::Corrupt(format!(
                    "seat {} has booking details but no reserver",
                    columns.id
                )))
            }
            (Some(_), None, _, _) => {
                return Err(StoreError::Corrupt(format!(
                    "seat {} is reserved without a booking id",
                    columns.id
                )))
            }
            (Some(reserver), Some(booking_id), None, Some(timeout)) => Some(Reservation {
                reserver,
                booking_id,
                settlement: Settlement::Pending { timeout },
            }),
            (Some(reserver), Some(booking_id), Some(price), None) => Some(Reservation {
                reserver,
                booking_id,
                settlement: Settlement::Paid { price },
            }),
            (Some(_), Some(_), _, _) => {
                return Err(StoreError::Corrupt(format!(
                    "seat {} must have exactly one of price and reservation timeout",
                    columns.id
                )))
            }
        };

        Ok(Self {
            id: columns.id,
            seat_class,
            reservation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlightRef;
    use chrono::Duration;
    use proptest::prelude::*;

    fn ticket() -> Ticket {
        let seat = SeatLocation::new(FlightRef { id: 1, flight_number: 152 }, 1, "A").unwrap();
        Ticket::new(seat, SeatClass::Economy)
    }

    fn deadline() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(15)
    }

    fn assert_invariant(ticket: &Ticket) {
        let c = ticket.columns();
        match c.reserver {
            None => {
                assert!(c.price.is_none() && c.reservation_timeout.is_none() && c.booking_id.is_none())
            }
            Some(_) => {
                assert!(c.booking_id.is_some());
                assert!(c.price.is_some() ^ c.reservation_timeout.is_some());
            }
        }
        assert_eq!(Ticket::try_from(c).unwrap(), *ticket);
    }

    #[test]
    fn test_ticket_lifecycle() {
        let mut t = ticket();
        assert_eq!(t.status(), TicketStatus::Unbooked);
        assert_invariant(&t);

        let timeout = deadline();
        let booking_id = t.reserve(UserRef { id: 1 }, timeout).unwrap().clone();
        assert_eq!(booking_id.as_str(), "31e3789fa3d1d1f5d95297ee3183f486");
        assert_eq!(t.status(), TicketStatus::Reserved);
        assert_eq!(t.reservation_timeout(), Some(timeout));
        assert_eq!(t.price(), None);
        assert_invariant(&t);

        assert!(t.confirm_payment(300).unwrap());
        assert_eq!(t.status(), TicketStatus::Paid);
        assert_eq!(t.price(), Some(300));
        assert_eq!(t.reservation_timeout(), None);
        assert_eq!(t.booking_id(), Some(&booking_id));
        assert_invariant(&t);
    }

    #[test]
    fn test_reserve_twice_fails() {
        let mut t = ticket();
        t.reserve(UserRef { id: 1 }, deadline()).unwrap();
        let before = t.clone();

        let result = t.reserve(UserRef { id: 2 }, deadline());
        assert!(matches!(result, Err(BookingError::AlreadyReserved(_))));
        assert_eq!(t, before);
    }

    #[test]
    fn test_payment_is_idempotent_at_same_price() {
        let mut t = ticket();
        t.reserve(UserRef { id: 1 }, deadline()).unwrap();
        t.confirm_payment(300).unwrap();
        let paid = t.clone();

        assert!(!t.confirm_payment(300).unwrap());
        assert_eq!(t, paid);

        let result = t.confirm_payment(400);
        assert!(matches!(
            result,
            Err(BookingError::PaymentConflict { paid: 300, offered: 400 })
        ));
        assert_eq!(t.price(), Some(300));
    }

    #[test]
    fn test_payment_requires_reservation() {
        let mut t = ticket();
        assert!(matches!(t.confirm_payment(300), Err(BookingError::NotReserved(_))));
        assert_invariant(&t);
    }

    #[test]
    fn test_release() {
        let mut t = ticket();
        assert_eq!(t.release().unwrap(), Release::AlreadyUnbooked);

        t.reserve(UserRef { id: 1 }, deadline()).unwrap();
        assert_eq!(t.release().unwrap(), Release::Released);
        assert_eq!(t.status(), TicketStatus::Unbooked);
        assert!(t.booking_id().is_none());
        assert_invariant(&t);
        assert_eq!(t.release().unwrap(), Release::AlreadyUnbooked);

        t.reserve(UserRef { id: 1 }, deadline()).unwrap();
        t.confirm_payment(300).unwrap();
        let paid = t.clone();
        assert!(matches!(t.release(), Err(BookingError::AlreadyPaid(_))));
        assert_eq!(t, paid);
    }

    #[test]
    fn test_reschedule_timeout_is_a_transition_error_outside_pending() {
        let mut t = ticket();
        assert!(matches!(
            t.reschedule_timeout(deadline()),
            Err(BookingError::InvalidTransition(_))
        ));

        t.reserve(UserRef { id: 1 }, deadline()).unwrap();
        let later = deadline() + Duration::minutes(30);
        t.reschedule_timeout(later).unwrap();
        assert_eq!(t.reservation_timeout(), Some(later));

        t.confirm_payment(120).unwrap();
        assert!(matches!(
            t.reschedule_timeout(later),
            Err(BookingError::InvalidTransition(_))
        ));
        assert_invariant(&t);
    }

    #[test]
    fn test_expiry_check() {
        let mut t = ticket();
        let now = Utc::now();
        assert!(!t.is_expired(now));

        t.reserve(UserRef { id: 1 }, now - Duration::minutes(1)).unwrap();
        assert!(t.is_expired(now));

        t.confirm_payment(50).unwrap();
        assert!(!t.is_expired(now));
    }

    #[test]
    fn test_restore_rejects_inconsistent_columns() {
        let seat = ticket().id().clone();
        let base = TicketColumns {
            id: seat,
            seat_class: 3,
            reserver: None,
            price: None,
            reservation_timeout: None,
            booking_id: None,
        };

        let price_without_reserver = TicketColumns {
            price: Some(100),
            ..base.clone()
        };
        let no_booking_id = TicketColumns {
            reserver: Some(UserRef { id: 1 }),
            reservation_timeout: Some(deadline()),
            ..base.clone()
        };
        let both = TicketColumns {
            reserver: Some(UserRef { id: 1 }),
            booking_id: Some(BookingId::from("abc")),
            price: Some(100),
            reservation_timeout: Some(deadline()),
            ..base.clone()
        };
        let neither = TicketColumns {
            reserver: Some(UserRef { id: 1 }),
            booking_id: Some(BookingId::from("abc")),
            ..base.clone()
        };
        let bad_class = TicketColumns {
            seat_class: 9,
            ..base.clone()
        };

        for columns in [price_without_reserver, no_booking_id, both, neither, bad_class] {
            assert!(matches!(
                Ticket::try_from(columns),
                Err(StoreError::Corrupt(_))
            ));
        }
        assert!(Ticket::try_from(base).is_ok());
    }

    #[derive(Debug, Clone)]
    enum Step {
        Reserve(i32),
        Pay(i32),
        Release,
        Reschedule,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (1..4i32).prop_map(Step::Reserve),
            (100..103i32).prop_map(Step::Pay),
            Just(Step::Release),
            Just(Step::Reschedule),
        ]
    }

    proptest! {
        #[test]
        fn test_invariant_holds_after_every_step(steps in prop::collection::vec(step(), 0..40)) {
            let mut t = ticket();
            for step in steps {
                let before = t.clone();
                let applied = match step {
                    Step::Reserve(user) => t.reserve(UserRef { id: user }, deadline()).is_ok(),
                    Step::Pay(price) => t.confirm_payment(price).is_ok(),
                    Step::Release => t.release().is_ok(),
                    Step::Reschedule => t.reschedule_timeout(deadline()).is_ok(),
                };
                if !applied {
                    prop_assert_eq!(&t, &before);
                }
                assert_invariant(&t);
            }
        }
    }
}
