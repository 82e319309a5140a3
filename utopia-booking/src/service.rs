use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};
use utopia_core::repository::{FlightRepository, TicketScope, TicketStore, UserRepository};
use utopia_core::{
    BookingError, BookingId, BookingResult, Release, SeatLocation, Ticket, UserRef,
};
use utopia_store::app_config::BookingRules;

use crate::scope;

/// How a caller names the ticket it wants to pay for or cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketTarget {
    Seat(SeatLocation),
    Booking(BookingId),
}

/// Booking, payment and cancellation of single seats.
///
/// Every operation opens its own scope, re-reads the ticket under a row lock,
/// applies one state transition and commits. Nothing about a scope outlives
/// the call that opened it.
///
/// There is no check that the caller paying for or cancelling a booking is
/// its reserver; that belongs to an access-control layer in front of this
/// service.
pub struct ReservationService<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    default_expiration: Duration,
}

impl<S, D> ReservationService<S, D>
where
    S: TicketStore,
    D: FlightRepository + UserRepository,
{
    /// Fails when the configured payment window is not a usable duration.
    pub fn new(store: Arc<S>, directory: Arc<D>, rules: &BookingRules) -> BookingResult<Self> {
        let default_expiration = rules
            .reservation_window()
            .map_err(BookingError::Configuration)?;
        Ok(Self {
            store,
            directory,
            default_expiration,
        })
    }

    pub fn default_expiration(&self) -> Duration {
        self.default_expiration
    }

    /// Resolves a public flight number plus row and seat to a seat identity.
    pub async fn locate_seat(
        &self,
        flight_number: i32,
        row: i32,
        seat: &str,
    ) -> BookingResult<SeatLocation> {
        let flight = self
            .directory
            .find_by_flight_number(flight_number)
            .await?
            .ok_or_else(|| {
                BookingError::SeatNotFound(format!("{}/{}/{}", flight_number, row, seat))
            })?;
        SeatLocation::new(flight.reference(), row, seat)
    }

    pub async fn resolve_user(&self, id: i32) -> BookingResult<UserRef> {
        self.directory
            .find_user(id)
            .await?
            .map(|user| user.reference())
            .ok_or(BookingError::UserNotFound(id))
    }

    /// Current committed state of a seat.
    pub async fn get_ticket(&self, seat: &SeatLocation) -> BookingResult<Ticket> {
        self.store
            .find_ticket(seat)
            .await?
            .ok_or_else(|| BookingError::SeatNotFound(seat.to_string()))
    }

    /// Reserves `seat` for `user`, with the payment deadline defaulting to
    /// now plus the configured expiration.
    pub async fn book_seat(
        &self,
        seat: &SeatLocation,
        user: UserRef,
        timeout: Option<DateTime<Utc>>,
    ) -> BookingResult<Ticket> {
        let timeout = match timeout {
            Some(timeout) => timeout,
            None => Utc::now()
                .checked_add_signed(self.default_expiration)
                .ok_or_else(|| {
                    BookingError::Configuration(format!(
                        "payment window {} runs past the end of the calendar",
                        self.default_expiration
                    ))
                })?,
        };

        let mut scope = scope::open(self.store.as_ref()).await?;
        let outcome = reserve_seat(&mut scope, seat, user, timeout).await;
        report("book_seat", scope::finish(scope, outcome).await)
    }

    /// Records payment. Paying again at the same price succeeds without change.
    pub async fn accept_payment(&self, target: &TicketTarget, price: i32) -> BookingResult<Ticket> {
        let mut scope = scope::open(self.store.as_ref()).await?;
        let outcome = pay_for_ticket(&mut scope, target, price).await;
        report("accept_payment", scope::finish(scope, outcome).await)
    }

    /// Releases an unpaid reservation. Cancelling an unbooked seat, or a
    /// booking id that no longer matches anything, is a no-op.
    pub async fn cancel_reservation(&self, target: &TicketTarget) -> BookingResult<Release> {
        let mut scope = scope::open(self.store.as_ref()).await?;
        let outcome = cancel_ticket(&mut scope, target).await;
        report("cancel_reservation", scope::finish(scope, outcome).await)
    }

    /// Releases `seat` only if it is still an unpaid reservation whose
    /// deadline is at or before `now`. Returns whether it was released.
    pub async fn release_if_expired(
        &self,
        seat: &SeatLocation,
        now: DateTime<Utc>,
    ) -> BookingResult<bool> {
        let mut scope = scope::open(self.store.as_ref()).await?;
        let outcome = release_expired(&mut scope, seat, now).await;
        report("release_if_expired", scope::finish(scope, outcome).await)
    }

    pub async fn expired_reservations(&self, now: DateTime<Utc>) -> BookingResult<Vec<SeatLocation>> {
        Ok(self.store.expired_reservations(now).await?)
    }
}

async fn reserve_seat<Sc: TicketScope>(
    scope: &mut Sc,
    seat: &SeatLocation,
    user: UserRef,
    timeout: DateTime<Utc>,
) -> BookingResult<Ticket> {
    let mut ticket = lock_existing(scope, seat).await?;
    let booking_id = ticket.reserve(user, timeout)?.clone();
    scope.persist_ticket(&ticket).await?;

    info!(seat = %seat, booking_id = %booking_id, user = user.id, "Seat reserved");
    Ok(ticket)
}

async fn pay_for_ticket<Sc: TicketScope>(
    scope: &mut Sc,
    target: &TicketTarget,
    price: i32,
) -> BookingResult<Ticket> {
    let (seat, expected) = match resolve_target(scope, target).await? {
        Some(resolved) => resolved,
        None => return Err(not_found(target)),
    };

    let mut ticket = lock_existing(scope, &seat).await?;
    if !still_matches(&ticket, expected.as_ref()) {
        return Err(not_found(target));
    }

    if ticket.confirm_payment(price)? {
        scope.persist_ticket(&ticket).await?;
        info!(seat = %seat, price, "Payment accepted");
    } else {
        debug!(seat = %seat, price, "Payment already recorded at this price");
    }
    Ok(ticket)
}

async fn cancel_ticket<Sc: TicketScope>(
    scope: &mut Sc,
    target: &TicketTarget,
) -> BookingResult<Release> {
    let Some((seat, expected)) = resolve_target(scope, target).await? else {
        return Ok(Release::AlreadyUnbooked);
    };

    let mut ticket = lock_existing(scope, &seat).await?;
    if !still_matches(&ticket, expected.as_ref()) {
        return Ok(Release::AlreadyUnbooked);
    }

    let release = ticket.release()?;
    if release == Release::Released {
        scope.persist_ticket(&ticket).await?;
        info!(seat = %seat, "Reservation cancelled");
    }
    Ok(release)
}

async fn release_expired<Sc: TicketScope>(
    scope: &mut Sc,
    seat: &SeatLocation,
    now: DateTime<Utc>,
) -> BookingResult<bool> {
    let mut ticket = lock_existing(scope, seat).await?;
    if !ticket.is_expired(now) {
        return Ok(false);
    }
    ticket.release()?;
    scope.persist_ticket(&ticket).await?;
    info!(seat = %seat, "Expired reservation released");
    Ok(true)
}

async fn lock_existing<Sc: TicketScope>(scope: &mut Sc, seat: &SeatLocation) -> BookingResult<Ticket> {
    scope
        .lock_ticket(seat)
        .await?
        .ok_or_else(|| BookingError::SeatNotFound(seat.to_string()))
}

/// Seat to operate on, plus the booking id it was found by, if any.
/// `None` when a booking id matches no ticket.
async fn resolve_target<Sc: TicketScope>(
    scope: &mut Sc,
    target: &TicketTarget,
) -> BookingResult<Option<(SeatLocation, Option<BookingId>)>> {
    let booking_id = match target {
        TicketTarget::Seat(seat) => return Ok(Some((seat.clone(), None))),
        TicketTarget::Booking(booking_id) => booking_id,
    };

    let mut matches = scope.tickets_by_booking_id(booking_id).await?;
    match matches.len() {
        0 => Ok(None),
        1 => {
            let ticket = matches.remove(0);
            Ok(Some((ticket.id().clone(), Some(booking_id.clone()))))
        }
        n => Err(BookingError::UniquenessViolation {
            booking_id: booking_id.clone(),
            matches: n,
        }),
    }
}

/// The seat found by booking id may have been released or re-booked between
/// the lookup and the row lock.
fn still_matches(ticket: &Ticket, expected: Option<&BookingId>) -> bool {
    match expected {
        Some(expected) => ticket.booking_id() == Some(expected),
        None => true,
    }
}

fn not_found(target: &TicketTarget) -> BookingError {
    match target {
        TicketTarget::Seat(seat) => BookingError::NotReserved(seat.clone()),
        TicketTarget::Booking(booking_id) => BookingError::BookingNotFound(booking_id.clone()),
    }
}

fn report<T>(operation: &str, result: BookingResult<T>) -> BookingResult<T> {
    if let Err(err) = &result {
        match err.primary() {
            BookingError::UniquenessViolation { booking_id, matches } => {
                error!(operation, %booking_id, matches, "Booking id uniqueness violated");
            }
            primary if primary.is_domain() && err.rollback_failure().is_none() => {
                debug!(operation, error = %err, "Booking request refused");
            }
            _ => {
                error!(operation, error = %err, "Booking operation failed");
            }
        }
    }
    result
}
