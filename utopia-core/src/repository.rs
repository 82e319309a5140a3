use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::booking_id::BookingId;
use crate::models::{Flight, SeatLocation, User};
use crate::ticket::Ticket;
use crate::StoreError;

/// Durable ticket storage, keyed by seat.
///
/// Every mutation goes through a [`TicketScope`] obtained from [`TicketStore::begin`].
/// The plain reads here see committed state only and never wait on row locks.
#[async_trait]
pub trait TicketStore: Send + Sync {
    type Scope: TicketScope;

    /// Opens a new unit of work. Each booking operation opens its own.
    async fn begin(&self) -> Result<Self::Scope, StoreError>;

    async fn find_ticket(&self, seat: &SeatLocation) -> Result<Option<Ticket>, StoreError>;

    /// Seats holding a pending reservation whose deadline is at or before `now`.
    async fn expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeatLocation>, StoreError>;
}

/// One unit of work against a [`TicketStore`].
///
/// A ticket returned by `lock_ticket` stays locked against other scopes until
/// this scope commits or rolls back. Dropping a scope without committing
/// discards its writes.
#[async_trait]
pub trait TicketScope: Send {
    /// Reads the current committed ticket and locks its row for the rest of the scope.
    async fn lock_ticket(&mut self, seat: &SeatLocation) -> Result<Option<Ticket>, StoreError>;

    /// All tickets currently carrying `booking_id`. Does not lock.
    async fn tickets_by_booking_id(
        &mut self,
        booking_id: &BookingId,
    ) -> Result<Vec<Ticket>, StoreError>;

    async fn persist_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Read-only lookup of flights by their public number.
#[async_trait]
pub trait FlightRepository: Send + Sync {
    /// First flight carrying `flight_number`, if any.
    async fn find_by_flight_number(&self, flight_number: i32) -> Result<Option<Flight>, StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError>;
}
