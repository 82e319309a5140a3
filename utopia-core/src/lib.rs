pub mod models;
pub mod ticket;
pub mod booking_id;
pub mod repository;

pub use booking_id::BookingId;
pub use models::{Airport, Flight, FlightRef, SeatClass, SeatLocation, User, UserRef};
pub use ticket::{Release, Ticket, TicketColumns, TicketStatus};

/// Failures of the storage backend behind a ticket store or directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("No ticket row for seat {0}")]
    MissingRow(String),
    #[error("Stored ticket is inconsistent: {0}")]
    Corrupt(String),
}

/// Every way a booking operation can fail.
///
/// The first group are ordinary business outcomes the caller is expected to
/// handle. `UniquenessViolation` and everything after it are server-side faults.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Seat {0} is already reserved")]
    AlreadyReserved(SeatLocation),
    #[error("Seat {0} is not reserved")]
    NotReserved(SeatLocation),
    #[error("Ticket already paid at {paid}, refusing payment of {offered}")]
    PaymentConflict { paid: i32, offered: i32 },
    #[error("Seat {0} has already been paid for")]
    AlreadyPaid(SeatLocation),
    #[error("No such seat: {0}")]
    SeatNotFound(String),
    #[error("No booking with id {0}")]
    BookingNotFound(BookingId),
    #[error("No such user: {0}")]
    UserNotFound(i32),
    #[error("Invalid seat: {0}")]
    InvalidSeat(String),
    #[error("Booking id {booking_id} matches {matches} active tickets")]
    UniquenessViolation { booking_id: BookingId, matches: usize },
    #[error("Invalid ticket transition: {0}")]
    InvalidTransition(String),
    #[error("Invalid booking rules: {0}")]
    Configuration(String),
    #[error("Storage failure: {0}")]
    Storage(#[source] StoreError),
    #[error("Transaction failure: {0}")]
    Transaction(#[source] StoreError),
    #[error("{primary} (rollback also failed: {rollback})")]
    RollbackFailed {
        #[source]
        primary: Box<BookingError>,
        rollback: StoreError,
    },
}

impl BookingError {
    /// Expected outcomes that are returned to the caller without being treated as failures.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            BookingError::AlreadyReserved(_)
                | BookingError::NotReserved(_)
                | BookingError::PaymentConflict { .. }
                | BookingError::AlreadyPaid(_)
                | BookingError::SeatNotFound(_)
                | BookingError::BookingNotFound(_)
                | BookingError::UserNotFound(_)
                | BookingError::InvalidSeat(_)
        )
    }

    pub fn is_fault(&self) -> bool {
        !self.is_domain()
    }

    /// Attaches a failed rollback to this error. The original error stays
    /// reachable through [`BookingError::primary`].
    pub fn with_rollback_failure(self, rollback: StoreError) -> Self {
        BookingError::RollbackFailed {
            primary: Box::new(self),
            rollback,
        }
    }

    /// The error that aborted the operation, looking through an attached rollback failure.
    pub fn primary(&self) -> &BookingError {
        match self {
            BookingError::RollbackFailed { primary, .. } => primary.primary(),
            other => other,
        }
    }

    pub fn rollback_failure(&self) -> Option<&StoreError> {
        match self {
            BookingError::RollbackFailed { rollback, .. } => Some(rollback),
            _ => None,
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        BookingError::Storage(err)
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
