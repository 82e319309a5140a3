use tracing::error;
use utopia_core::repository::{TicketScope, TicketStore};
use utopia_core::{BookingError, BookingResult};

/// Opens the scope for one operation. Scopes are never shared between calls.
pub async fn open<S: TicketStore>(store: &S) -> BookingResult<S::Scope> {
    store.begin().await.map_err(BookingError::Transaction)
}

/// Ends a scope with the operation's outcome.
///
/// Success commits exactly once. Failure rolls back before the error is
/// returned; a rollback that fails too is attached to the original error.
pub async fn finish<Sc: TicketScope, T>(scope: Sc, outcome: BookingResult<T>) -> BookingResult<T> {
    match outcome {
        Ok(value) => {
            scope.commit().await.map_err(BookingError::Transaction)?;
            Ok(value)
        }
        Err(err) => match scope.rollback().await {
            Ok(()) => Err(err),
            Err(rollback) => {
                error!(error = %err, rollback = %rollback, "Rollback failed");
                Err(err.with_rollback_failure(rollback))
            }
        },
    }
}
