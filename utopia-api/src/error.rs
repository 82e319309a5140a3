use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use utopia_core::BookingError;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    GoneError(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::GoneError(msg) => (StatusCode::GONE, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::AlreadyReserved(_)
            | BookingError::PaymentConflict { .. }
            | BookingError::AlreadyPaid(_) => AppError::ConflictError(message),
            BookingError::NotReserved(_) | BookingError::BookingNotFound(_) => {
                AppError::GoneError(message)
            }
            BookingError::SeatNotFound(_) | BookingError::UserNotFound(_) => {
                AppError::NotFoundError(message)
            }
            BookingError::InvalidSeat(_) => AppError::ValidationError(message),
            BookingError::UniquenessViolation { .. }
            | BookingError::InvalidTransition(_)
            | BookingError::Configuration(_)
            | BookingError::Storage(_)
            | BookingError::Transaction(_)
            | BookingError::RollbackFailed { .. } => AppError::InternalServerError(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utopia_core::{BookingId, FlightRef, SeatLocation, StoreError};

    fn status_of(err: BookingError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_booking_errors_map_to_status_codes() {
        let seat = SeatLocation::new(FlightRef { id: 1, flight_number: 152 }, 1, "A").unwrap();

        assert_eq!(status_of(BookingError::AlreadyReserved(seat.clone())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(BookingError::PaymentConflict { paid: 300, offered: 400 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(BookingError::AlreadyPaid(seat.clone())), StatusCode::CONFLICT);
        assert_eq!(status_of(BookingError::NotReserved(seat)), StatusCode::GONE);
        assert_eq!(
            status_of(BookingError::BookingNotFound(BookingId::from("x"))),
            StatusCode::GONE
        );
        assert_eq!(
            status_of(BookingError::SeatNotFound("152/9/Z".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BookingError::UniquenessViolation {
                booking_id: BookingId::from("x"),
                matches: 2
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(BookingError::Configuration("expiration_minutes".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(
                BookingError::Storage(StoreError::Database("boom".to_string()))
                    .with_rollback_failure(StoreError::Unavailable("gone".to_string()))
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
