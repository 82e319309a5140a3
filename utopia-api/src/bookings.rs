use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utopia_booking::TicketTarget;
use utopia_core::repository::{FlightRepository, TicketStore, UserRepository};
use utopia_core::{BookingId, SeatClass, Ticket};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub price: i32,
}

/// Ticket as clients see it. Who holds the reservation is never exposed.
#[derive(Debug, Serialize, Deserialize)]
pub struct TicketView {
    pub flight: i32,
    pub row: i32,
    pub seat: String,
    pub seat_class: SeatClass,
    pub price: Option<i32>,
    pub reservation_timeout: Option<DateTime<Utc>>,
    pub booking_id: Option<BookingId>,
    pub reserved: bool,
}

impl From<&Ticket> for TicketView {
    fn from(ticket: &Ticket) -> Self {
        Self {
            flight: ticket.id().flight().flight_number,
            row: ticket.id().row(),
            seat: ticket.id().seat().to_string(),
            seat_class: ticket.seat_class(),
            price: ticket.price(),
            reservation_timeout: ticket.reservation_timeout(),
            booking_id: ticket.booking_id().cloned(),
            reserved: ticket.is_reserved(),
        }
    }
}

pub fn routes<S, D>() -> Router<AppState<S, D>>
where
    S: TicketStore + 'static,
    D: FlightRepository + UserRepository + 'static,
{
    Router::new()
        .route(
            "/booking/book/{flight}/{row}/{seat}",
            post(book_seat::<S, D>).delete(cancel_by_seat::<S, D>),
        )
        .route("/booking/book/{booking_id}", delete(cancel_by_booking_id::<S, D>))
        .route("/booking/pay/{flight}/{row}/{seat}", put(pay_by_seat::<S, D>))
        .route("/booking/pay/{booking_id}", put(pay_by_booking_id::<S, D>))
        .route("/booking/ticket/{flight}/{row}/{seat}", get(get_ticket::<S, D>))
}

async fn book_seat<S, D>(
    State(state): State<AppState<S, D>>,
    Path((flight, row, seat)): Path<(i32, i32, String)>,
    Json(req): Json<BookRequest>,
) -> Result<(StatusCode, Json<TicketView>), AppError>
where
    S: TicketStore + 'static,
    D: FlightRepository + UserRepository + 'static,
{
    let location = state.service.locate_seat(flight, row, &seat).await?;
    let user = state.service.resolve_user(req.user_id).await?;
    let ticket = state.service.book_seat(&location, user, None).await?;

    info!("Seat {} reserved", location);
    Ok((StatusCode::CREATED, Json(TicketView::from(&ticket))))
}

async fn pay_by_seat<S, D>(
    State(state): State<AppState<S, D>>,
    Path((flight, row, seat)): Path<(i32, i32, String)>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<TicketView>, AppError>
where
    S: TicketStore + 'static,
    D: FlightRepository + UserRepository + 'static,
{
    let location = state.service.locate_seat(flight, row, &seat).await?;
    let ticket = state
        .service
        .accept_payment(&TicketTarget::Seat(location), req.price)
        .await?;
    Ok(Json(TicketView::from(&ticket)))
}

async fn pay_by_booking_id<S, D>(
    State(state): State<AppState<S, D>>,
    Path(booking_id): Path<String>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<TicketView>, AppError>
where
    S: TicketStore + 'static,
    D: FlightRepository + UserRepository + 'static,
{
    let target = TicketTarget::Booking(BookingId::from(booking_id));
    let ticket = state.service.accept_payment(&target, req.price).await?;
    Ok(Json(TicketView::from(&ticket)))
}

async fn cancel_by_seat<S, D>(
    State(state): State<AppState<S, D>>,
    Path((flight, row, seat)): Path<(i32, i32, String)>,
) -> Result<StatusCode, AppError>
where
    S: TicketStore + 'static,
    D: FlightRepository + UserRepository + 'static,
{
    let location = state.service.locate_seat(flight, row, &seat).await?;
    state
        .service
        .cancel_reservation(&TicketTarget::Seat(location))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_by_booking_id<S, D>(
    State(state): State<AppState<S, D>>,
    Path(booking_id): Path<String>,
) -> Result<StatusCode, AppError>
where
    S: TicketStore + 'static,
    D: FlightRepository + UserRepository + 'static,
{
    let target = TicketTarget::Booking(BookingId::from(booking_id));
    state.service.cancel_reservation(&target).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_ticket<S, D>(
    State(state): State<AppState<S, D>>,
    Path((flight, row, seat)): Path<(i32, i32, String)>,
) -> Result<Json<TicketView>, AppError>
where
    S: TicketStore + 'static,
    D: FlightRepository + UserRepository + 'static,
{
    let location = state.service.locate_seat(flight, row, &seat).await?;
    let ticket = state.service.get_ticket(&location).await?;
    Ok(Json(TicketView::from(&ticket)))
}
