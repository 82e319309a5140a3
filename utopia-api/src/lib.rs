use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utopia_core::repository::{FlightRepository, TicketStore, UserRepository};

pub mod bookings;
pub mod error;
pub mod state;

pub use state::AppState;

pub fn app<S, D>(state: AppState<S, D>) -> Router
where
    S: TicketStore + 'static,
    D: FlightRepository + UserRepository + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .merge(bookings::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
