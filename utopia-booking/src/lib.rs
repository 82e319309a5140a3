pub mod scope;
pub mod service;
pub mod expiry;

pub use expiry::{ExpirySweeper, SweepReport};
pub use service::{ReservationService, TicketTarget};
