use std::sync::Arc;
use utopia_booking::ReservationService;

pub struct AppState<S, D> {
    pub service: Arc<ReservationService<S, D>>,
}

impl<S, D> AppState<S, D> {
    pub fn new(service: Arc<ReservationService<S, D>>) -> Self {
        Self { service }
    }
}

// Manual impl: the store and directory themselves need not be Clone.
impl<S, D> Clone for AppState<S, D> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}
