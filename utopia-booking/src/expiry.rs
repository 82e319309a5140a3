use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use utopia_core::repository::{FlightRepository, TicketStore, UserRepository};
use utopia_core::BookingResult;

use crate::service::ReservationService;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub released: usize,
    /// Paid, re-booked or already released by the time the sweeper got to it.
    pub skipped: usize,
    pub failed: usize,
}

/// Batch job releasing unpaid reservations past their deadline.
///
/// It goes through the same service operations as any other caller, one
/// scope per ticket.
pub struct ExpirySweeper<S, D> {
    service: Arc<ReservationService<S, D>>,
    interval: Duration,
}

impl<S, D> ExpirySweeper<S, D>
where
    S: TicketStore,
    D: FlightRepository + UserRepository,
{
    pub fn new(service: Arc<ReservationService<S, D>>, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub async fn sweep_once(&self, now: DateTime<Utc>) -> BookingResult<SweepReport> {
        let mut report = SweepReport::default();

        for seat in self.service.expired_reservations(now).await? {
            match self.service.release_if_expired(&seat, now).await {
                Ok(true) => report.released += 1,
                Ok(false) => report.skipped += 1,
                Err(e) if e.is_domain() => report.skipped += 1,
                Err(_) => report.failed += 1,
            }
        }

        if report.released > 0 || report.failed > 0 {
            info!(
                released = report.released,
                skipped = report.skipped,
                failed = report.failed,
                "Expiry sweep finished"
            );
        }
        Ok(report)
    }

    pub async fn run(self) {
        info!("Expiry sweeper started, every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once(Utc::now()).await {
                error!("Expiry sweep failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use utopia_core::{FlightRef, SeatClass, SeatLocation, Ticket, TicketStatus, UserRef};
    use utopia_store::app_config::BookingRules;
    use utopia_store::{MemoryDirectory, MemoryTicketStore};

    use crate::service::TicketTarget;

    fn seat(label: &str) -> SeatLocation {
        SeatLocation::new(FlightRef { id: 2, flight_number: 152 }, 4, label).unwrap()
    }

    #[tokio::test]
    async fn test_sweep_releases_only_expired_unpaid() {
        let store = MemoryTicketStore::new();
        for label in ["A", "B", "C", "D"] {
            store.insert(Ticket::new(seat(label), SeatClass::Business)).await;
        }
        let service = Arc::new(ReservationService::new(
            Arc::new(store.clone()),
            Arc::new(MemoryDirectory::new()),
            &BookingRules::default(),
        )
        .unwrap());
        let now = Utc::now();
        let past = now - ChronoDuration::minutes(5);

        service.book_seat(&seat("A"), UserRef { id: 1 }, Some(past)).await.unwrap();
        service.book_seat(&seat("B"), UserRef { id: 2 }, Some(past)).await.unwrap();
        service
            .accept_payment(&TicketTarget::Seat(seat("B")), 250)
            .await
            .unwrap();
        service
            .book_seat(&seat("C"), UserRef { id: 3 }, Some(now + ChronoDuration::minutes(5)))
            .await
            .unwrap();

        let sweeper = ExpirySweeper::new(service.clone(), Duration::from_secs(60));
        let report = sweeper.sweep_once(now).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                released: 1,
                skipped: 0,
                failed: 0
            }
        );

        let status = |label: &'static str| {
            let store = store.clone();
            async move { store.find_ticket(&seat(label)).await.unwrap().unwrap().status() }
        };
        assert_eq!(status("A").await, TicketStatus::Unbooked);
        assert_eq!(status("B").await, TicketStatus::Paid);
        assert_eq!(status("C").await, TicketStatus::Reserved);
        assert_eq!(status("D").await, TicketStatus::Unbooked);

        assert_eq!(sweeper.sweep_once(now).await.unwrap(), SweepReport::default());
    }
}
