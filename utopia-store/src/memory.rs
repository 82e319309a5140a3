use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use utopia_core::repository::{FlightRepository, TicketScope, TicketStore, UserRepository};
use utopia_core::{BookingId, Flight, SeatLocation, StoreError, Ticket, User};

/// One seat: the last committed ticket plus the lock a scope takes to change it.
struct SeatRow {
    committed: RwLock<Ticket>,
    writer: Arc<Mutex<()>>,
}

/// In-process ticket store with per-seat locking.
///
/// Reads see committed tickets and never wait on a writer. A scope that locks
/// a seat holds it until commit or rollback, so concurrent operations on the
/// same seat run one after the other while different seats proceed in parallel.
#[derive(Clone, Default)]
pub struct MemoryTicketStore {
    rows: Arc<RwLock<HashMap<SeatLocation, Arc<SeatRow>>>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a seat, replacing any existing row for the same location.
    pub async fn insert(&self, ticket: Ticket) {
        let row = Arc::new(SeatRow {
            committed: RwLock::new(ticket.clone()),
            writer: Arc::new(Mutex::new(())),
        });
        self.rows.write().await.insert(ticket.id().clone(), row);
    }

    async fn row(&self, seat: &SeatLocation) -> Option<Arc<SeatRow>> {
        self.rows.read().await.get(seat).cloned()
    }

    async fn all_rows(&self) -> Vec<Arc<SeatRow>> {
        self.rows.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    type Scope = MemoryTicketScope;

    async fn begin(&self) -> Result<Self::Scope, StoreError> {
        Ok(MemoryTicketScope {
            store: self.clone(),
            held: HashMap::new(),
        })
    }

    async fn find_ticket(&self, seat: &SeatLocation) -> Result<Option<Ticket>, StoreError> {
        match self.row(seat).await {
            Some(row) => Ok(Some(row.committed.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeatLocation>, StoreError> {
        let mut expired = Vec::new();
        for row in self.all_rows().await {
            let ticket = row.committed.read().await;
            if let Some(timeout) = ticket.reservation_timeout().filter(|t| *t <= now) {
                expired.push((timeout, ticket.id().clone()));
            }
        }
        expired.sort_by_key(|(timeout, _)| *timeout);
        Ok(expired.into_iter().map(|(_, seat)| seat).collect())
    }
}

struct HeldRow {
    row: Arc<SeatRow>,
    _guard: OwnedMutexGuard<()>,
    staged: Option<Ticket>,
}

impl HeldRow {
    async fn current(&self) -> Ticket {
        match &self.staged {
            Some(ticket) => ticket.clone(),
            None => self.row.committed.read().await.clone(),
        }
    }
}

/// Unit of work over a [`MemoryTicketStore`]. Writes are staged and only
/// become visible on commit.
pub struct MemoryTicketScope {
    store: MemoryTicketStore,
    held: HashMap<SeatLocation, HeldRow>,
}

#[async_trait]
impl TicketScope for MemoryTicketScope {
    async fn lock_ticket(&mut self, seat: &SeatLocation) -> Result<Option<Ticket>, StoreError> {
        if let Some(held) = self.held.get(seat) {
            return Ok(Some(held.current().await));
        }
        let Some(row) = self.store.row(seat).await else {
            return Ok(None);
        };

        let guard = row.writer.clone().lock_owned().await;
        let current = row.committed.read().await.clone();
        self.held.insert(
            seat.clone(),
            HeldRow {
                row,
                _guard: guard,
                staged: None,
            },
        );
        Ok(Some(current))
    }

    async fn tickets_by_booking_id(
        &mut self,
        booking_id: &BookingId,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut matches = Vec::new();
        for row in self.store.all_rows().await {
            let committed = row.committed.read().await.clone();
            let ticket = match self.held.get(committed.id()) {
                Some(held) => held.current().await,
                None => committed,
            };
            if ticket.booking_id() == Some(booking_id) {
                matches.push(ticket);
            }
        }
        Ok(matches)
    }

    async fn persist_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError> {
        if !self.held.contains_key(ticket.id()) && self.lock_ticket(ticket.id()).await?.is_none() {
            return Err(StoreError::MissingRow(ticket.id().to_string()));
        }
        match self.held.get_mut(ticket.id()) {
            Some(held) => {
                held.staged = Some(ticket.clone());
                Ok(())
            }
            None => Err(StoreError::MissingRow(ticket.id().to_string())),
        }
    }

    async fn commit(self) -> Result<(), StoreError> {
        for held in self.held.into_values() {
            if let Some(ticket) = held.staged {
                *held.row.committed.write().await = ticket;
            }
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-process flight and user lookups.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    flights: Arc<RwLock<Vec<Flight>>>,
    users: Arc<RwLock<HashMap<i32, User>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_flight(&self, flight: Flight) {
        self.flights.write().await.push(flight);
    }

    pub async fn add_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl FlightRepository for MemoryDirectory {
    async fn find_by_flight_number(&self, flight_number: i32) -> Result<Option<Flight>, StoreError> {
        let flights = self.flights.read().await;
        Ok(flights
            .iter()
            .find(|flight| flight.flight_number == flight_number)
            .cloned())
    }
}

#[async_trait]
impl UserRepository for MemoryDirectory {
    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}
