use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use utopia_core::repository::{TicketScope, TicketStore};
use utopia_core::{BookingId, FlightRef, SeatLocation, StoreError, Ticket, TicketColumns, UserRef};

use crate::db_error;

const TICKET_COLUMNS: &str = r#"
    t.flight_id, f.flight_number, t.seat_row, t.seat, t.class,
    t.reserver, t.price, t.reservation_timeout, t.booking_id
"#;

pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row as selected by [`TICKET_COLUMNS`].
#[derive(sqlx::FromRow)]
struct TicketRow {
    flight_id: i32,
    flight_number: i32,
    seat_row: i32,
    seat: String,
    class: i32,
    reserver: Option<i32>,
    price: Option<i32>,
    reservation_timeout: Option<DateTime<Utc>>,
    booking_id: Option<String>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let flight = FlightRef {
            id: row.flight_id,
            flight_number: row.flight_number,
        };
        let id = SeatLocation::new(flight, row.seat_row, row.seat)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ticket::try_from(TicketColumns {
            id,
            seat_class: row.class,
            reserver: row.reserver.map(|id| UserRef { id }),
            price: row.price,
            reservation_timeout: row.reservation_timeout,
            booking_id: row.booking_id.map(BookingId::from),
        })
    }
}

#[derive(sqlx::FromRow)]
struct SeatKeyRow {
    flight_id: i32,
    flight_number: i32,
    seat_row: i32,
    seat: String,
}

#[async_trait]
impl TicketStore for PostgresTicketStore {
    type Scope = PostgresTicketScope;

    async fn begin(&self) -> Result<Self::Scope, StoreError> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(PostgresTicketScope { tx })
    }

    async fn find_ticket(&self, seat: &SeatLocation) -> Result<Option<Ticket>, StoreError> {
        let query = format!(
            "SELECT {} FROM tickets t JOIN flights f ON f.id = t.flight_id \
             WHERE t.flight_id = $1 AND t.seat_row = $2 AND t.seat = $3",
            TICKET_COLUMNS
        );
        let row = sqlx::query_as::<_, TicketRow>(&query)
            .bind(seat.flight().id)
            .bind(seat.row())
            .bind(seat.seat())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(Ticket::try_from).transpose()
    }

    async fn expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeatLocation>, StoreError> {
        let rows = sqlx::query_as::<_, SeatKeyRow>(
            r#"
            SELECT t.flight_id, f.flight_number, t.seat_row, t.seat
            FROM tickets t JOIN flights f ON f.id = t.flight_id
            WHERE t.reservation_timeout IS NOT NULL AND t.reservation_timeout <= $1
            ORDER BY t.reservation_timeout
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(|row| {
                let flight = FlightRef {
                    id: row.flight_id,
                    flight_number: row.flight_number,
                };
                SeatLocation::new(flight, row.seat_row, row.seat)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))
            })
            .collect()
    }
}

/// A single database transaction. Row locks taken with `SELECT ... FOR UPDATE`
/// are held until commit or rollback.
pub struct PostgresTicketScope {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TicketScope for PostgresTicketScope {
    async fn lock_ticket(&mut self, seat: &SeatLocation) -> Result<Option<Ticket>, StoreError> {
        let query = format!(
            "SELECT {} FROM tickets t JOIN flights f ON f.id = t.flight_id \
             WHERE t.flight_id = $1 AND t.seat_row = $2 AND t.seat = $3 \
             FOR UPDATE OF t",
            TICKET_COLUMNS
        );
        let row = sqlx::query_as::<_, TicketRow>(&query)
            .bind(seat.flight().id)
            .bind(seat.row())
            .bind(seat.seat())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.map(Ticket::try_from).transpose()
    }

    async fn tickets_by_booking_id(
        &mut self,
        booking_id: &BookingId,
    ) -> Result<Vec<Ticket>, StoreError> {
        let query = format!(
            "SELECT {} FROM tickets t JOIN flights f ON f.id = t.flight_id \
             WHERE t.booking_id = $1",
            TICKET_COLUMNS
        );
        let rows = sqlx::query_as::<_, TicketRow>(&query)
            .bind(booking_id.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(Ticket::try_from).collect()
    }

    async fn persist_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError> {
        let columns = ticket.columns();
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET reserver = $4, price = $5, reservation_timeout = $6, booking_id = $7
            WHERE flight_id = $1 AND seat_row = $2 AND seat = $3
            "#,
        )
        .bind(columns.id.flight().id)
        .bind(columns.id.row())
        .bind(columns.id.seat())
        .bind(columns.reserver.map(|user| user.id))
        .bind(columns.price)
        .bind(columns.reservation_timeout)
        .bind(columns.booking_id.as_ref().map(|id| id.as_str()))
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow(columns.id.to_string()));
        }
        debug!("Persisted ticket {}", columns.id);
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_error)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(db_error)
    }
}
