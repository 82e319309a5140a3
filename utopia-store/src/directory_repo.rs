use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use utopia_core::repository::{FlightRepository, UserRepository};
use utopia_core::{Airport, Flight, StoreError, User};

use crate::db_error;

/// Flight and user lookups backed by the same database as the tickets.
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i32,
    flight_number: i32,
    departure_code: String,
    departure_name: String,
    departure_date: DateTime<Utc>,
    destination_code: String,
    destination_name: String,
    arrival_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: Option<String>,
    display_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

#[async_trait]
impl FlightRepository for PostgresDirectory {
    async fn find_by_flight_number(&self, flight_number: i32) -> Result<Option<Flight>, StoreError> {
        let row = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT
                f.id, f.flight_number,
                d.code AS departure_code, d.name AS departure_name, f.departure_date,
                a.code AS destination_code, a.name AS destination_name, f.arrival_date
            FROM flights f
            JOIN airports d ON d.code = f.departure
            JOIN airports a ON a.code = f.destination
            WHERE f.flight_number = $1
            ORDER BY f.id
            LIMIT 1
            "#,
        )
        .bind(flight_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|row| Flight {
            id: row.id,
            flight_number: row.flight_number,
            departure_airport: Airport {
                code: row.departure_code,
                name: row.departure_name,
            },
            departure_date: row.departure_date,
            destination: Airport {
                code: row.destination_code,
                name: row.destination_name,
            },
            arrival_date: row.arrival_date,
        }))
    }
}

#[async_trait]
impl UserRepository for PostgresDirectory {
    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, display_name, email, phone FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|row| User {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            email: row.email,
            phone: row.phone,
        }))
    }
}
