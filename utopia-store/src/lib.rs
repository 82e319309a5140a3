pub mod app_config;
pub mod database;
pub mod ticket_repo;
pub mod directory_repo;
pub mod memory;

pub use database::DbClient;
pub use directory_repo::PostgresDirectory;
pub use memory::{MemoryDirectory, MemoryTicketStore};
pub use ticket_repo::PostgresTicketStore;

use utopia_core::StoreError;

pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}
