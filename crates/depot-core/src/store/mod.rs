//! Transit data access: the tables behind the capability handlers and the
//! risk metric consulted by the consequence evaluator.

use async_trait::async_trait;
use thiserror::Error;

pub use depot_tools::result::{RouteRow, StopRow, TripRow, VehicleRow};

mod memory;
mod sqlite;

pub use memory::MemoryTransitStore;
pub use sqlite::SqliteTransitStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Migration error: {message}")]
    Migration { message: String },

    #[error("Store lock poisoned: {message}")]
    LockPoisoned { message: String },
}

impl StoreError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    pub fn lock_poisoned(message: impl Into<String>) -> Self {
        Self::LockPoisoned {
            message: message.into(),
        }
    }
}

/// Table operations the transit capabilities are built on.
#[async_trait]
pub trait TransitStore: Send + Sync {
    async fn list_routes(&self) -> Result<Vec<RouteRow>, StoreError>;

    /// Stops of a path, ordered by position.
    async fn stops_for_path(&self, path_id: &str) -> Result<Vec<StopRow>, StoreError>;

    async fn trip_details(&self, trip_id: &str) -> Result<Option<TripRow>, StoreError>;

    async fn todays_trips(&self) -> Result<Vec<TripRow>, StoreError>;

    /// Vehicles without a current deployment.
    async fn unassigned_vehicles(&self) -> Result<Vec<VehicleRow>, StoreError>;

    async fn create_stop(&self, name: &str, lat: f64, lon: f64) -> Result<StopRow, StoreError>;

    /// Returns the new deployment id; also marks the trip scheduled.
    async fn assign_vehicle(
        &self,
        trip_id: &str,
        vehicle_id: &str,
        driver_id: &str,
    ) -> Result<String, StoreError>;

    /// Returns the number of deployments removed.
    async fn remove_vehicle(&self, trip_id: &str) -> Result<u64, StoreError>;

    /// Booking percentage for a trip; `None` when the trip is not tracked.
    async fn booking_load(&self, trip_id: &str) -> Result<Option<f64>, StoreError>;

    /// Keyword search over operations documents, best matches first.
    async fn search_documents(&self, query: &str, limit: u32) -> Result<Vec<String>, StoreError>;
}

/// Read-only risk lookup used by the consequence evaluator. The transit
/// stores implement it over `booking_load`.
#[async_trait]
pub trait RiskSource: Send + Sync {
    async fn get_risk(&self, entity_id: &str) -> Result<Option<f64>, StoreError>;
}
