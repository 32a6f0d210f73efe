use async_trait::async_trait;
use sqlx::{
    Row,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};
use std::path::Path;
use std::str::FromStr;

use super::{RouteRow, StopRow, StoreError, TransitStore, TripRow, VehicleRow};

pub struct SqliteTransitStore {
    pool: SqlitePool,
}

impl SqliteTransitStore {
    pub async fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::connection(format!("Failed to create directory: {e}")))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| StoreError::connection(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        Self::with_options(options).await
    }

    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::connection(format!("Invalid SQLite path: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        Self::with_options(options).await
    }

    async fn with_options(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::connection(format!("Failed to connect to SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS routes (
                route_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                origin TEXT NOT NULL,
                destination TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS stops (
                stop_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS path_stops (
                path_id TEXT NOT NULL,
                stop_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (path_id, position),
                FOREIGN KEY (stop_id) REFERENCES stops(stop_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS daily_trips (
                trip_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                route_id TEXT NOT NULL,
                live_status TEXT NOT NULL DEFAULT 'Unassigned',
                booking_status_percentage REAL NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS vehicles (
                vehicle_id TEXT PRIMARY KEY,
                license_plate TEXT NOT NULL,
                vehicle_type TEXT NOT NULL,
                capacity INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS deployments (
                deployment_id TEXT PRIMARY KEY,
                trip_id TEXT NOT NULL,
                vehicle_id TEXT NOT NULL,
                driver_id TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_deployments_trip
            ON deployments(trip_id)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                doc_id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                body TEXT NOT NULL
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::migration(format!("Failed to run migration: {e}")))?;
        }

        Ok(())
    }

    /// Populate a handful of demo rows so a fresh database is usable.
    /// No-op when routes already exist.
    pub async fn seed_demo(&self) -> Result<(), StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM routes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::database(format!("Failed to count routes: {e}")))?;
        if count > 0 {
            return Ok(());
        }

        let statements = [
            "INSERT INTO routes (route_id, name, origin, destination) VALUES \
             ('route_1', 'Harbor Express', 'Harbor Terminal', 'Central Station'), \
             ('route_2', 'Airport Shuttle', 'Central Station', 'Airport')",
            "INSERT INTO stops (stop_id, name, latitude, longitude) VALUES \
             ('stop_a', 'Harbor Terminal', 51.9225, 4.47917), \
             ('stop_b', 'Market Square', 51.9244, 4.4777), \
             ('stop_c', 'Central Station', 51.925, 4.4689)",
            "INSERT INTO path_stops (path_id, stop_id, position) VALUES \
             ('path_1', 'stop_a', 0), ('path_1', 'stop_b', 1), ('path_1', 'stop_c', 2)",
            "INSERT INTO daily_trips (trip_id, display_name, route_id, live_status, booking_status_percentage) VALUES \
             ('trip_1', 'Harbor - 06:30', 'route_1', 'Scheduled', 60), \
             ('trip_2', 'Harbor - 09:00', 'route_1', 'Unassigned', 0), \
             ('trip_3', 'Airport - 07:15', 'route_2', 'Scheduled', 25)",
            "INSERT INTO vehicles (vehicle_id, license_plate, vehicle_type, capacity) VALUES \
             ('veh_1', 'BX-401-K', 'bus', 52), \
             ('veh_2', 'BX-318-T', 'bus', 52), \
             ('veh_3', 'CB-102-R', 'cab', 6)",
            "INSERT INTO deployments (deployment_id, trip_id, vehicle_id, driver_id) VALUES \
             ('dep_1', 'trip_1', 'veh_1', 'drv_1'), \
             ('dep_2', 'trip_3', 'veh_2', 'drv_2')",
            "INSERT INTO documents (title, body) VALUES \
             ('Assigning vehicles', 'To deploy a vehicle, pick an unassigned vehicle and a driver, then assign them to the trip. The trip moves to Scheduled.'), \
             ('Removing vehicles', 'Removing a vehicle from a booked trip cancels its trip-sheet and existing bookings. The system asks for confirmation first.')",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::database(format!("Failed to seed demo data: {e}")))?;
        }

        Ok(())
    }
}

fn route_from_row(row: &sqlx::sqlite::SqliteRow) -> RouteRow {
    RouteRow {
        route_id: row.get("route_id"),
        name: row.get("name"),
        origin: row.get("origin"),
        destination: row.get("destination"),
        active: row.get::<i64, _>("active") != 0,
    }
}

fn trip_from_row(row: &sqlx::sqlite::SqliteRow) -> TripRow {
    TripRow {
        trip_id: row.get("trip_id"),
        display_name: row.get("display_name"),
        route_id: row.get("route_id"),
        live_status: row.get("live_status"),
        booking_status_percentage: row.get("booking_status_percentage"),
    }
}

#[async_trait]
impl TransitStore for SqliteTransitStore {
    async fn list_routes(&self) -> Result<Vec<RouteRow>, StoreError> {
        let rows = sqlx::query("SELECT * FROM routes WHERE active = 1 ORDER BY route_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::database(format!("Failed to list routes: {e}")))?;
        Ok(rows.iter().map(route_from_row).collect())
    }

    async fn stops_for_path(&self, path_id: &str) -> Result<Vec<StopRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT s.stop_id, s.name, s.latitude, s.longitude
            FROM path_stops p
            JOIN stops s ON s.stop_id = p.stop_id
            WHERE p.path_id = ?1
            ORDER BY p.position ASC
            "#,
        )
        .bind(path_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("Failed to load path stops: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| StopRow {
                stop_id: row.get("stop_id"),
                name: row.get("name"),
                latitude: row.get("latitude"),
                longitude: row.get("longitude"),
            })
            .collect())
    }

    async fn trip_details(&self, trip_id: &str) -> Result<Option<TripRow>, StoreError> {
        let row = sqlx::query("SELECT * FROM daily_trips WHERE trip_id = ?1")
            .bind(trip_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::database(format!("Failed to load trip: {e}")))?;
        Ok(row.as_ref().map(trip_from_row))
    }

    async fn todays_trips(&self) -> Result<Vec<TripRow>, StoreError> {
        let rows = sqlx::query("SELECT * FROM daily_trips ORDER BY trip_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::database(format!("Failed to list trips: {e}")))?;
        Ok(rows.iter().map(trip_from_row).collect())
    }

    async fn unassigned_vehicles(&self) -> Result<Vec<VehicleRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT v.vehicle_id, v.license_plate, v.vehicle_type, v.capacity
            FROM vehicles v
            WHERE NOT EXISTS (
                SELECT 1 FROM deployments d WHERE d.vehicle_id = v.vehicle_id
            )
            ORDER BY v.vehicle_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("Failed to list vehicles: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| VehicleRow {
                vehicle_id: row.get("vehicle_id"),
                license_plate: row.get("license_plate"),
                vehicle_type: row.get("vehicle_type"),
                capacity: row.get("capacity"),
            })
            .collect())
    }

    async fn create_stop(&self, name: &str, lat: f64, lon: f64) -> Result<StopRow, StoreError> {
        let stop_id = format!("stop_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);

        sqlx::query("INSERT INTO stops (stop_id, name, latitude, longitude) VALUES (?1, ?2, ?3, ?4)")
            .bind(&stop_id)
            .bind(name)
            .bind(lat)
            .bind(lon)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::database(format!("Failed to create stop: {e}")))?;

        Ok(StopRow {
            stop_id,
            name: name.to_string(),
            latitude: lat,
            longitude: lon,
        })
    }

    async fn assign_vehicle(
        &self,
        trip_id: &str,
        vehicle_id: &str,
        driver_id: &str,
    ) -> Result<String, StoreError> {
        let deployment_id = format!("dep_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            "INSERT INTO deployments (deployment_id, trip_id, vehicle_id, driver_id) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&deployment_id)
        .bind(trip_id)
        .bind(vehicle_id)
        .bind(driver_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::database(format!("Failed to insert deployment: {e}")))?;

        sqlx::query("UPDATE daily_trips SET live_status = 'Scheduled' WHERE trip_id = ?1")
            .bind(trip_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::database(format!("Failed to update trip status: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::database(format!("Failed to commit assignment: {e}")))?;

        Ok(deployment_id)
    }

    async fn remove_vehicle(&self, trip_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM deployments WHERE trip_id = ?1")
            .bind(trip_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::database(format!("Failed to remove deployments: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn booking_load(&self, trip_id: &str) -> Result<Option<f64>, StoreError> {
        let value: Option<f64> = sqlx::query_scalar(
            "SELECT booking_status_percentage FROM daily_trips WHERE trip_id = ?1",
        )
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("Failed to load booking status: {e}")))?;
        Ok(value)
    }

    async fn search_documents(&self, query: &str, limit: u32) -> Result<Vec<String>, StoreError> {
        let pattern = format!("%{}%", query.trim());
        let rows = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE body LIKE ?1 OR title LIKE ?1
            ORDER BY doc_id ASC
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("Failed to search documents: {e}")))?;

        Ok(rows.iter().map(|row| row.get("body")).collect())
    }
}

#[async_trait]
impl super::RiskSource for SqliteTransitStore {
    async fn get_risk(&self, entity_id: &str) -> Result<Option<f64>, StoreError> {
        self.booking_load(entity_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_then_query_trips_and_risk() {
        let store = SqliteTransitStore::new_in_memory().await.unwrap();
        store.seed_demo().await.unwrap();

        let trips = store.todays_trips().await.unwrap();
        assert_eq!(trips.len(), 3);

        assert_eq!(store.booking_load("trip_1").await.unwrap(), Some(60.0));
        assert_eq!(store.booking_load("trip_2").await.unwrap(), Some(0.0));
        assert_eq!(store.booking_load("trip_missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_vehicle_clears_deployments() {
        let store = SqliteTransitStore::new_in_memory().await.unwrap();
        store.seed_demo().await.unwrap();

        assert_eq!(store.remove_vehicle("trip_1").await.unwrap(), 1);
        assert_eq!(store.remove_vehicle("trip_1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn assignment_marks_trip_scheduled_and_claims_vehicle() {
        let store = SqliteTransitStore::new_in_memory().await.unwrap();
        store.seed_demo().await.unwrap();

        let free_before = store.unassigned_vehicles().await.unwrap();
        assert!(free_before.iter().any(|v| v.vehicle_id == "veh_3"));

        store
            .assign_vehicle("trip_2", "veh_3", "drv_3")
            .await
            .unwrap();

        let trip = store.trip_details("trip_2").await.unwrap().unwrap();
        assert_eq!(trip.live_status, "Scheduled");

        let free_after = store.unassigned_vehicles().await.unwrap();
        assert!(!free_after.iter().any(|v| v.vehicle_id == "veh_3"));
    }

    #[tokio::test]
    async fn stops_come_back_in_path_order() {
        let store = SqliteTransitStore::new_in_memory().await.unwrap();
        store.seed_demo().await.unwrap();

        let stops = store.stops_for_path("path_1").await.unwrap();
        let ids: Vec<_> = stops.iter().map(|s| s.stop_id.as_str()).collect();
        assert_eq!(ids, vec!["stop_a", "stop_b", "stop_c"]);
    }

    #[tokio::test]
    async fn document_search_is_keyword_based() {
        let store = SqliteTransitStore::new_in_memory().await.unwrap();
        store.seed_demo().await.unwrap();

        let hits = store.search_documents("confirmation", 2).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("confirmation"));

        let none = store.search_documents("zeppelin", 2).await.unwrap();
        assert!(none.is_empty());
    }
}
