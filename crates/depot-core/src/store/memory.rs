use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{RouteRow, StopRow, StoreError, TransitStore, TripRow, VehicleRow};

#[derive(Debug, Clone)]
struct Deployment {
    deployment_id: String,
    trip_id: String,
    vehicle_id: String,
    driver_id: String,
}

#[derive(Default)]
struct Inner {
    routes: Vec<RouteRow>,
    stops: Vec<StopRow>,
    path_stops: HashMap<String, Vec<String>>,
    trips: Vec<TripRow>,
    vehicles: Vec<VehicleRow>,
    deployments: Vec<Deployment>,
    documents: Vec<(String, String)>,
}

/// In-memory `TransitStore` for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryTransitStore {
    inner: RwLock<Inner>,
}

impl MemoryTransitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_route(&self, route: RouteRow) {
        self.write().routes.push(route);
    }

    pub fn insert_trip(&self, trip: TripRow) {
        self.write().trips.push(trip);
    }

    pub fn insert_vehicle(&self, vehicle: VehicleRow) {
        self.write().vehicles.push(vehicle);
    }

    pub fn insert_deployment(&self, trip_id: &str, vehicle_id: &str, driver_id: &str) {
        let deployment_id = format!("dep_{}", self.write().deployments.len() + 1);
        self.write().deployments.push(Deployment {
            deployment_id,
            trip_id: trip_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            driver_id: driver_id.to_string(),
        });
    }

    pub fn insert_document(&self, title: &str, body: &str) {
        self.write()
            .documents
            .push((title.to_string(), body.to_string()));
    }

    pub fn deployments_for(&self, trip_id: &str) -> usize {
        self.read()
            .deployments
            .iter()
            .filter(|d| d.trip_id == trip_id)
            .count()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TransitStore for MemoryTransitStore {
    async fn list_routes(&self) -> Result<Vec<RouteRow>, StoreError> {
        Ok(self
            .read()
            .routes
            .iter()
            .filter(|r| r.active)
            .cloned()
            .collect())
    }

    async fn stops_for_path(&self, path_id: &str) -> Result<Vec<StopRow>, StoreError> {
        let inner = self.read();
        let Some(stop_ids) = inner.path_stops.get(path_id) else {
            return Ok(Vec::new());
        };
        Ok(stop_ids
            .iter()
            .filter_map(|id| inner.stops.iter().find(|s| &s.stop_id == id).cloned())
            .collect())
    }

    async fn trip_details(&self, trip_id: &str) -> Result<Option<TripRow>, StoreError> {
        Ok(self
            .read()
            .trips
            .iter()
            .find(|t| t.trip_id == trip_id)
            .cloned())
    }

    async fn todays_trips(&self) -> Result<Vec<TripRow>, StoreError> {
        Ok(self.read().trips.clone())
    }

    async fn unassigned_vehicles(&self) -> Result<Vec<VehicleRow>, StoreError> {
        let inner = self.read();
        Ok(inner
            .vehicles
            .iter()
            .filter(|v| {
                !inner
                    .deployments
                    .iter()
                    .any(|d| d.vehicle_id == v.vehicle_id)
            })
            .cloned()
            .collect())
    }

    async fn create_stop(&self, name: &str, lat: f64, lon: f64) -> Result<StopRow, StoreError> {
        let stop = StopRow {
            stop_id: format!("stop_{}", self.read().stops.len() + 1),
            name: name.to_string(),
            latitude: lat,
            longitude: lon,
        };
        self.write().stops.push(stop.clone());
        Ok(stop)
    }

    async fn assign_vehicle(
        &self,
        trip_id: &str,
        vehicle_id: &str,
        driver_id: &str,
    ) -> Result<String, StoreError> {
        let mut inner = self.write();
        let deployment_id = format!("dep_{}", inner.deployments.len() + 1);
        inner.deployments.push(Deployment {
            deployment_id: deployment_id.clone(),
            trip_id: trip_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            driver_id: driver_id.to_string(),
        });
        if let Some(trip) = inner.trips.iter_mut().find(|t| t.trip_id == trip_id) {
            trip.live_status = "Scheduled".to_string();
        }
        Ok(deployment_id)
    }

    async fn remove_vehicle(&self, trip_id: &str) -> Result<u64, StoreError> {
        let mut inner = self.write();
        let before = inner.deployments.len();
        inner.deployments.retain(|d| d.trip_id != trip_id);
        Ok((before - inner.deployments.len()) as u64)
    }

    async fn booking_load(&self, trip_id: &str) -> Result<Option<f64>, StoreError> {
        Ok(self
            .read()
            .trips
            .iter()
            .find(|t| t.trip_id == trip_id)
            .map(|t| t.booking_status_percentage))
    }

    async fn search_documents(&self, query: &str, limit: u32) -> Result<Vec<String>, StoreError> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .read()
            .documents
            .iter()
            .filter(|(title, body)| {
                title.to_lowercase().contains(&needle) || body.to_lowercase().contains(&needle)
            })
            .map(|(_, body)| body.clone())
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl super::RiskSource for MemoryTransitStore {
    async fn get_risk(&self, entity_id: &str) -> Result<Option<f64>, StoreError> {
        self.booking_load(entity_id).await
    }
}
