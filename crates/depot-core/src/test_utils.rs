//! Shared stubs for unit and integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::{ApiError, Decision, ReasoningProvider};
use crate::app::conversation::Message;
use crate::store::{RouteRow, StopRow, StoreError, TransitStore, TripRow, VehicleRow};
use depot_tools::ToolSchema;

enum StubScript {
    /// Pop decisions in order; error once exhausted.
    Sequence(Mutex<VecDeque<Decision>>),
    /// Return the same decision forever (loop-ceiling tests).
    Repeat(Decision),
    /// Fail every call (gateway-outage tests).
    Fail,
}

/// Scripted `ReasoningProvider` for deterministic tests.
pub struct StubReasoner {
    script: StubScript,
    calls: AtomicUsize,
}

impl StubReasoner {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            script: StubScript::Sequence(Mutex::new(decisions.into())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn repeating(decision: Decision) -> Self {
        Self {
            script: StubScript::Repeat(decision),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: StubScript::Fail,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for StubReasoner {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn decide(
        &self,
        _messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<Decision, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            StubScript::Sequence(queue) => {
                let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
                queue.pop_front().ok_or_else(|| ApiError::NoChoices {
                    provider: "stub".to_string(),
                })
            }
            StubScript::Repeat(decision) => Ok(decision.clone()),
            StubScript::Fail => Err(ApiError::ServerError {
                provider: "stub".to_string(),
                status_code: 503,
                details: "reasoning service unavailable".to_string(),
            }),
        }
    }
}

/// `TransitStore` wrapper that counts dangerous-handler invocations.
pub struct RecordingStore {
    inner: Arc<dyn TransitStore>,
    removals: AtomicUsize,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn TransitStore>) -> Self {
        Self {
            inner,
            removals: AtomicUsize::new(0),
        }
    }

    pub fn removal_count(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransitStore for RecordingStore {
    async fn list_routes(&self) -> Result<Vec<RouteRow>, StoreError> {
        self.inner.list_routes().await
    }

    async fn stops_for_path(&self, path_id: &str) -> Result<Vec<StopRow>, StoreError> {
        self.inner.stops_for_path(path_id).await
    }

    async fn trip_details(&self, trip_id: &str) -> Result<Option<TripRow>, StoreError> {
        self.inner.trip_details(trip_id).await
    }

    async fn todays_trips(&self) -> Result<Vec<TripRow>, StoreError> {
        self.inner.todays_trips().await
    }

    async fn unassigned_vehicles(&self) -> Result<Vec<VehicleRow>, StoreError> {
        self.inner.unassigned_vehicles().await
    }

    async fn create_stop(&self, name: &str, lat: f64, lon: f64) -> Result<StopRow, StoreError> {
        self.inner.create_stop(name, lat, lon).await
    }

    async fn assign_vehicle(
        &self,
        trip_id: &str,
        vehicle_id: &str,
        driver_id: &str,
    ) -> Result<String, StoreError> {
        self.inner.assign_vehicle(trip_id, vehicle_id, driver_id).await
    }

    async fn remove_vehicle(&self, trip_id: &str) -> Result<u64, StoreError> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_vehicle(trip_id).await
    }

    async fn booking_load(&self, trip_id: &str) -> Result<Option<f64>, StoreError> {
        self.inner.booking_load(trip_id).await
    }

    async fn search_documents(&self, query: &str, limit: u32) -> Result<Vec<String>, StoreError> {
        self.inner.search_documents(query, limit).await
    }
}

#[async_trait]
impl crate::store::RiskSource for RecordingStore {
    async fn get_risk(&self, entity_id: &str) -> Result<Option<f64>, StoreError> {
        self.inner.booking_load(entity_id).await
    }
}

/// Risk source that always errors, for fail-open tests.
pub struct BrokenRiskSource;

#[async_trait]
impl crate::store::RiskSource for BrokenRiskSource {
    async fn get_risk(&self, _entity_id: &str) -> Result<Option<f64>, StoreError> {
        Err(StoreError::connection("risk source unreachable"))
    }
}
