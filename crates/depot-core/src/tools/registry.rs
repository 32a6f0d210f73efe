use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::capability::ErasedCapability;
use super::transit;
use crate::store::TransitStore;
use depot_tools::{ToolCall, ToolError, ToolResult, ToolSchema};

/// Name-keyed set of capabilities advertised to the reasoning service and
/// dispatched against by the orchestrator.
pub struct CapabilityRegistry {
    capabilities: HashMap<&'static str, Box<dyn ErasedCapability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    pub fn register<T: ErasedCapability + 'static>(&mut self, capability: T) {
        self.capabilities
            .insert(capability.name(), Box::new(capability));
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> =
            self.capabilities.values().map(|c| c.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn is_dangerous(&self, name: &str) -> bool {
        self.capabilities
            .get(name)
            .is_some_and(|c| c.dangerous())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Dispatch one capability call. Unknown names and bad arguments come
    /// back as `ToolError`, which the orchestrator folds into the
    /// conversation rather than aborting the turn.
    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let Some(capability) = self.capabilities.get(call.name.as_str()) else {
            return Err(ToolError::UnknownCapability(call.name.clone()));
        };
        debug!(target: "capability", name = %call.name, call_id = %call.id, "Dispatching capability");
        capability.invoke(call.parameters.clone()).await
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The full transit capability set over one store.
pub fn transit_registry(store: Arc<dyn TransitStore>) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(transit::ListRoutes::new(store.clone()));
    registry.register(transit::ListStopsForPath::new(store.clone()));
    registry.register(transit::GetTripDetails::new(store.clone()));
    registry.register(transit::ListTodaysTrips::new(store.clone()));
    registry.register(transit::ListUnassignedVehicles::new(store.clone()));
    registry.register(transit::CreateStop::new(store.clone()));
    registry.register(transit::AssignVehicleToTrip::new(store.clone()));
    registry.register(transit::RemoveVehicleFromTrip::new(store.clone()));
    registry.register(transit::SearchKnowledgeBase::new(store));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTransitStore;
    use depot_tools::result::TripRow;

    fn registry_with_trip() -> CapabilityRegistry {
        let store = Arc::new(MemoryTransitStore::new());
        store.insert_trip(TripRow {
            trip_id: "trip_9".to_string(),
            display_name: "Harbor - 06:30".to_string(),
            route_id: "route_1".to_string(),
            live_status: "Scheduled".to_string(),
            booking_status_percentage: 40.0,
        });
        transit_registry(store)
    }

    #[test]
    fn only_removal_is_dangerous() {
        let registry = registry_with_trip();
        assert!(registry.is_dangerous(transit::REMOVE_VEHICLE_CAPABILITY));
        assert!(!registry.is_dangerous("list_todays_trips"));
        assert!(!registry.is_dangerous("unknown_capability"));
    }

    #[test]
    fn schemas_are_sorted_and_complete() {
        let registry = registry_with_trip();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 9);
        let names: Vec<_> = schemas.iter().map(|s| s.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn unknown_capability_is_a_tool_error() {
        let registry = registry_with_trip();
        let call = ToolCall {
            id: "c1".to_string(),
            name: "teleport_bus".to_string(),
            parameters: serde_json::json!({}),
        };
        let err = registry.invoke(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownCapability(_)));
    }

    #[tokio::test]
    async fn bad_arguments_are_invalid_params() {
        let registry = registry_with_trip();
        let call = ToolCall {
            id: "c1".to_string(),
            name: "get_trip_details".to_string(),
            parameters: serde_json::json!({"trip": 12}),
        };
        let err = registry.invoke(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn trip_details_round_trip() {
        let registry = registry_with_trip();
        let call = ToolCall {
            id: "c1".to_string(),
            name: "get_trip_details".to_string(),
            parameters: serde_json::json!({"trip_id": "trip_9"}),
        };
        let result = registry.invoke(&call).await.unwrap();
        match result {
            ToolResult::TripDetails(details) => {
                assert_eq!(details.trip.unwrap().display_name, "Harbor - 06:30");
            }
            other => panic!("Expected trip details, got {other:?}"),
        }
    }
}
