//! The transit capability set: reads over routes, stops, trips and vehicles,
//! writes for stop creation and vehicle deployment, and the one dangerous
//! operation (pulling a vehicle off a trip).

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::capability::{Capability, CapabilityError};
use crate::store::TransitStore;
use depot_tools::result::{
    AssignmentResult, KnowledgeResult, RemovalResult, RouteListResult, StopCreatedResult,
    StopListResult, TripDetailsResult, TripListResult, VehicleListResult,
};

/// Name of the designated dangerous capability.
pub const REMOVE_VEHICLE_CAPABILITY: &str = "remove_vehicle_from_trip";

/// Parameter name carrying the targeted entity id on the dangerous call.
pub const REMOVE_VEHICLE_ENTITY_PARAM: &str = "trip_id";

const KNOWLEDGE_RESULT_LIMIT: u32 = 2;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PathParams {
    /// Path whose stops to list.
    pub path_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TripParams {
    /// Trip id, e.g. from `list_todays_trips`.
    pub trip_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateStopParams {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AssignVehicleParams {
    pub trip_id: String,
    pub vehicle_id: String,
    pub driver_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    pub query: String,
}

macro_rules! store_backed {
    ($name:ident) => {
        pub struct $name {
            store: Arc<dyn TransitStore>,
        }

        impl $name {
            pub fn new(store: Arc<dyn TransitStore>) -> Self {
                Self { store }
            }
        }
    };
}

store_backed!(ListRoutes);
store_backed!(ListStopsForPath);
store_backed!(GetTripDetails);
store_backed!(ListTodaysTrips);
store_backed!(ListUnassignedVehicles);
store_backed!(CreateStop);
store_backed!(AssignVehicleToTrip);
store_backed!(RemoveVehicleFromTrip);
store_backed!(SearchKnowledgeBase);

#[async_trait]
impl Capability for ListRoutes {
    type Params = EmptyParams;
    type Output = RouteListResult;

    const NAME: &'static str = "list_routes";
    const DESCRIPTION: &'static str = "View all active transport routes.";
    const DANGEROUS: bool = false;

    async fn run(&self, _params: Self::Params) -> Result<Self::Output, CapabilityError> {
        Ok(RouteListResult {
            routes: self.store.list_routes().await?,
        })
    }
}

#[async_trait]
impl Capability for ListStopsForPath {
    type Params = PathParams;
    type Output = StopListResult;

    const NAME: &'static str = "list_stops_for_path";
    const DESCRIPTION: &'static str = "Get the ordered list of stops for a specific path id.";
    const DANGEROUS: bool = false;

    async fn run(&self, params: Self::Params) -> Result<Self::Output, CapabilityError> {
        let stops = self.store.stops_for_path(&params.path_id).await?;
        Ok(StopListResult {
            path_id: params.path_id,
            stops,
        })
    }
}

#[async_trait]
impl Capability for GetTripDetails {
    type Params = TripParams;
    type Output = TripDetailsResult;

    const NAME: &'static str = "get_trip_details";
    const DESCRIPTION: &'static str =
        "Get details of a specific trip, including its booking status.";
    const DANGEROUS: bool = false;

    async fn run(&self, params: Self::Params) -> Result<Self::Output, CapabilityError> {
        Ok(TripDetailsResult {
            trip: self.store.trip_details(&params.trip_id).await?,
        })
    }
}

#[async_trait]
impl Capability for ListTodaysTrips {
    type Params = EmptyParams;
    type Output = TripListResult;

    const NAME: &'static str = "list_todays_trips";
    const DESCRIPTION: &'static str = "Fetch all of today's trips with trip_id, display name, \
         live status and booking percentage. Always call this to resolve a trip name to its \
         trip_id; never guess ids.";
    const DANGEROUS: bool = false;

    async fn run(&self, _params: Self::Params) -> Result<Self::Output, CapabilityError> {
        Ok(TripListResult {
            trips: self.store.todays_trips().await?,
        })
    }
}

#[async_trait]
impl Capability for ListUnassignedVehicles {
    type Params = EmptyParams;
    type Output = VehicleListResult;

    const NAME: &'static str = "list_unassigned_vehicles";
    const DESCRIPTION: &'static str =
        "List vehicles that currently have no deployment, with license plate, type and capacity.";
    const DANGEROUS: bool = false;

    async fn run(&self, _params: Self::Params) -> Result<Self::Output, CapabilityError> {
        Ok(VehicleListResult {
            vehicles: self.store.unassigned_vehicles().await?,
        })
    }
}

#[async_trait]
impl Capability for CreateStop {
    type Params = CreateStopParams;
    type Output = StopCreatedResult;

    const NAME: &'static str = "create_stop";
    const DESCRIPTION: &'static str = "Create a new stop location at the given coordinates.";
    const DANGEROUS: bool = false;

    async fn run(&self, params: Self::Params) -> Result<Self::Output, CapabilityError> {
        let stop = self
            .store
            .create_stop(&params.name, params.lat, params.lon)
            .await?;
        Ok(StopCreatedResult {
            stop_id: stop.stop_id,
            name: stop.name,
        })
    }
}

#[async_trait]
impl Capability for AssignVehicleToTrip {
    type Params = AssignVehicleParams;
    type Output = AssignmentResult;

    const NAME: &'static str = "assign_vehicle_to_trip";
    const DESCRIPTION: &'static str = "Assign a vehicle and driver to a trip (deploy).";
    const DANGEROUS: bool = false;

    async fn run(&self, params: Self::Params) -> Result<Self::Output, CapabilityError> {
        let deployment_id = self
            .store
            .assign_vehicle(&params.trip_id, &params.vehicle_id, &params.driver_id)
            .await?;
        Ok(AssignmentResult {
            deployment_id,
            trip_id: params.trip_id,
            vehicle_id: params.vehicle_id,
        })
    }
}

#[async_trait]
impl Capability for RemoveVehicleFromTrip {
    type Params = TripParams;
    type Output = RemovalResult;

    const NAME: &'static str = REMOVE_VEHICLE_CAPABILITY;
    const DESCRIPTION: &'static str = "Remove the deployed vehicle from a trip and cancel its \
         trip-sheet. The system runs a safety check before this executes; do not check bookings \
         yourself.";
    const DANGEROUS: bool = true;

    async fn run(&self, params: Self::Params) -> Result<Self::Output, CapabilityError> {
        let deployments_removed = self.store.remove_vehicle(&params.trip_id).await?;
        Ok(RemovalResult {
            trip_id: params.trip_id,
            deployments_removed,
        })
    }
}

#[async_trait]
impl Capability for SearchKnowledgeBase {
    type Params = SearchParams;
    type Output = KnowledgeResult;

    const NAME: &'static str = "search_knowledge_base";
    const DESCRIPTION: &'static str =
        "Search the operations documentation. Use for 'how do I ...' questions.";
    const DANGEROUS: bool = false;

    async fn run(&self, params: Self::Params) -> Result<Self::Output, CapabilityError> {
        let excerpts = self
            .store
            .search_documents(&params.query, KNOWLEDGE_RESULT_LIMIT)
            .await?;
        Ok(KnowledgeResult {
            query: params.query,
            excerpts,
        })
    }
}
