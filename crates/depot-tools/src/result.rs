use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Core enum for all capability results.
///
/// One variant per capability family plus the interlock pause and the
/// failure case. `llm_format` is the canonical rendering handed back to the
/// reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ToolResult {
    Routes(RouteListResult),
    Stops(StopListResult),
    Trips(TripListResult),
    TripDetails(TripDetailsResult),
    Vehicles(VehicleListResult),
    StopCreated(StopCreatedResult),
    Assignment(AssignmentResult),
    Removal(RemovalResult),
    Knowledge(KnowledgeResult),

    // Emitted by the orchestrator when a dangerous call is paused pending
    // user confirmation; keeps the call/result pairing intact.
    Interlock(InterlockResult),

    Error(ToolError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteRow {
    pub route_id: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopRow {
    pub stop_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripRow {
    pub trip_id: String,
    pub display_name: String,
    pub route_id: String,
    pub live_status: String,
    pub booking_status_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleRow {
    pub vehicle_id: String,
    pub license_plate: String,
    pub vehicle_type: String,
    pub capacity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteListResult {
    pub routes: Vec<RouteRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopListResult {
    pub path_id: String,
    /// Ordered by position along the path.
    pub stops: Vec<StopRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripListResult {
    pub trips: Vec<TripRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripDetailsResult {
    pub trip: Option<TripRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleListResult {
    pub vehicles: Vec<VehicleRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopCreatedResult {
    pub stop_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentResult {
    pub deployment_id: String,
    pub trip_id: String,
    pub vehicle_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemovalResult {
    pub trip_id: String,
    pub deployments_removed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeResult {
    pub query: String,
    pub excerpts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterlockResult {
    pub trip_id: String,
    pub booking_percentage: f64,
}

impl ToolResult {
    /// Render a result for the reasoning service: structured payloads as
    /// JSON, action outcomes and errors as plain sentences.
    pub fn llm_format(&self) -> String {
        match self {
            ToolResult::Routes(r) => to_json(r),
            ToolResult::Stops(r) => to_json(r),
            ToolResult::Trips(r) => to_json(r),
            ToolResult::TripDetails(r) => match &r.trip {
                Some(trip) => to_json(trip),
                None => "No trip found for that id.".to_string(),
            },
            ToolResult::Vehicles(r) => to_json(r),
            ToolResult::StopCreated(r) => {
                format!("Stop '{}' created with id {}.", r.name, r.stop_id)
            }
            ToolResult::Assignment(r) => format!(
                "Vehicle {} assigned to trip {} (deployment {}).",
                r.vehicle_id, r.trip_id, r.deployment_id
            ),
            ToolResult::Removal(r) => format!(
                "Vehicle removed from trip {}. {} deployment(s) cancelled.",
                r.trip_id, r.deployments_removed
            ),
            ToolResult::Knowledge(r) => {
                if r.excerpts.is_empty() {
                    "No matching documentation found.".to_string()
                } else {
                    r.excerpts.join("\n\n")
                }
            }
            ToolResult::Interlock(r) => format!(
                "SAFETY INTERLOCK: trip {} is {:.0}% booked. Action paused pending user confirmation.",
                r.trip_id, r.booking_percentage
            ),
            ToolResult::Error(e) => format!("Error: {e}"),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

macro_rules! impl_from_result {
    ($($payload:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$payload> for ToolResult {
                fn from(value: $payload) -> Self {
                    ToolResult::$variant(value)
                }
            }
        )*
    };
}

impl_from_result! {
    RouteListResult => Routes,
    StopListResult => Stops,
    TripListResult => Trips,
    TripDetailsResult => TripDetails,
    VehicleListResult => Vehicles,
    StopCreatedResult => StopCreated,
    AssignmentResult => Assignment,
    RemovalResult => Removal,
    KnowledgeResult => Knowledge,
    InterlockResult => Interlock,
}

impl From<ToolError> for ToolResult {
    fn from(error: ToolError) -> Self {
        ToolResult::Error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interlock_format_names_the_trip_and_load() {
        let result = ToolResult::Interlock(InterlockResult {
            trip_id: "trip_81".to_string(),
            booking_percentage: 60.0,
        });
        let text = result.llm_format();
        assert!(text.contains("trip_81"));
        assert!(text.contains("60% booked"));
        assert!(text.contains("paused pending user confirmation"));
    }

    #[test]
    fn list_results_render_as_json() {
        let result = ToolResult::Trips(TripListResult {
            trips: vec![TripRow {
                trip_id: "trip_1".to_string(),
                display_name: "Bulk - 00:01".to_string(),
                route_id: "route_1".to_string(),
                live_status: "Scheduled".to_string(),
                booking_status_percentage: 25.0,
            }],
        });
        let parsed: serde_json::Value = serde_json::from_str(&result.llm_format()).unwrap();
        assert_eq!(parsed["trips"][0]["trip_id"], "trip_1");
    }
}
