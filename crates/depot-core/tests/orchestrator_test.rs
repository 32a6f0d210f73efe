//! End-to-end turns through the orchestration state machine with a scripted
//! reasoning stub: interlock pause, confirmation, cancellation, fail-open
//! risk handling and the loop ceiling.

use std::sync::Arc;

use depot_core::api::Decision;
use depot_core::app::consequence::{ConsequenceEvaluator, RiskLevel};
use depot_core::app::conversation::{MessageData, validate_thread};
use depot_core::app::prompts;
use depot_core::app::{Orchestrator, OrchestratorConfig};
use depot_core::error::Error;
use depot_core::session::{CheckpointStore, InMemoryCheckpointStore, ThreadId};
use depot_core::store::{MemoryTransitStore, TransitStore};
use depot_core::test_utils::{RecordingStore, StubReasoner};
use depot_core::tools::transit::REMOVE_VEHICLE_CAPABILITY;
use depot_core::tools::transit_registry;
use depot_tools::result::{ToolResult, TripRow};
use depot_tools::ToolCall;

struct Harness {
    orchestrator: Orchestrator,
    gateway: Arc<StubReasoner>,
    store: Arc<RecordingStore>,
    checkpoints: Arc<InMemoryCheckpointStore>,
}

fn trip(trip_id: &str, booking_pct: f64) -> TripRow {
    TripRow {
        trip_id: trip_id.to_string(),
        display_name: format!("{trip_id} display"),
        route_id: "route_1".to_string(),
        live_status: "Scheduled".to_string(),
        booking_status_percentage: booking_pct,
    }
}

fn harness(gateway: StubReasoner) -> Harness {
    let memory = MemoryTransitStore::new();
    memory.insert_trip(trip("trip_booked", 60.0));
    memory.insert_trip(trip("trip_empty", 0.0));
    memory.insert_deployment("trip_booked", "veh_1", "drv_1");
    memory.insert_deployment("trip_empty", "veh_2", "drv_2");

    let store = Arc::new(RecordingStore::new(Arc::new(memory)));
    let gateway = Arc::new(gateway);
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());

    let orchestrator = Orchestrator::new(
        gateway.clone(),
        transit_registry(store.clone() as Arc<dyn TransitStore>),
        ConsequenceEvaluator::new(store.clone()),
        checkpoints.clone(),
        OrchestratorConfig::default(),
    );

    Harness {
        orchestrator,
        gateway,
        store,
        checkpoints,
    }
}

fn removal_call(trip_id: &str, call_id: &str) -> ToolCall {
    ToolCall {
        id: call_id.to_string(),
        name: REMOVE_VEHICLE_CAPABILITY.to_string(),
        parameters: serde_json::json!({ "trip_id": trip_id }),
    }
}

#[tokio::test]
async fn booked_trip_pauses_on_the_interlock() {
    // Scenario: removal requested against a 60%-booked trip.
    let h = harness(StubReasoner::new(vec![Decision::with_calls(
        "",
        vec![removal_call("trip_booked", "call_1")],
    )]));

    let outcome = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "Remove the bus from trip_booked", "busDashboard")
        .await
        .unwrap();

    assert!(outcome.awaiting_confirmation);
    assert!(outcome.reply.contains("60% booked"));
    assert_eq!(h.store.removal_count(), 0);

    let state = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();
    assert!(state.awaiting_confirmation);
    assert_eq!(state.target_entity_id.as_deref(), Some("trip_booked"));
    assert_eq!(state.consequence_risk, Some(RiskLevel::High));
    assert_eq!(state.context_tag, "busDashboard");
    validate_thread(&state.messages).unwrap();

    // The paused call still got a (synthetic) tool result.
    let interlocks: Vec<_> = state
        .messages
        .iter()
        .filter_map(|m| match &m.data {
            MessageData::Tool {
                tool_call_id,
                result: ToolResult::Interlock(r),
            } => Some((tool_call_id.clone(), r.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(interlocks.len(), 1);
    assert_eq!(interlocks[0].0, "call_1");

    // Invariant: the stored thread ends on the confirmation prompt.
    assert!(matches!(
        state.messages.last().unwrap().data,
        MessageData::Assistant { .. }
    ));
}

#[tokio::test]
async fn affirmative_reply_dispatches_exactly_once() {
    // Scenario: the interlock turn followed by "yes, proceed".
    let h = harness(StubReasoner::new(vec![
        Decision::with_calls("", vec![removal_call("trip_booked", "call_1")]),
        Decision::with_calls("", vec![removal_call("trip_booked", "call_2")]),
        Decision::reply("Done - the vehicle was removed from trip_booked."),
    ]));

    h.orchestrator
        .submit_turn(ThreadId::from("t1"), "Remove the bus from trip_booked", "busDashboard")
        .await
        .unwrap();

    let outcome = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "yes, proceed", "busDashboard")
        .await
        .unwrap();

    assert!(!outcome.awaiting_confirmation);
    assert!(outcome.reply.contains("removed"));
    assert_eq!(h.store.removal_count(), 1);

    let state = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();
    assert!(!state.awaiting_confirmation);
    assert_eq!(state.consequence_risk, None);
    validate_thread(&state.messages).unwrap();

    // The one-shot confirmation instruction is system-authored.
    assert!(
        state
            .messages
            .iter()
            .any(|m| prompts::is_confirmation_instruction(m))
    );
}

#[tokio::test]
async fn negative_reply_cancels_without_dispatch() {
    let h = harness(StubReasoner::new(vec![Decision::with_calls(
        "",
        vec![removal_call("trip_booked", "call_1")],
    )]));

    h.orchestrator
        .submit_turn(ThreadId::from("t1"), "Remove the bus from trip_booked", "busDashboard")
        .await
        .unwrap();
    let gateway_calls_after_first_turn = h.gateway.call_count();

    let outcome = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "no thanks", "busDashboard")
        .await
        .unwrap();

    assert!(!outcome.awaiting_confirmation);
    assert_eq!(outcome.reply, prompts::CANCELLED_REPLY);
    assert_eq!(h.store.removal_count(), 0);
    // Cancellation is resolved locally, without consulting the gateway.
    assert_eq!(h.gateway.call_count(), gateway_calls_after_first_turn);

    let state = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();
    assert!(!state.awaiting_confirmation);
    assert_eq!(state.target_entity_id, None);
}

#[tokio::test]
async fn unbooked_trip_dispatches_in_the_same_turn() {
    // Scenario: removal against a 0%-booked trip skips the interlock.
    let h = harness(StubReasoner::new(vec![
        Decision::with_calls("", vec![removal_call("trip_empty", "call_1")]),
        Decision::reply("Vehicle removed from trip_empty."),
    ]));

    let outcome = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "Clear trip_empty", "busDashboard")
        .await
        .unwrap();

    assert!(!outcome.awaiting_confirmation);
    assert_eq!(h.store.removal_count(), 1);

    let state = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.consequence_risk, Some(RiskLevel::Low));
}

#[tokio::test]
async fn untracked_trip_fails_open_to_low_risk() {
    // Scenario: no risk row for the entity at all.
    let h = harness(StubReasoner::new(vec![
        Decision::with_calls("", vec![removal_call("trip_untracked", "call_1")]),
        Decision::reply("Vehicle removed."),
    ]));

    let outcome = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "Clear trip_untracked", "busDashboard")
        .await
        .unwrap();

    assert!(!outcome.awaiting_confirmation);
    assert_eq!(h.store.removal_count(), 1);
}

#[tokio::test]
async fn dangerous_call_gates_the_whole_batch() {
    // A safe call requested alongside the dangerous one must not dispatch
    // before the interlock resolves.
    let h = harness(StubReasoner::new(vec![Decision::with_calls(
        "",
        vec![
            ToolCall {
                id: "call_safe".to_string(),
                name: "list_todays_trips".to_string(),
                parameters: serde_json::json!({}),
            },
            removal_call("trip_booked", "call_danger"),
        ],
    )]));

    let outcome = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "List trips and clear trip_booked", "busDashboard")
        .await
        .unwrap();

    assert!(outcome.awaiting_confirmation);
    assert_eq!(h.store.removal_count(), 0);

    // The only tool result this turn is the interlock pause; the safe call
    // was held back with the rest of the batch.
    let state = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();
    let tool_results: Vec<_> = state
        .messages
        .iter()
        .filter(|m| matches!(&m.data, MessageData::Tool { .. }))
        .collect();
    assert_eq!(tool_results.len(), 1);
    assert!(matches!(
        &tool_results[0].data,
        MessageData::Tool {
            result: ToolResult::Interlock(_),
            ..
        }
    ));
}

#[tokio::test]
async fn runaway_tool_loop_hits_the_ceiling() {
    let h = harness(StubReasoner::repeating(Decision::with_calls(
        "",
        vec![ToolCall {
            id: "call_loop".to_string(),
            name: "list_todays_trips".to_string(),
            parameters: serde_json::json!({}),
        }],
    )));

    let err = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "List trips forever", "busDashboard")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::LoopCeilingExceeded { rounds: 8 }));
    assert_eq!(h.gateway.call_count(), 8);

    // A failed turn persists nothing.
    assert!(
        h.checkpoints
            .load(&ThreadId::from("t1"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn gateway_outage_aborts_without_persisting() {
    let h = harness(StubReasoner::failing());

    let err = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "hello", "busDashboard")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Gateway(_)));
    assert!(
        h.checkpoints
            .load(&ThreadId::from("t1"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn handler_failure_is_absorbed_into_the_conversation() {
    // An unknown capability name comes back as an error tool-result and the
    // turn still completes.
    let h = harness(StubReasoner::new(vec![
        Decision::with_calls(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "teleport_bus".to_string(),
                parameters: serde_json::json!({}),
            }],
        ),
        Decision::reply("I can't do that; teleport_bus is not available."),
    ]));

    let outcome = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "Teleport the bus", "busDashboard")
        .await
        .unwrap();

    assert!(outcome.reply.contains("not available"));

    let state = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();
    let has_error_result = state.messages.iter().any(|m| {
        matches!(
            &m.data,
            MessageData::Tool {
                result: ToolResult::Error(_),
                ..
            }
        )
    });
    assert!(has_error_result);
    validate_thread(&state.messages).unwrap();
}

#[tokio::test]
async fn unrelated_thread_does_not_disturb_a_pending_confirmation() {
    let h = harness(StubReasoner::new(vec![
        Decision::with_calls("", vec![removal_call("trip_booked", "call_1")]),
        Decision::reply("Hello! How can I help?"),
        Decision::with_calls("", vec![removal_call("trip_booked", "call_2")]),
        Decision::reply("Done - vehicle removed."),
    ]));

    h.orchestrator
        .submit_turn(ThreadId::from("t1"), "Remove the bus from trip_booked", "busDashboard")
        .await
        .unwrap();

    // A different thread runs a whole turn in between.
    let other = h
        .orchestrator
        .submit_turn(ThreadId::from("t2"), "hi", "manageRoute")
        .await
        .unwrap();
    assert!(!other.awaiting_confirmation);

    // The first thread is still suspended and confirms cleanly.
    let state = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();
    assert!(state.awaiting_confirmation);

    let outcome = h
        .orchestrator
        .submit_turn(ThreadId::from("t1"), "yes", "busDashboard")
        .await
        .unwrap();
    assert!(!outcome.awaiting_confirmation);
    assert_eq!(h.store.removal_count(), 1);
}

#[tokio::test]
async fn first_turn_gets_the_system_prompt_prepended_once() {
    let h = harness(StubReasoner::new(vec![
        Decision::reply("Hi!"),
        Decision::reply("Hi again!"),
    ]));

    h.orchestrator
        .submit_turn(ThreadId::from("t1"), "hello", "busDashboard")
        .await
        .unwrap();
    h.orchestrator
        .submit_turn(ThreadId::from("t1"), "hello again", "busDashboard")
        .await
        .unwrap();

    let state = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();
    let system_count = state
        .messages
        .iter()
        .filter(|m| matches!(&m.data, MessageData::System { content } if content == prompts::SYSTEM_PROMPT))
        .count();
    assert_eq!(system_count, 1);
    assert!(matches!(
        state.messages[0].data,
        MessageData::System { .. }
    ));
}

#[tokio::test]
async fn reload_and_resave_is_idempotent() {
    let h = harness(StubReasoner::new(vec![Decision::reply("Hi!")]));

    h.orchestrator
        .submit_turn(ThreadId::from("t1"), "hello", "busDashboard")
        .await
        .unwrap();

    let first = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();
    h.checkpoints.save(&first).await.unwrap();
    let second = h
        .checkpoints
        .load(&ThreadId::from("t1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.messages.len(), second.messages.len());
    for (a, b) in first.messages.iter().zip(&second.messages) {
        assert_eq!(a.id, b.id);
    }
}
