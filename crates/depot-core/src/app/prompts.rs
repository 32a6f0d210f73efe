//! Fixed prompt and reply text used by the orchestrator.

use crate::app::conversation::{Message, MessageData};

/// Standing instructions prepended to every new thread.
pub const SYSTEM_PROMPT: &str = "You are the operations copilot for a bus fleet.

CRITICAL RULES:
1. ID LOOKUP: if the user gives a trip name (e.g. \"Harbor - 06:30\"), first call \
`list_todays_trips` to resolve its `trip_id`. Never guess an id and never use a name as an id.
2. SAFETY CHECK: once you have the `trip_id`, call `remove_vehicle_from_trip` directly. Do not \
check bookings yourself; the system intercepts the call and runs the safety check.
3. VEHICLE LISTING: when the user asks for available buses or vehicles, call \
`list_unassigned_vehicles` and summarise each vehicle clearly: id, license plate, type, capacity.";

/// Marker prefix for the one-shot confirmation instruction. The routing step
/// recognizes it to skip re-evaluation for exactly one dispatch.
pub const CONFIRMATION_MARKER: &str = "User confirmed the safety check.";

pub fn confirmation_instruction(entity_id: &str) -> String {
    format!("{CONFIRMATION_MARKER} Execute the pending vehicle removal for trip {entity_id} now.")
}

/// True for the system-authored instruction appended on an affirmative reply.
pub fn is_confirmation_instruction(message: &Message) -> bool {
    matches!(
        &message.data,
        MessageData::System { content } if content.starts_with(CONFIRMATION_MARKER)
    )
}

/// Fixed reply when the user declines a pending dangerous action.
pub const CANCELLED_REPLY: &str = "Okay, operation cancelled.";

/// Fixed reply when the turn fails outright (gateway down, loop ceiling).
pub const DEGRADED_REPLY: &str =
    "Sorry, I ran into a problem completing that request. Nothing was changed. Please try again.";

/// Case-insensitive substring vocabulary treated as an affirmative reply.
///
/// Free-text confirmation is inherently ambiguous ("yes but not now" matches);
/// the vocabulary is kept deliberately small and documented rather than
/// replaced with intent parsing.
pub const AFFIRMATIVE_TOKENS: [&str; 2] = ["yes", "proceed"];

pub fn is_affirmative(text: &str) -> bool {
    let lower = text.to_lowercase();
    AFFIRMATIVE_TOKENS.iter().any(|token| lower.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_matching_is_case_insensitive_substring() {
        assert!(is_affirmative("Yes, go ahead"));
        assert!(is_affirmative("please PROCEED"));
        assert!(!is_affirmative("no thanks"));
        assert!(!is_affirmative("cancel that"));
    }

    #[test]
    fn confirmation_instruction_is_recognizable() {
        let message = Message::system(confirmation_instruction("trip_1"));
        assert!(is_confirmation_instruction(&message));
        assert!(!is_confirmation_instruction(&Message::system(SYSTEM_PROMPT)));
        assert!(!is_confirmation_instruction(&Message::user(
            confirmation_instruction("trip_1")
        )));
    }
}
