//! Property-based tests for the reducer
//!
//! These tests verify key invariants hold across arbitrary event streams.

use super::state::*;
use super::transition::*;
use super::*;
use crate::agent::{AgentEvent, Outcome, ToolInvocation, TurnId};
use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;

const TURN: TurnId = 1;

// ============================================================================
// Test Helpers
// ============================================================================

fn started() -> ViewModel {
    transition(
        &ViewModel::default(),
        Event::user_message(TURN, "go", "/repo", None),
        Utc::now(),
    )
    .expect("prompt is valid")
    .new_state
}

fn fold(state: ViewModel, events: impl IntoIterator<Item = Event>) -> ViewModel {
    events.into_iter().fold(state, |state, event| {
        match transition(&state, event, Utc::now()) {
            Ok(result) => result.new_state,
            Err(_) => state,
        }
    })
}

/// Invariants every reachable view model satisfies
fn is_consistent(view: &ViewModel) -> bool {
    if view.status == SessionStatus::Executing && view.active_tools.is_empty() {
        return false;
    }
    if view.status.is_settled() && view.transcript.iter().any(|m| m.is_streaming) {
        return false;
    }
    if view.status == SessionStatus::Idle && view.open_turn.is_some() {
        return false;
    }
    // At most one entry streams, and it is the tracked one
    let streaming: Vec<usize> = view
        .transcript
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_streaming)
        .map(|(i, _)| i)
        .collect();
    match view.streaming_entry {
        Some(i) => streaming == vec![i],
        None => streaming.is_empty(),
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_invocation() -> impl Strategy<Value = ToolInvocation> {
    ("[a-z]{6}", prop_oneof![Just("Bash"), Just("Read"), Just("Edit")]).prop_map(|(id, name)| {
        ToolInvocation {
            id,
            name: name.to_string(),
            input: json!({}),
        }
    })
}

fn arb_tools() -> impl Strategy<Value = Vec<ToolInvocation>> {
    proptest::collection::vec(arb_invocation(), 1..4)
}

fn arb_chunk() -> impl Strategy<Value = AgentEvent> {
    (
        proptest::option::of("[a-zA-Z ]{0,12}"),
        proptest::collection::vec(arb_invocation(), 0..3),
    )
        .prop_map(|(text_delta, tool_invocations)| AgentEvent::AssistantChunk {
            message_id: "msg".to_string(),
            text_delta,
            tool_invocations,
        })
}

fn arb_agent_event() -> impl Strategy<Value = AgentEvent> {
    prop_oneof![
        1 => "[a-z0-9]{8}".prop_map(|conversation_token| AgentEvent::Init { conversation_token }),
        4 => arb_chunk(),
        1 => (any::<bool>(), 0.0f64..5.0).prop_map(|(ok, cost)| AgentEvent::Result {
            outcome: if ok { Outcome::Success } else { Outcome::Failure },
            cost,
        }),
        1 => "[a-z ]{1,20}".prop_map(|message| AgentEvent::Fatal { message }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        6 => (1u64..3, arb_agent_event()).prop_map(|(turn, event)| Event::Agent { turn, event }),
        1 => (1u64..3).prop_map(|turn| Event::turn_failed(turn, "exit")),
        1 => (1u64..3).prop_map(|turn| Event::TurnComplete { turn }),
        1 => Just(Event::Stop),
        1 => (1u64..3, "[a-z ]{0,10}").prop_map(|(turn, text)| Event::user_message(turn, text, "/repo", None)),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: Any event stream leaves a consistent view model
    #[test]
    fn prop_transitions_preserve_consistency(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut state = ViewModel::default();
        for event in events {
            if let Ok(result) = transition(&state, event, Utc::now()) {
                state = result.new_state;
                prop_assert!(is_consistent(&state), "Inconsistent view model: {:?}", state);
            }
        }
    }

    // Invariant 2: Text deltas coalesce into one entry in order
    #[test]
    fn prop_text_deltas_concatenate(deltas in proptest::collection::vec("[a-zA-Z ]{1,10}", 1..20)) {
        let events = deltas.iter().map(|delta| Event::Agent {
            turn: TURN,
            event: AgentEvent::AssistantChunk {
                message_id: "msg".to_string(),
                text_delta: Some(delta.clone()),
                tool_invocations: vec![],
            },
        });
        let state = fold(started(), events);

        let assistants: Vec<_> = state.transcript.iter().filter(|m| m.role == Role::Assistant).collect();
        prop_assert_eq!(assistants.len(), 1);
        prop_assert_eq!(&assistants[0].content, &deltas.concat());
    }

    // Invariant 3: Active tools are the last chunk's tools, never a union
    #[test]
    fn prop_tools_are_replaced(batches in proptest::collection::vec(arb_tools(), 1..8)) {
        let last_ids: Vec<String> = batches.last().map(|b| b.iter().map(|t| t.id.clone()).collect()).unwrap_or_default();
        let events = batches.into_iter().map(|tool_invocations| Event::Agent {
            turn: TURN,
            event: AgentEvent::AssistantChunk {
                message_id: "msg".to_string(),
                text_delta: None,
                tool_invocations,
            },
        });
        let state = fold(started(), events);

        let ids: Vec<String> = state.active_tools.iter().map(|t| t.id.clone()).collect();
        prop_assert_eq!(ids, last_ids);
        prop_assert_eq!(state.status, SessionStatus::Executing);
    }

    // Invariant 4: Successful result settles the turn
    #[test]
    fn prop_success_result_settles(
        chunks in proptest::collection::vec(arb_chunk(), 0..10),
        cost in 0.0f64..10.0
    ) {
        let mut events: Vec<Event> = chunks.into_iter().map(|event| Event::Agent { turn: TURN, event }).collect();
        events.push(Event::Agent { turn: TURN, event: AgentEvent::Result { outcome: Outcome::Success, cost } });
        let state = fold(started(), events);

        prop_assert_eq!(state.status, SessionStatus::Done);
        prop_assert!((state.cost - cost).abs() < f64::EPSILON);
        prop_assert!(state.transcript.iter().all(|m| !m.is_streaming));
        prop_assert!(state.active_tools.is_empty());
    }

    // Invariant 5: Stop is immediate and nothing of the old turn gets back in
    #[test]
    fn prop_stop_is_final(
        before in proptest::collection::vec(arb_chunk(), 0..6),
        after in proptest::collection::vec(arb_agent_event(), 0..6)
    ) {
        let running = fold(started(), before.into_iter().map(|event| Event::Agent { turn: TURN, event }));
        let stopped = fold(running, [Event::Stop]);

        prop_assert_eq!(stopped.status, SessionStatus::Idle);
        prop_assert!(stopped.active_tools.is_empty());
        prop_assert!(stopped.transcript.iter().all(|m| !m.is_streaming));

        let mut trailing: Vec<Event> = after.into_iter().map(|event| Event::Agent { turn: TURN, event }).collect();
        trailing.push(Event::TurnComplete { turn: TURN });
        let late = fold(stopped.clone(), trailing);
        prop_assert_eq!(late, stopped);
    }

    // Invariant 6: A new turn cannot open while one is running
    #[test]
    fn prop_open_turn_rejects_prompts(text in "[a-zA-Z]{1,20}") {
        let result = transition(&started(), Event::user_message(TURN + 1, text, "/repo", None), Utc::now());
        prop_assert_eq!(result.unwrap_err(), TransitionError::TurnInProgress);
    }
}
