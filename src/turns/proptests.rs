//! Property-based tests for the turn tracker

use super::*;
use crate::protocol::{SessionId, TurnEvent, TurnOutcome};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Event(TurnEvent),
    Item { turn_id: String, item_id: String },
}

fn session() -> SessionId {
    SessionId::new("claude", "s1")
}

fn arb_turn_id() -> impl Strategy<Value = String> {
    (1u8..5).prop_map(|n| format!("t{n}"))
}

fn arb_event() -> impl Strategy<Value = TurnEvent> {
    prop_oneof![
        arb_turn_id().prop_map(|turn_id| TurnEvent::TurnStarted {
            turn_id,
            session_id: session(),
            model_id: "m".to_string(),
            provider_id: "p".to_string(),
        }),
        (arb_turn_id(), any::<bool>()).prop_map(|(turn_id, cancelled)| TurnEvent::TurnComplete {
            turn_id,
            session_id: session(),
            status: if cancelled {
                TurnOutcome::Cancelled
            } else {
                TurnOutcome::Completed
            },
            usage: None,
        }),
        arb_turn_id().prop_map(|turn_id| TurnEvent::TurnError {
            turn_id,
            session_id: session(),
            error_code: "e".to_string(),
            error_message: "failed".to_string(),
        }),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => arb_event().prop_map(Op::Event),
        1 => (arb_turn_id(), "[a-c]").prop_map(|(turn_id, item_id)| Op::Item { turn_id, item_id }),
    ]
}

proptest! {
    #[test]
    fn prop_at_most_one_running_turn(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut tracker = TurnTracker::new(session());
        for op in &ops {
            match op {
                Op::Event(event) => {
                    let _ = tracker.apply(event);
                }
                Op::Item { turn_id, item_id } => {
                    tracker.record_item(turn_id, item_id);
                }
            }
            prop_assert!(tracker.running_count() <= 1);
            if let Some(active) = tracker.active() {
                prop_assert!(active.is_running());
            }
        }
    }

    #[test]
    fn prop_terminal_turns_stay_terminal(ops in proptest::collection::vec(arb_event(), 0..30)) {
        let mut tracker = TurnTracker::new(session());
        for event in &ops {
            let before = tracker.get(event.turn_id()).cloned();
            let _ = tracker.apply(event);
            if let Some(before) = before {
                let after = tracker.get(event.turn_id()).unwrap();
                if before.status.is_terminal() && !before.has_synthetic_outcome() {
                    prop_assert_eq!(&before, after);
                }
            }
        }
    }

    #[test]
    fn prop_items_never_replace_running_turn(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut tracker = TurnTracker::new(session());
        for op in &ops {
            match op {
                Op::Event(event) => {
                    let _ = tracker.apply(event);
                }
                Op::Item { turn_id, item_id } => {
                    let before = tracker.active().map(|turn| turn.turn_id.clone());
                    tracker.record_item(turn_id, item_id);
                    if let Some(before) = before {
                        let after = tracker.active().map(|turn| turn.turn_id.as_str());
                        prop_assert_eq!(after, Some(before.as_str()));
                    }
                }
            }
        }
    }
}
