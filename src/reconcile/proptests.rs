//! Property-based tests for item reconciliation

use super::*;
use crate::protocol::{ErrorDetail, ItemPayload, ItemStatus, SessionId, Upsert};
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

fn upsert(item_id: &str, status: ItemStatus, content: String, emitted_ms: i64) -> Upsert {
    let error = (status == ItemStatus::Error).then(|| ErrorDetail::new("failed", "item failed"));
    Upsert {
        turn_id: "turn-1".to_string(),
        session_id: SessionId::new("claude", "s1"),
        item_id: item_id.to_string(),
        source_timestamp: at(emitted_ms),
        emitted_at: at(emitted_ms),
        status,
        payload: ItemPayload::Message {
            content: Some(content),
            origin: None,
        },
        error,
    }
}

fn arb_status() -> impl Strategy<Value = ItemStatus> {
    prop_oneof![
        3 => Just(ItemStatus::Update),
        1 => Just(ItemStatus::Create),
        1 => Just(ItemStatus::Complete),
        1 => Just(ItemStatus::Error),
    ]
}

fn arb_upsert_for(item_id: &'static str) -> impl Strategy<Value = Upsert> {
    (arb_status(), "[a-z]{0,6}", 0i64..20)
        .prop_map(move |(status, content, ms)| upsert(item_id, status, content, ms))
}

/// Non-terminal updates in non-decreasing `emittedAt` order, optionally
/// closed by a terminal upsert
fn arb_ordered_stream() -> impl Strategy<Value = Vec<Upsert>> {
    (
        proptest::collection::vec(("[a-z]{0,6}", 0i64..3), 1..12),
        prop_oneof![Just(None), Just(Some(ItemStatus::Complete)), Just(Some(ItemStatus::Error))],
    )
        .prop_map(|(steps, terminal)| {
            let mut ms = 0;
            let last = steps.len() - 1;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (content, step))| {
                    ms += step;
                    let status = match (i, terminal) {
                        (0, _) if last > 0 => ItemStatus::Create,
                        (i, Some(status)) if i == last => status,
                        _ => ItemStatus::Update,
                    };
                    upsert("item", status, content, ms)
                })
                .collect()
        })
}

/// Snapshot with arrival bookkeeping removed, for comparing runs that
/// consumed different sequence numbers
fn normalized(snapshot: &ItemSnapshot) -> ItemSnapshot {
    ItemSnapshot {
        last_sequence: 0,
        ..snapshot.clone()
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_ordered_stream_ends_at_last_upsert(stream in arb_ordered_stream()) {
        let mut items = ItemMap::new();
        let mut last = &stream[0];
        for upsert in &stream {
            match items.apply(upsert) {
                Ok(_) => last = upsert,
                // Only redelivery of an identical upsert may be absorbed
                Err(discard) => {
                    let duplicate = matches!(discard, Discard::Duplicate { .. });
                    prop_assert!(duplicate, "unexpected discard {:?}", discard);
                }
            }
        }
        let snapshot = items.get("item").unwrap();

        prop_assert_eq!(snapshot.status, last.status);
        prop_assert_eq!(Some(snapshot.content.as_str()), last.payload.content());
        prop_assert_eq!(snapshot.last_emitted_at, last.emitted_at);
        prop_assert_eq!(&snapshot.error, &last.error);
    }

    #[test]
    fn prop_items_are_isolated(
        a_ops in proptest::collection::vec(arb_upsert_for("a"), 0..10),
        b_ops in proptest::collection::vec(arb_upsert_for("b"), 1..10),
        mask in proptest::collection::vec(any::<bool>(), 20),
    ) {
        // Interleave a and b according to mask, preserving each stream's order
        let mut interleaved = Vec::new();
        let (mut a_iter, mut b_iter) = (a_ops.iter().peekable(), b_ops.iter().peekable());
        let mut bits = mask.iter().cycle();
        while a_iter.peek().is_some() || b_iter.peek().is_some() {
            let take_a = *bits.next().unwrap();
            let next = if take_a { a_iter.next().or_else(|| b_iter.next()) } else { b_iter.next().or_else(|| a_iter.next()) };
            interleaved.extend(next);
        }

        let mut mixed = ItemMap::new();
        for upsert in &interleaved {
            let _ = mixed.apply(upsert);
        }
        let mut only_b = ItemMap::new();
        for upsert in &b_ops {
            let _ = only_b.apply(upsert);
        }

        prop_assert_eq!(
            normalized(mixed.get("b").unwrap()),
            normalized(only_b.get("b").unwrap())
        );
    }

    #[test]
    fn prop_reapplying_is_idempotent(ops in proptest::collection::vec(arb_upsert_for("x"), 1..12)) {
        let mut once = ItemMap::new();
        let mut twice = ItemMap::new();
        for upsert in &ops {
            let _ = once.apply(upsert);
            let _ = twice.apply(upsert);
            prop_assert!(twice.apply(upsert).is_err(), "second delivery must never change state");
        }
        prop_assert_eq!(normalized(once.get("x").unwrap()), normalized(twice.get("x").unwrap()));
    }

    #[test]
    fn prop_terminal_items_never_change(
        head in proptest::collection::vec(arb_upsert_for("t"), 0..6),
        tail in proptest::collection::vec(arb_upsert_for("t"), 1..8),
    ) {
        let mut items = ItemMap::new();
        for upsert in &head {
            let _ = items.apply(upsert);
        }
        if items.get("t").is_some_and(ItemSnapshot::is_terminal) {
            let frozen = items.get("t").unwrap().clone();
            for upsert in &tail {
                prop_assert!(items.apply(upsert).is_err());
            }
            prop_assert_eq!(items.get("t").unwrap(), &frozen);
        }
    }

    #[test]
    fn prop_first_upsert_always_creates(first in arb_upsert_for("n")) {
        let mut items = ItemMap::new();
        let change = items.apply(&first).unwrap();
        prop_assert!(change.is_create());
        prop_assert_eq!(change.implicit_create, first.status != ItemStatus::Create);
        prop_assert_eq!(change.current.status, first.status);
        prop_assert_eq!(Some(change.current.content.as_str()), first.payload.content());
    }
}
