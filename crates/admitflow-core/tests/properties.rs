use std::collections::HashSet;

use admitflow_core::{AdmissionBuffer, Event};
use proptest::prelude::*;

type TestEvent = Event<u32, u8>;

/// Small id and timestamp alphabets so duplicates and ties are common.
fn event_strategy() -> impl Strategy<Value = TestEvent> {
    ("[a-e]{1,2}", 0u32..40, any::<u8>()).prop_map(|(id, ts, payload)| Event::new(id, ts, payload))
}

fn batches_strategy() -> impl Strategy<Value = Vec<Vec<TestEvent>>> {
    prop::collection::vec(prop::collection::vec(event_strategy(), 0..12), 1..8)
}

proptest! {
    #[test]
    fn no_identity_is_admitted_twice(batches in batches_strategy()) {
        let mut buf = AdmissionBuffer::new();
        let mut seen = HashSet::new();
        for batch in batches {
            for event in buf.admit(batch).expect("admit") {
                prop_assert!(seen.insert(event.id.clone()), "{} admitted twice", event.id);
            }
        }
        prop_assert_eq!(buf.admitted_count(), seen.len());
    }

    #[test]
    fn admitted_stream_is_strictly_increasing(batches in batches_strategy()) {
        let mut buf = AdmissionBuffer::new();
        let mut last: Option<u32> = None;
        for batch in batches {
            for event in buf.admit(batch).expect("admit") {
                if let Some(prev) = last {
                    prop_assert!(event.timestamp > prev);
                }
                last = Some(event.timestamp);
            }
            prop_assert_eq!(buf.watermark().copied(), last);
        }
    }

    #[test]
    fn watermark_never_regresses(batches in batches_strategy()) {
        let mut buf = AdmissionBuffer::new();
        for batch in batches {
            let before = buf.watermark().copied();
            buf.admit(batch).expect("admit");
            let after = buf.watermark().copied();
            prop_assert!(after >= before);
        }
    }

    #[test]
    fn resubmitting_a_batch_admits_nothing(
        warmup in prop::collection::vec(event_strategy(), 0..12),
        batch in prop::collection::vec(event_strategy(), 0..12),
    ) {
        let mut buf = AdmissionBuffer::new();
        buf.admit(warmup).expect("admit");
        buf.admit(batch.clone()).expect("admit");

        let watermark = buf.watermark().copied();
        let count = buf.admitted_count();
        let second = buf.admit(batch).expect("admit");
        prop_assert!(second.is_empty());
        prop_assert_eq!(buf.watermark().copied(), watermark);
        prop_assert_eq!(buf.admitted_count(), count);
    }

    #[test]
    fn batch_order_does_not_matter(
        warmup in prop::collection::vec(event_strategy(), 0..8),
        batch in prop::collection::vec(event_strategy(), 0..12)
            .prop_flat_map(|b| (Just(b.clone()), Just(b).prop_shuffle())),
    ) {
        let (original, shuffled) = batch;

        let mut left = AdmissionBuffer::new();
        let mut right = AdmissionBuffer::new();
        left.admit(warmup.clone()).expect("admit");
        right.admit(warmup).expect("admit");

        // Payloads may differ between same-(timestamp, id) copies, so compare
        // the decision keys.
        let key = |e: &TestEvent| (e.id.clone(), e.timestamp);
        let a: Vec<_> = left.admit(original).expect("admit").iter().map(key).collect();
        let b: Vec<_> = right.admit(shuffled).expect("admit").iter().map(key).collect();
        prop_assert_eq!(a, b);
        prop_assert_eq!(left.watermark(), right.watermark());
    }

    #[test]
    fn malformed_batch_leaves_state_untouched(
        warmup in prop::collection::vec(event_strategy(), 0..12),
        mut batch in prop::collection::vec(event_strategy(), 0..12),
        slot in any::<prop::sample::Index>(),
        ts in 0u32..40,
    ) {
        let mut buf = AdmissionBuffer::new();
        buf.admit(warmup).expect("admit");
        let watermark = buf.watermark().copied();
        let count = buf.admitted_count();

        let pos = slot.index(batch.len() + 1);
        batch.insert(pos, Event::new("", ts, 0));
        let membership: Vec<(String, bool)> = batch
            .iter()
            .map(|e| (e.id.to_string(), buf.is_admitted(e.id.as_str())))
            .collect();

        prop_assert!(buf.admit(batch).is_err());
        prop_assert_eq!(buf.watermark().copied(), watermark);
        prop_assert_eq!(buf.admitted_count(), count);
        for (id, was_admitted) in membership {
            prop_assert_eq!(buf.is_admitted(&id), was_admitted);
        }
    }
}
