//! Time Machine Property Tests
//!
//! Properties that must hold for any sequence of messages pulled by a
//! standalone actor, independent of the scheduler.

mod common;

use common::{Ledger, Op};
use proptest::prelude::*;
use rewind_actors::{Actor, Envelope, Origin, PullOutcome};

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u32>().prop_map(Op::Push),
        1 => Just(Op::Poison),
    ]
}

proptest! {
    #[test]
    fn history_has_one_snapshot_per_success(ops in prop::collection::vec(op_strategy(), 0..24)) {
        let actor = Actor::new("ledger", Ledger::new(), Vec::new());
        for op in &ops {
            actor.receive_message(Envelope::new(Origin::System, op.clone())).unwrap();
        }

        let mut expected = Vec::new();
        tokio_test::block_on(async {
            for op in &ops {
                match actor.pull().await {
                    Ok(PullOutcome::Processed) => {}
                    other => {
                        assert!(other.is_err(), "unexpected outcome {:?}", other);
                        // Failed heads stay queued; discard to move on
                        assert!(rewind_actors::Supervised::discard_head(&actor));
                    }
                }
                if let Op::Push(value) = op {
                    expected.push(*value);
                }
            }
        });

        let history = actor.history();
        prop_assert_eq!(history.len(), expected.len());
        for (position, snapshot) in history.iter().enumerate() {
            prop_assert_eq!(&snapshot.state[..], &expected[..=position]);
        }
        prop_assert!(actor.mailbox().is_empty());
        prop_assert_eq!(actor.state(), expected);
    }

    #[test]
    fn snapshot_mailbox_is_remaining_queue(values in prop::collection::vec(any::<u32>(), 1..16)) {
        let actor = Actor::new("ledger", Ledger::new(), Vec::new());
        for value in &values {
            actor.receive_message(Envelope::new(Origin::System, Op::Push(*value))).unwrap();
        }

        tokio_test::block_on(async {
            while actor.pull().await.unwrap() == PullOutcome::Processed {}
        });

        for (position, snapshot) in actor.history().iter().enumerate() {
            let remaining: Vec<Op> = snapshot.mailbox.iter().map(|e| e.message().clone()).collect();
            let queued: Vec<Op> = values[position + 1..].iter().map(|v| Op::Push(*v)).collect();
            prop_assert_eq!(remaining, queued);
        }
    }
}
