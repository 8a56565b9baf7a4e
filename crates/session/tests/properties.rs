mod common;

use std::time::Duration;

use common::world;
use proptest::prelude::*;
use vigil_exam_model::{OptionId, Phase};
use vigil_session::{SessionEvent, WriteOp};

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Timer,
    Manual,
    Warning,
    Tick,
}

fn trigger() -> impl Strategy<Value = Trigger> {
    prop_oneof![
        Just(Trigger::Timer),
        Just(Trigger::Manual),
        Just(Trigger::Warning),
        Just(Trigger::Tick),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// However timer expiry and manual submits interleave after Active,
    /// exactly one submission is written.
    #[test]
    fn prop_interleaved_triggers_write_exactly_once(
        triggers in prop::collection::vec(trigger(), 1..12),
        deadline_passes in any::<bool>(),
        answered in 0usize..4,
    ) {
        runtime().block_on(async {
            let mut w = world(60);
            let (mut session, _peer) = w.active().await;
            let handle = session.handle();
            for q in w.questions.iter().take(answered) {
                session.answer(q.id, OptionId::B).unwrap();
            }
            if deadline_passes {
                w.clock.advance(Duration::from_secs(90));
            }

            let mut any_submit = deadline_passes;
            for t in &triggers {
                match t {
                    Trigger::Timer => {
                        any_submit = true;
                        handle.send(SessionEvent::TimerExpired);
                    }
                    Trigger::Manual => {
                        any_submit = true;
                        handle.submit();
                    }
                    Trigger::Warning => {
                        handle.send(SessionEvent::ProctorWarning("noise".into()));
                    }
                    Trigger::Tick => tokio::time::sleep(Duration::from_millis(1500)).await,
                }
                session.process_pending().await.unwrap();
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
            session.process_pending().await.unwrap();

            let expected = u32::from(any_submit);
            assert_eq!(w.store.writes(WriteOp::CompleteSession), expected);
            assert_eq!(w.store.writes(WriteOp::MarkTestTaken), expected);
            assert!(w.store.writes(WriteOp::InsertSubmissions) <= expected);
            if any_submit {
                assert_eq!(session.phase(), Phase::Completed);
                assert_eq!(session.receipt().unwrap().answered, answered);
                assert_eq!(w.store.snapshot().await.submissions.len(), answered);
            } else {
                assert_eq!(session.phase(), Phase::Active);
            }
        });
    }
}
