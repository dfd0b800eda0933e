//! Property-based tests for edit history invariants
//!
//! Random operation sequences are applied to an [`EditHistory`] and to a plain model of two
//! stacks; after every step the history must agree with the model.

use eraser::{EditHistory, ImageBuffer, PixelFormat};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Push(u8),
    Undo,
    Redo,
    Reset(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u8>().prop_map(Op::Push),
        3 => Just(Op::Undo),
        2 => Just(Op::Redo),
        1 => any::<u8>().prop_map(Op::Reset),
    ]
}

fn buf(v: u8) -> ImageBuffer {
    ImageBuffer::new(1, 1, PixelFormat::Luma8, vec![v]).unwrap()
}

fn values(history: &EditHistory) -> (Vec<u8>, Vec<u8>) {
    (
        history.past().iter().map(|s| s.buffer().data()[0]).collect(),
        history.redo_stack().iter().map(|s| s.buffer().data()[0]).collect(),
    )
}

/// History agrees with a two-stack model under any operation sequence
#[test]
fn test_history_matches_model() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(any::<u8>(), prop::collection::vec(op_strategy(), 0..64)),
            |(initial, ops)| {
                let mut history = EditHistory::new();
                history.initialize(buf(initial));
                let mut past = vec![initial];
                let mut redo: Vec<u8> = Vec::new();

                for op in ops {
                    let generation = history.generation();
                    match op {
                        Op::Push(v) => {
                            let state = history.state_for(buf(v));
                            history.push(state).unwrap();
                            past.push(v);
                            redo.clear();
                        }
                        Op::Undo => {
                            history.undo().unwrap();
                            if past.len() > 1 {
                                redo.push(past.pop().unwrap());
                            }
                        }
                        Op::Redo => {
                            history.redo().unwrap();
                            if let Some(v) = redo.pop() {
                                past.push(v);
                            }
                        }
                        Op::Reset(v) => {
                            history.reset(buf(v));
                            prop_assert!(history.generation() > generation);
                            past = vec![v];
                            redo.clear();
                        }
                    }

                    prop_assert!(history.depth() >= 1);
                    let (actual_past, actual_redo) = values(&history);
                    prop_assert_eq!(&actual_past, &past);
                    prop_assert_eq!(&actual_redo, &redo);
                    prop_assert_eq!(
                        history.current().unwrap().buffer().data()[0],
                        *past.last().unwrap()
                    );
                }
                Ok(())
            },
        )
        .unwrap();
}

/// Undo followed by redo restores the same buffer and both stacks
#[test]
fn test_undo_redo_round_trip_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(any::<u8>(), 2..16), |pushes| {
            let mut history = EditHistory::new();
            history.initialize(buf(0));
            for v in pushes {
                let state = history.state_for(buf(v));
                history.push(state).unwrap();
            }
            history.undo().unwrap();

            let before_current = history.current().unwrap().clone();
            let (before_past, before_redo) = values(&history);

            history.undo().unwrap();
            let restored = history.redo().unwrap().clone();
            prop_assert!(restored.same_state(&before_current));
            prop_assert_eq!(values(&history), (before_past, before_redo));
            Ok(())
        })
        .unwrap();
}

/// States stamped before a reset are never accepted afterwards
#[test]
fn test_stale_states_rejected_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(1usize..5, any::<u8>()), |(resets, v)| {
            let mut history = EditHistory::new();
            history.initialize(buf(0));
            let stale = history.state_for(buf(v));
            for _ in 0..resets {
                history.reset(buf(1));
            }
            let before = values(&history);
            prop_assert!(history.push(stale).is_err());
            prop_assert_eq!(values(&history), before);
            Ok(())
        })
        .unwrap();
}
