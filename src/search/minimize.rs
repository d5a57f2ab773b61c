//! Trace minimization: shorten an offending trace while preserving the
//! predicate outcome that made it interesting.

use std::collections::VecDeque;

use crate::{
    envelope::Transition,
    predicate::{Predicate, PredicateResult},
    settings::SearchSettings,
    state::SearchState,
};

////////////////////////////////////////////////////////////////////////////////

/// Shorten the trace ending in `state` while `expected` keeps reproducing:
/// same boolean value, or for an exceptional result any exceptional
/// outcome of the same predicate.
///
/// Each pass walks the trace backwards, replaying the suffix with one event
/// dropped; a replay that reproduces the outcome is adopted, one that is no
/// longer legal (some event refuses to apply) is abandoned. Passes repeat
/// until none of them shortens the trace, so the result is minimal with
/// respect to single-event removal but not guaranteed globally minimal.
pub fn minimize_trace(
    state: &SearchState,
    expected: &PredicateResult,
    settings: &SearchSettings,
) -> SearchState {
    let mut best = state.clone();
    loop {
        let mut shortened = false;
        let mut suffix: VecDeque<Transition> = VecDeque::new();

        let mut cursor = best.clone();
        while let Some(previous) = cursor.previous().cloned() {
            let candidate = apply_transitions(&previous, &suffix, settings);
            if reproduces(&candidate, expected) {
                best = candidate;
                shortened = true;
            } else if let Some(t) = cursor.transition() {
                suffix.push_front(t.clone());
            }
            cursor = previous;
        }

        if !shortened {
            break;
        }
    }
    best
}

/// Minimize a trace ending in a handler failure, preserving the error kind.
pub fn minimize_exceptional_trace(state: &SearchState, settings: &SearchSettings) -> SearchState {
    let Some(error) = state.error() else {
        return state.clone();
    };

    let kind = error.kind.clone();
    let predicate = Predicate::new("a handler error of the original kind occurred", move |s| {
        s.error().is_some_and(|e| e.kind == kind)
    });
    let expected = predicate.test(state);
    debug_assert_eq!(expected.value(), Some(true));
    minimize_trace(state, &expected, settings)
}

/// Replay `transitions` on top of `initial`, stopping at the first one that
/// is no longer legal.
fn apply_transitions(
    initial: &SearchState,
    transitions: &VecDeque<Transition>,
    settings: &SearchSettings,
) -> SearchState {
    let mut state = initial.clone();
    for t in transitions {
        match state.step(t, settings, false) {
            Some(next) => state = next,
            None => break,
        }
    }
    state
}

fn reproduces(candidate: &SearchState, expected: &PredicateResult) -> bool {
    match expected.value() {
        // an exceptional outcome reproduces as any exceptional outcome
        None => expected.predicate().test(candidate).exception_thrown(),
        Some(v) => matches!(
            expected.predicate().test_expecting(candidate, !v),
            Some(r) if !r.exception_thrown()
        ),
    }
}
