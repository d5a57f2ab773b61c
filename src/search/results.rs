use std::{
    fmt::Display,
    sync::Mutex,
};

use crate::{predicate::PredicateResult, state::SearchState};

////////////////////////////////////////////////////////////////////////////////

/// Why the search ended, strongest reason first: a crashing handler beats
/// an invariant violation beats a goal match beats running out of states
/// beats running out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCondition {
    ExceptionThrown,
    InvariantViolated,
    GoalFound,
    SpaceExhausted,
    TimeExhausted,
}

////////////////////////////////////////////////////////////////////////////////

/// Write-once slot shared between workers; the first writer wins and later
/// writes are dropped.
pub(crate) struct ResultCell<T> {
    slot: Mutex<Option<T>>,
}

impl<T> ResultCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store `value` unless another worker got here first.
    pub(crate) fn fill(&self, value: T) {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    pub(crate) fn take(&self) -> Option<T> {
        self.slot.lock().unwrap().take()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Outcome of one search run.
#[derive(Debug)]
pub struct SearchResults {
    end_condition: EndCondition,
    invariant_violation: Option<(SearchState, PredicateResult)>,
    goal_match: Option<(SearchState, PredicateResult)>,
    exceptional_state: Option<SearchState>,
    states_explored: u64,
    max_depth_explored: usize,
    predicate_errors: usize,
    check_failures: usize,
}

impl SearchResults {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        end_condition: EndCondition,
        invariant_violation: Option<(SearchState, PredicateResult)>,
        goal_match: Option<(SearchState, PredicateResult)>,
        exceptional_state: Option<SearchState>,
        states_explored: u64,
        max_depth_explored: usize,
        predicate_errors: usize,
        check_failures: usize,
    ) -> Self {
        Self {
            end_condition,
            invariant_violation,
            goal_match,
            exceptional_state,
            states_explored,
            max_depth_explored,
            predicate_errors,
            check_failures,
        }
    }

    pub fn end_condition(&self) -> EndCondition {
        self.end_condition
    }

    /// The state that broke an invariant, minimized if minimization is on.
    pub fn invariant_violating_state(&self) -> Option<&SearchState> {
        self.invariant_violation.as_ref().map(|(s, _)| s)
    }

    pub fn invariant_violated(&self) -> Option<&PredicateResult> {
        self.invariant_violation.as_ref().map(|(_, r)| r)
    }

    pub fn goal_matching_state(&self) -> Option<&SearchState> {
        self.goal_match.as_ref().map(|(s, _)| s)
    }

    pub fn goal_matched(&self) -> Option<&PredicateResult> {
        self.goal_match.as_ref().map(|(_, r)| r)
    }

    /// The state whose producing handler returned an error, minimized if
    /// minimization is on.
    pub fn exceptional_state(&self) -> Option<&SearchState> {
        self.exceptional_state.as_ref()
    }

    pub fn states_explored(&self) -> u64 {
        self.states_explored
    }

    pub fn max_depth_explored(&self) -> usize {
        self.max_depth_explored
    }

    /// Goal evaluations that raised an error; counted and skipped, never an
    /// end condition.
    pub fn predicate_errors(&self) -> usize {
        self.predicate_errors
    }

    /// Determinism or idempotence check failures observed during the run.
    pub fn check_failures(&self) -> usize {
        self.check_failures
    }
}

impl Display for SearchResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Search ended: {:?} ({} states, max depth {})",
            self.end_condition, self.states_explored, self.max_depth_explored
        )?;
        if let Some((s, r)) = &self.invariant_violation {
            writeln!(f, "Invariant violated: {}", r.error_message())?;
            writeln!(f, "========= TRACE =========")?;
            write!(f, "{}", s.format_trace())?;
        }
        if let Some((s, r)) = &self.goal_match {
            writeln!(f, "Goal matched: {}", r.predicate())?;
            writeln!(f, "========= TRACE =========")?;
            write!(f, "{}", s.format_trace())?;
        }
        if let Some(s) = &self.exceptional_state {
            if let Some(e) = s.error() {
                writeln!(f, "Handler failed: {}", e)?;
            }
            writeln!(f, "========= TRACE =========")?;
            write!(f, "{}", s.format_trace())?;
        }
        Ok(())
    }
}
