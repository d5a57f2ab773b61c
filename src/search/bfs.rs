//! Multithreaded breadth-first search over the reachable state space.

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Condvar, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use colored::Colorize;

use crate::{
    hash::HashType, predicate::PredicateResult, settings::SearchSettings, state::SearchState,
};

use super::{
    error::SearchError,
    minimize::{minimize_exceptional_trace, minimize_trace},
    results::{EndCondition, ResultCell, SearchResults},
};

////////////////////////////////////////////////////////////////////////////////

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Run a breadth-first search from `initial` under `settings`.
pub fn bfs(initial: SearchState, settings: SearchSettings) -> Result<SearchResults, SearchError> {
    Bfs::new(settings).run(initial)
}

/// Reusable search driver; [`bfs`] is the one-shot form.
pub struct Bfs {
    settings: SearchSettings,
}

impl Bfs {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings }
    }

    /// Explore until a terminal state, a fatal error, or an exhausted
    /// limit. With one worker the search runs inline on the calling thread
    /// and the exploration order is deterministic; with more, workers pull
    /// states from a shared frontier and the first terminal finding wins.
    pub fn run(&self, initial: SearchState) -> Result<SearchResults, SearchError> {
        let shared = Arc::new(Shared::new(self.settings.clone()));

        shared
            .discovered
            .lock()
            .unwrap()
            .insert(initial.search_hash());
        shared.explored.fetch_add(1, Ordering::Relaxed);
        shared.note_depth(initial.depth());
        if let Checked::Valid = shared.check_state(&initial) {
            shared.frontier.lock().unwrap().push_back(initial);
        }

        let threads = shared.settings.threads();
        if threads == 1 {
            shared.worker_loop(true);
        } else {
            let mut workers = Vec::with_capacity(threads);
            for _ in 0..threads {
                let shared = shared.clone();
                workers.push(thread::spawn(move || {
                    shared.worker_loop(false);
                    shared.note_exit();
                }));
            }
            let status = shared.settings.status().map(|interval| {
                let shared = shared.clone();
                thread::spawn(move || shared.status_loop(interval))
            });

            shared.await_workers(threads)?;
            for w in workers {
                let _ = w.join();
            }
            if let Some(s) = status {
                let _ = s.join();
            }
        }

        shared.finalize()
    }
}

////////////////////////////////////////////////////////////////////////////////

pub(super) enum Checked {
    /// Ends the search; recorded in a result cell.
    Terminal,
    /// Valid but not expanded.
    Pruned,
    /// Goes on the frontier.
    Valid,
}

/// State shared by the workers of one search run; the random walk searcher
/// reuses it for checking, accounting and shutdown.
pub(super) struct Shared {
    pub(super) settings: SearchSettings,

    frontier: Mutex<VecDeque<SearchState>>,
    wakeup: Condvar,
    discovered: Mutex<HashSet<HashType>>,
    /// Workers currently expanding a state; the frontier is only truly
    /// empty when this drops to zero.
    active: AtomicUsize,
    stop: AtomicBool,

    space_exhausted: AtomicBool,
    violation: ResultCell<(SearchState, PredicateResult)>,
    goal: ResultCell<(SearchState, PredicateResult)>,
    exception: ResultCell<SearchState>,
    fatal: ResultCell<SearchError>,

    pub(super) explored: AtomicU64,
    max_depth: AtomicUsize,
    predicate_errors: AtomicUsize,
    check_failures: AtomicUsize,

    exit_count: Mutex<usize>,
    exit_cv: Condvar,

    started: Instant,
    deadline: Option<Instant>,
}

impl Shared {
    pub(super) fn new(settings: SearchSettings) -> Self {
        let deadline = settings.time_limit().map(|limit| Instant::now() + limit);
        Self {
            settings,
            frontier: Mutex::new(VecDeque::new()),
            wakeup: Condvar::new(),
            discovered: Mutex::new(HashSet::new()),
            active: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            space_exhausted: AtomicBool::new(false),
            violation: ResultCell::new(),
            goal: ResultCell::new(),
            exception: ResultCell::new(),
            fatal: ResultCell::new(),
            explored: AtomicU64::new(0),
            max_depth: AtomicUsize::new(0),
            predicate_errors: AtomicUsize::new(0),
            check_failures: AtomicUsize::new(0),
            exit_count: Mutex::new(0),
            exit_cv: Condvar::new(),
            started: Instant::now(),
            deadline,
        }
    }

    pub(super) fn halt(&self) {
        self.stop.store(true, Ordering::Release);
        self.wakeup.notify_all();
    }

    pub(super) fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(super) fn deadline_exceeded(&self) -> bool {
        match self.deadline {
            Some(d) if Instant::now() >= d => {
                self.halt();
                true
            }
            _ => false,
        }
    }

    pub(super) fn note_depth(&self, depth: usize) {
        self.max_depth.fetch_max(depth, Ordering::Relaxed);
    }

    ////////////////////////////////////////////////////////////////////////////////

    fn worker_loop(&self, inline_status: bool) {
        let mut last_status = Instant::now();
        loop {
            if inline_status {
                if let Some(interval) = self.settings.status() {
                    if last_status.elapsed() >= interval {
                        self.print_status();
                        last_status = Instant::now();
                    }
                }
            }

            let state = {
                let mut frontier = self.frontier.lock().unwrap();
                loop {
                    if self.stopped() || self.deadline_exceeded() {
                        return;
                    }
                    if let Some(s) = frontier.pop_front() {
                        // claimed before the lock drops, so no other worker
                        // can observe an empty frontier with nothing active
                        self.active.fetch_add(1, Ordering::AcqRel);
                        break s;
                    }
                    if self.active.load(Ordering::Acquire) == 0 {
                        self.space_exhausted.store(true, Ordering::Release);
                        self.halt();
                        return;
                    }
                    let (guard, _) = self
                        .wakeup
                        .wait_timeout(frontier, Duration::from_millis(100))
                        .unwrap();
                    frontier = guard;
                }
            };

            self.explore(&state);
            self.active.fetch_sub(1, Ordering::AcqRel);
            self.wakeup.notify_all();
        }
    }

    fn explore(&self, state: &SearchState) {
        for transition in state.transitions(&self.settings) {
            if self.stopped() || self.deadline_exceeded() {
                return;
            }
            let Some(successor) = state.step(&transition, &self.settings, true) else {
                continue;
            };
            if !self
                .discovered
                .lock()
                .unwrap()
                .insert(successor.search_hash())
            {
                continue;
            }
            self.explored.fetch_add(1, Ordering::Relaxed);
            self.note_depth(successor.depth());

            match self.check_state(&successor) {
                Checked::Terminal => return,
                Checked::Pruned => {}
                Checked::Valid => {
                    self.frontier.lock().unwrap().push_back(successor);
                    self.wakeup.notify_one();
                }
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////////

    pub(super) fn check_state(&self, state: &SearchState) -> Checked {
        if state.error().is_some() {
            self.record_exception(state);
            return Checked::Terminal;
        }

        for invariant in self.settings.invariants() {
            // an invariant that cannot be evaluated does not hold
            if let Some(result) = invariant.test_expecting(state, true) {
                if result.exception_thrown() {
                    self.predicate_errors.fetch_add(1, Ordering::Relaxed);
                    warn(&result.error_message());
                }
                self.record_violation(state, result);
                return Checked::Terminal;
            }
        }

        for goal in self.settings.goals() {
            match goal.test_expecting(state, false) {
                Some(result) if result.exception_thrown() => {
                    // counted and skipped; the goal may still match elsewhere
                    self.predicate_errors.fetch_add(1, Ordering::Relaxed);
                    warn(&result.error_message());
                }
                Some(result) => {
                    self.record_goal(state, result);
                    return Checked::Terminal;
                }
                None => {}
            }
        }

        self.run_self_checks(state);

        for prune in self.settings.prunes() {
            match prune.test_expecting(state, false) {
                Some(result) if result.exception_thrown() => {
                    self.predicate_errors.fetch_add(1, Ordering::Relaxed);
                    warn(&result.error_message());
                    self.halt();
                    self.fatal.fill(SearchError::Prune(result));
                    return Checked::Terminal;
                }
                Some(_) => return Checked::Pruned,
                None => {}
            }
        }

        if let Some(limit) = self.settings.depth_limit() {
            if state.depth() >= limit {
                return Checked::Pruned;
            }
        }

        Checked::Valid
    }

    fn run_self_checks(&self, state: &SearchState) {
        let (Some(transition), Some(previous)) = (state.transition(), state.previous()) else {
            return;
        };

        if self.settings.determinism_checked() {
            let ok = previous
                .step(transition, &self.settings, true)
                .is_some_and(|redo| redo.hash() == state.hash());
            if !ok {
                self.check_failures.fetch_add(1, Ordering::Relaxed);
                warn(&format!("non-deterministic transition: {}", transition));
            }
        }

        if self.settings.idempotence_checked() && transition.is_message() {
            let ok = state
                .step(transition, &self.settings, true)
                .is_some_and(|redo| redo.hash() == state.hash());
            if !ok {
                self.check_failures.fetch_add(1, Ordering::Relaxed);
                warn(&format!("message delivery is not idempotent: {}", transition));
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////////

    // Recording a finding halts scheduling first, then minimizes on the
    // discovering worker, then fills the write-once cell.

    fn record_violation(&self, state: &SearchState, result: PredicateResult) {
        self.halt();
        let state = if self.settings.minimized() {
            minimize_trace(state, &result, &self.settings)
        } else {
            state.clone()
        };
        self.violation.fill((state, result));
    }

    fn record_goal(&self, state: &SearchState, result: PredicateResult) {
        self.halt();
        let state = if self.settings.minimized() {
            minimize_trace(state, &result, &self.settings)
        } else {
            state.clone()
        };
        self.goal.fill((state, result));
    }

    fn record_exception(&self, state: &SearchState) {
        self.halt();
        let state = if self.settings.minimized() {
            minimize_exceptional_trace(state, &self.settings)
        } else {
            state.clone()
        };
        self.exception.fill(state);
    }

    ////////////////////////////////////////////////////////////////////////////////

    pub(super) fn note_exit(&self) {
        let mut exited = self.exit_count.lock().unwrap();
        *exited += 1;
        self.exit_cv.notify_all();
    }

    pub(super) fn await_workers(&self, total: usize) -> Result<(), SearchError> {
        let mut stop_since: Option<Instant> = None;
        let mut exited = self.exit_count.lock().unwrap();
        while *exited < total {
            let (guard, _) = self
                .exit_cv
                .wait_timeout(exited, Duration::from_millis(50))
                .unwrap();
            exited = guard;
            if *exited < total && self.stopped() {
                let since = *stop_since.get_or_insert_with(Instant::now);
                if since.elapsed() > SHUTDOWN_GRACE {
                    return Err(SearchError::PoolShutdown(SHUTDOWN_GRACE));
                }
            }
        }
        Ok(())
    }

    pub(super) fn status_loop(&self, interval: Duration) {
        let mut last = Instant::now();
        while !self.stopped() {
            thread::sleep(Duration::from_millis(50));
            if last.elapsed() >= interval {
                self.print_status();
                last = Instant::now();
            }
        }
    }

    pub(super) fn print_status(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let explored = self.explored.load(Ordering::Relaxed);
        let rate = if elapsed > 0.0 {
            explored as f64 / elapsed / 1000.0
        } else {
            0.0
        };
        println!(
            "{}",
            format!(
                "explored {} states, depth {} ({:.1}s, {:.1}K states/s)",
                explored,
                self.max_depth.load(Ordering::Relaxed),
                elapsed,
                rate
            )
            .dimmed()
        );
    }

    pub(super) fn finalize(&self) -> Result<SearchResults, SearchError> {
        if let Some(err) = self.fatal.take() {
            return Err(err);
        }

        let exception = self.exception.take();
        let violation = self.violation.take();
        let goal = self.goal.take();

        let end_condition = if exception.is_some() {
            EndCondition::ExceptionThrown
        } else if violation.is_some() {
            EndCondition::InvariantViolated
        } else if goal.is_some() {
            EndCondition::GoalFound
        } else if self.space_exhausted.load(Ordering::Acquire) {
            EndCondition::SpaceExhausted
        } else {
            EndCondition::TimeExhausted
        };

        Ok(SearchResults::new(
            end_condition,
            violation,
            goal,
            exception,
            self.explored.load(Ordering::Relaxed),
            self.max_depth.load(Ordering::Relaxed),
            self.predicate_errors.load(Ordering::Relaxed),
            self.check_failures.load(Ordering::Relaxed),
        ))
    }
}

fn warn(msg: &str) {
    eprintln!("{}", msg.yellow());
}
