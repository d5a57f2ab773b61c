//! Time-bounded random depth-first walks over the reachable state space.

use std::{
    sync::{atomic::Ordering, Arc},
    thread,
    time::Instant,
};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{settings::SearchSettings, state::SearchState};

use super::{
    bfs::{Checked, Shared},
    error::SearchError,
    results::SearchResults,
};

////////////////////////////////////////////////////////////////////////////////

/// Run random depth-first walks from `initial` under `settings`.
pub fn random_dfs(
    initial: SearchState,
    settings: SearchSettings,
) -> Result<SearchResults, SearchError> {
    RandomDfs::new(settings).run(initial)
}

/// Reusable walk driver; [`random_dfs`] is the one-shot form.
///
/// Walks descend along randomly ordered transitions; a walk that gets stuck
/// (every successor pruned or illegal) restarts from the initial state.
/// Unlike [`bfs`](super::bfs::bfs), visited states are not deduplicated and
/// the space is never reported exhausted, so without a terminal finding the
/// search runs until its time limit.
pub struct RandomDfs {
    settings: SearchSettings,
}

impl RandomDfs {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings }
    }

    pub fn run(&self, initial: SearchState) -> Result<SearchResults, SearchError> {
        let shared = Arc::new(Shared::new(self.settings.clone()));

        shared.explored.fetch_add(1, Ordering::Relaxed);
        shared.note_depth(initial.depth());
        let _ = shared.check_state(&initial);

        let threads = shared.settings.threads();
        let seed = shared.settings.seed();
        if threads == 1 {
            walk_loop(&shared, &initial, seed, true);
        } else {
            let mut workers = Vec::with_capacity(threads);
            for i in 0..threads {
                let shared = shared.clone();
                let initial = initial.clone();
                let seed = seed.wrapping_add(i as u64);
                workers.push(thread::spawn(move || {
                    walk_loop(&shared, &initial, seed, false);
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

fn walk_loop(shared: &Shared, initial: &SearchState, seed: u64, inline_status: bool) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut last_status = Instant::now();

    while !(shared.stopped() || shared.deadline_exceeded()) {
        // one walk; revisits count, there is no dedup
        shared.explored.fetch_add(1, Ordering::Relaxed);
        let mut current = initial.clone();
        loop {
            if inline_status {
                if let Some(interval) = shared.settings.status() {
                    if last_status.elapsed() >= interval {
                        shared.print_status();
                        last_status = Instant::now();
                    }
                }
            }
            if shared.stopped() || shared.deadline_exceeded() {
                return;
            }

            let mut transitions = current.transitions(&shared.settings);
            transitions.shuffle(&mut rng);

            let mut next = None;
            for transition in &transitions {
                let Some(successor) = current.step(transition, &shared.settings, true) else {
                    continue;
                };
                shared.explored.fetch_add(1, Ordering::Relaxed);
                shared.note_depth(successor.depth());
                match shared.check_state(&successor) {
                    Checked::Terminal => return,
                    Checked::Pruned => {}
                    Checked::Valid => {
                        next = Some(successor);
                        break;
                    }
                }
            }

            match next {
                Some(s) => current = s,
                // stuck; restart from the initial state
                None => break,
            }
        }
    }
}
