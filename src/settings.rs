//! Search configuration: predicates, resource limits, delivery policy.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{envelope::MessageEnvelope, predicate::Predicate, Address};

////////////////////////////////////////////////////////////////////////////////

const DEFAULT_RNG_SEED: u64 = 0x5eed;

/// Shared seeded source for timer-duration sampling. Cloning shares the
/// underlying generator, so every handler invocation in one search draws
/// from the same deterministic stream.
#[derive(Clone)]
pub(crate) struct Jitter {
    rng: Arc<Mutex<StdRng>>,
}

impl Jitter {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    pub(crate) fn sample(&self, min: u64, max: u64) -> u64 {
        if min == max {
            return min;
        }
        self.rng.lock().unwrap().random_range(min..=max)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Everything that shapes one search run, built with chained methods.
///
/// Delivery policy: a message delivers when the most specific matching
/// control allows it, checked link first, then sender, then receiver, then
/// the global network switch. Delivery from a node to itself is always
/// allowed.
#[derive(Clone)]
pub struct SearchSettings {
    invariants: Vec<Predicate>,
    goals: Vec<Predicate>,
    prunes: Vec<Predicate>,

    max_depth: Option<usize>,
    max_time: Option<Duration>,
    num_threads: usize,
    status_interval: Option<Duration>,

    network_active: bool,
    link_active: BTreeMap<(Address, Address), bool>,
    sender_active: BTreeMap<Address, bool>,
    receiver_active: BTreeMap<Address, bool>,
    timers_on: bool,
    node_timers_on: BTreeMap<Address, bool>,

    check_determinism: bool,
    check_idempotence: bool,
    minimize: bool,

    seed: u64,
    jitter: Jitter,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            invariants: Vec::new(),
            goals: Vec::new(),
            prunes: Vec::new(),
            max_depth: None,
            max_time: None,
            num_threads: thread::available_parallelism().map(usize::from).unwrap_or(1),
            status_interval: None,
            network_active: true,
            link_active: BTreeMap::new(),
            sender_active: BTreeMap::new(),
            receiver_active: BTreeMap::new(),
            timers_on: true,
            node_timers_on: BTreeMap::new(),
            check_determinism: false,
            check_idempotence: false,
            minimize: true,
            seed: DEFAULT_RNG_SEED,
            jitter: Jitter::new(DEFAULT_RNG_SEED),
        }
    }
}

impl SearchSettings {
    ////////////////////////////////////////////////////////////////////////////////
    // Predicates.

    /// Property expected to hold in every explored state.
    pub fn add_invariant(mut self, predicate: Predicate) -> Self {
        self.invariants.push(predicate);
        self
    }

    /// State the search hunts for; finding one ends the search.
    pub fn add_goal(mut self, predicate: Predicate) -> Self {
        self.goals.push(predicate);
        self
    }

    /// States matching a prune are valid but not expanded.
    pub fn add_prune(mut self, predicate: Predicate) -> Self {
        self.prunes.push(predicate);
        self
    }

    pub fn clear_invariants(mut self) -> Self {
        self.invariants.clear();
        self
    }

    pub fn clear_goals(mut self) -> Self {
        self.goals.clear();
        self
    }

    pub fn clear_prunes(mut self) -> Self {
        self.prunes.clear();
        self
    }

    pub(crate) fn invariants(&self) -> &[Predicate] {
        &self.invariants
    }

    pub(crate) fn goals(&self) -> &[Predicate] {
        &self.goals
    }

    pub(crate) fn prunes(&self) -> &[Predicate] {
        &self.prunes
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Limits and parallelism.

    /// States at this depth are checked but not expanded.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn max_time(mut self, limit: Duration) -> Self {
        self.max_time = Some(limit);
        self
    }

    pub fn num_threads(mut self, threads: usize) -> Self {
        assert!(threads > 0, "at least one worker is required");
        self.num_threads = threads;
        self
    }

    /// One worker, exploring inline on the calling thread. The exploration
    /// order is then fully deterministic.
    pub fn single_threaded(self) -> Self {
        self.num_threads(1)
    }

    /// Print progress lines at this interval while searching.
    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = Some(interval);
        self
    }

    pub(crate) fn depth_limit(&self) -> Option<usize> {
        self.max_depth
    }

    pub(crate) fn time_limit(&self) -> Option<Duration> {
        self.max_time
    }

    pub(crate) fn threads(&self) -> usize {
        self.num_threads
    }

    pub(crate) fn status(&self) -> Option<Duration> {
        self.status_interval
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Delivery policy.

    /// Global network switch; less specific than every other control.
    pub fn network_active(mut self, active: bool) -> Self {
        self.network_active = active;
        self
    }

    /// Most specific control: one directed link.
    pub fn link_active(mut self, from: Address, to: Address, active: bool) -> Self {
        self.link_active
            .insert((from.root_address(), to.root_address()), active);
        self
    }

    /// All messages sent by `addr`.
    pub fn sender_active(mut self, addr: Address, active: bool) -> Self {
        self.sender_active.insert(addr.root_address(), active);
        self
    }

    /// All messages delivered to `addr`.
    pub fn receiver_active(mut self, addr: Address, active: bool) -> Self {
        self.receiver_active.insert(addr.root_address(), active);
        self
    }

    /// Cut a node off in both directions.
    pub fn node_active(self, addr: Address, active: bool) -> Self {
        self.sender_active(addr.clone(), active)
            .receiver_active(addr, active)
    }

    /// Deactivate every link crossing group boundaries; links within a
    /// group are explicitly activated.
    pub fn partition(mut self, groups: Vec<Vec<Address>>) -> Self {
        let all: Vec<Address> = groups
            .iter()
            .flatten()
            .map(|a| a.root_address())
            .collect();
        for from in &all {
            for to in &all {
                self = self.link_active(from.clone(), to.clone(), false);
            }
        }
        for group in &groups {
            for from in group {
                for to in group {
                    self = self.link_active(from.clone(), to.clone(), true);
                }
            }
        }
        self
    }

    /// Global timer switch.
    pub fn deliver_timers(mut self, on: bool) -> Self {
        self.timers_on = on;
        self
    }

    /// Timer delivery at one node; overrides the global switch.
    pub fn deliver_timers_at(mut self, addr: Address, on: bool) -> Self {
        self.node_timers_on.insert(addr.root_address(), on);
        self
    }

    /// Policy check for one envelope, most specific control first.
    pub fn should_deliver(&self, envelope: &MessageEnvelope) -> bool {
        let from = envelope.from().root_address();
        let to = envelope.to().root_address();
        if from == to {
            return true;
        }
        if let Some(&active) = self.link_active.get(&(from.clone(), to.clone())) {
            return active;
        }
        if let Some(&active) = self.sender_active.get(&from) {
            return active;
        }
        if let Some(&active) = self.receiver_active.get(&to) {
            return active;
        }
        self.network_active
    }

    pub fn should_deliver_timers(&self, addr: &Address) -> bool {
        self.node_timers_on
            .get(&addr.root_address())
            .copied()
            .unwrap_or(self.timers_on)
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Self checks and minimization.

    /// Replay every explored transition and compare fingerprints.
    pub fn check_determinism(mut self, on: bool) -> Self {
        self.check_determinism = on;
        self
    }

    /// Redeliver every delivered message and compare fingerprints.
    pub fn check_idempotence(mut self, on: bool) -> Self {
        self.check_idempotence = on;
        self
    }

    /// Minimize the offending trace before reporting it (on by default).
    pub fn minimize(mut self, on: bool) -> Self {
        self.minimize = on;
        self
    }

    /// Reseed the timer-duration sampler and the random walk order.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.jitter = Jitter::new(seed);
        self
    }

    pub(crate) fn seed(&self) -> u64 {
        self.seed
    }

    pub(crate) fn determinism_checked(&self) -> bool {
        self.check_determinism
    }

    pub(crate) fn idempotence_checked(&self) -> bool {
        self.check_idempotence
    }

    pub(crate) fn minimized(&self) -> bool {
        self.minimize
    }

    pub(crate) fn jitter(&self) -> Jitter {
        self.jitter.clone()
    }
}

////////////////////////////////////////////////////////////////////////////////
