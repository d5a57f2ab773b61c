//! Persistent, copy-on-write system snapshots.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Debug, Display},
    sync::Arc,
};

use crate::{
    envelope::{MessageEnvelope, TimerEnvelope, Transition},
    hash::{hash_list, hash_set, hash_value, HashType},
    node::{Context, Node, NodeError},
    settings::SearchSettings,
    timers::TimerQueue,
    Address,
};

////////////////////////////////////////////////////////////////////////////////

/// One reachable system configuration: node states, the network set, the
/// per-node timer queues, plus a link to the predecessor and the transition
/// that produced it.
///
/// Snapshots are immutable and cheap to clone (an `Arc` bump). A successor
/// shares everything unchanged with its predecessor by reference.
///
/// Equality covers the configuration only, not the predecessor link,
/// producing transition or depth.
#[derive(Clone)]
pub struct SearchState {
    inner: Arc<Inner>,
}

struct Inner {
    nodes: BTreeMap<Address, Arc<dyn Node>>,
    network: BTreeSet<Arc<MessageEnvelope>>,
    timers: BTreeMap<Address, Arc<TimerQueue>>,
    previous: Option<SearchState>,
    transition: Option<Transition>,
    depth: usize,
    new_messages: Vec<Arc<MessageEnvelope>>,
    new_timers: Vec<TimerEnvelope>,
    error: Option<NodeError>,
}

impl SearchState {
    /// Build the initial snapshot: place every node under its root address
    /// and run its `init`, folding emissions into the shared network and
    /// timer queues.
    pub fn initial(
        nodes: impl IntoIterator<Item = (Address, Box<dyn Node>)>,
        settings: &SearchSettings,
    ) -> Self {
        let mut boxed: BTreeMap<Address, Box<dyn Node>> = BTreeMap::new();
        for (addr, node) in nodes {
            let addr = addr.root_address();
            let prev = boxed.insert(addr, node);
            assert!(prev.is_none(), "two nodes share an address");
        }

        let mut network = BTreeSet::new();
        let mut timers = BTreeMap::new();
        let mut new_messages = Vec::new();
        let mut new_timers = Vec::new();

        for (addr, node) in boxed.iter_mut() {
            let mut ctx = Context::new(addr.clone(), settings.jitter());
            node.init(&mut ctx);
            let (sent, set_timers) = ctx.into_emissions();

            for m in sent {
                let m = Arc::new(m);
                network.insert(m.clone());
                new_messages.push(m);
            }
            let mut queue = TimerQueue::new();
            for t in set_timers {
                queue.add(t.clone());
                new_timers.push(t);
            }
            timers.insert(addr.clone(), Arc::new(queue));
        }

        let nodes = boxed
            .into_iter()
            .map(|(a, n)| (a, Arc::from(n)))
            .collect::<BTreeMap<_, _>>();

        Self {
            inner: Arc::new(Inner {
                nodes,
                network,
                timers,
                previous: None,
                transition: None,
                depth: 0,
                new_messages,
                new_timers,
                error: None,
            }),
        }
    }

    ////////////////////////////////////////////////////////////////////////////////

    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    pub fn previous(&self) -> Option<&SearchState> {
        self.inner.previous.as_ref()
    }

    /// The transition that produced this state; `None` for the initial one.
    pub fn transition(&self) -> Option<&Transition> {
        self.inner.transition.as_ref()
    }

    /// Protocol-logic failure captured while producing this state. A state
    /// carrying an error is terminal.
    pub fn error(&self) -> Option<&NodeError> {
        self.inner.error.as_ref()
    }

    pub fn node(&self, addr: &Address) -> Option<&dyn Node> {
        self.inner
            .nodes
            .get(&addr.root_address())
            .map(|n| n.as_ref())
    }

    pub fn has_node(&self, addr: &Address) -> bool {
        self.inner.nodes.contains_key(&addr.root_address())
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.inner.nodes.keys()
    }

    pub fn network(&self) -> impl Iterator<Item = &MessageEnvelope> {
        self.inner.network.iter().map(|m| m.as_ref())
    }

    pub fn timers(&self, addr: &Address) -> Option<&TimerQueue> {
        self.inner.timers.get(&addr.root_address()).map(|q| &**q)
    }

    /// Envelopes first produced by the transition into this state.
    pub fn new_messages(&self) -> impl Iterator<Item = &MessageEnvelope> {
        self.inner.new_messages.iter().map(|m| m.as_ref())
    }

    pub fn new_timers(&self) -> impl Iterator<Item = &TimerEnvelope> {
        self.inner.new_timers.iter()
    }

    ////////////////////////////////////////////////////////////////////////////////

    /// Enumerate the legal transitions out of this state: every network
    /// envelope whose recipient exists and whose delivery the active policy
    /// allows, plus every deliverable timer at every address with timer
    /// delivery enabled.
    pub fn transitions(&self, settings: &SearchSettings) -> Vec<Transition> {
        let mut out = Vec::new();

        for m in &self.inner.network {
            if self.inner.nodes.contains_key(&m.to().root_address()) && settings.should_deliver(m) {
                out.push(Transition::Message(m.clone()));
            }
        }

        for (addr, queue) in &self.inner.timers {
            if settings.should_deliver_timers(addr) {
                for t in queue.deliverable() {
                    out.push(Transition::Timer(t.clone()));
                }
            }
        }

        out
    }

    /// Apply one transition, the total replay primitive: `None` means the
    /// transition is not (or no longer) legal here, never an error.
    pub fn step(
        &self,
        transition: &Transition,
        settings: &SearchSettings,
        skip_checks: bool,
    ) -> Option<SearchState> {
        match transition {
            Transition::Message(m) => self.step_message(m, settings, skip_checks),
            Transition::Timer(t) => self.step_timer(t, settings, skip_checks),
        }
    }

    /// Deliver a pending message. Delivery never removes the envelope from
    /// the network, so redelivering it later stays legal.
    ///
    /// With `skip_checks` the envelope-presence and delivery-policy checks
    /// are skipped (the caller already filtered via [`transitions`](Self::transitions)).
    pub fn step_message(
        &self,
        envelope: &MessageEnvelope,
        settings: &SearchSettings,
        skip_checks: bool,
    ) -> Option<SearchState> {
        let target = envelope.to().root_address();
        let node = self.inner.nodes.get(&target)?;

        if !skip_checks
            && !(self.inner.network.contains(envelope) && settings.should_deliver(envelope))
        {
            return None;
        }

        let mut node = node.clone_node();
        let mut ctx = Context::new(envelope.to().clone(), settings.jitter());
        let result = node.on_message(
            envelope.message().to_owned(),
            envelope.from().clone(),
            envelope.to().clone(),
            &mut ctx,
        );

        let envelope = self
            .inner
            .network
            .get(envelope)
            .cloned()
            .unwrap_or_else(|| Arc::new(envelope.clone()));
        Some(self.successor(target, node, ctx, Transition::Message(envelope), result.err(), None))
    }

    /// Whether the equivalent [`step_timer`](Self::step_timer) call with
    /// `skip_checks` would produce a successor.
    pub fn can_step_timer(&self, timer: &TimerEnvelope, settings: &SearchSettings) -> bool {
        let target = timer.to().root_address();
        self.inner.nodes.contains_key(&target)
            && settings.should_deliver_timers(&target)
            && self
                .inner
                .timers
                .get(&target)
                .is_some_and(|q| q.is_deliverable(timer))
    }

    /// Fire a deliverable timer. Exactly that timer is removed from its
    /// node's queue.
    pub fn step_timer(
        &self,
        timer: &TimerEnvelope,
        settings: &SearchSettings,
        skip_checks: bool,
    ) -> Option<SearchState> {
        let target = timer.to().root_address();
        let node = self.inner.nodes.get(&target)?;

        if !skip_checks && !self.can_step_timer(timer, settings) {
            return None;
        }

        let mut node = node.clone_node();
        let mut ctx = Context::new(timer.to().clone(), settings.jitter());
        let result = node.on_timer(timer.timer().to_owned(), timer.to().clone(), &mut ctx);

        Some(self.successor(
            target,
            node,
            ctx,
            Transition::Timer(timer.clone()),
            result.err(),
            Some(timer),
        ))
    }

    /// Assemble the successor: share everything with `self` except the
    /// addressed node and its timer queue, then fold in the handler's
    /// emissions.
    fn successor(
        &self,
        target: Address,
        node: Box<dyn Node>,
        ctx: Context,
        transition: Transition,
        error: Option<NodeError>,
        fired_timer: Option<&TimerEnvelope>,
    ) -> SearchState {
        let mut nodes = self.inner.nodes.clone();
        nodes.insert(target.clone(), Arc::from(node));

        let mut network = self.inner.network.clone();
        let mut timers = self.inner.timers.clone();
        let mut new_messages = Vec::new();
        let mut new_timers = Vec::new();

        let mut queue = timers
            .get(&target)
            .map(|q| (**q).clone())
            .unwrap_or_default();
        if let Some(t) = fired_timer {
            queue.remove(t);
        }

        let (sent, set_timers) = ctx.into_emissions();
        for m in sent {
            let m = Arc::new(m);
            network.insert(m.clone());
            new_messages.push(m);
        }
        for t in set_timers {
            debug_assert_eq!(t.to().root_address(), target);
            queue.add(t.clone());
            new_timers.push(t);
        }
        timers.insert(target, Arc::new(queue));

        SearchState {
            inner: Arc::new(Inner {
                nodes,
                network,
                timers,
                previous: Some(self.clone()),
                transition: Some(transition),
                depth: self.inner.depth + 1,
                new_messages,
                new_timers,
                error,
            }),
        }
    }

    ////////////////////////////////////////////////////////////////////////////////

    /// Ancestor chain from the initial state to `self`, inclusive.
    pub fn trace(&self) -> Vec<SearchState> {
        let mut trace = Vec::new();
        let mut cur = Some(self);
        while let Some(s) = cur {
            trace.push(s.clone());
            cur = s.previous();
        }
        trace.reverse();
        trace
    }

    /// One line per transition, for failure reports.
    pub fn format_trace(&self) -> String {
        let mut out = String::new();
        for s in self.trace() {
            if let Some(t) = s.transition() {
                out.push_str(&format!("{}\n", t));
            }
        }
        out
    }

    ////////////////////////////////////////////////////////////////////////////////

    /// Configuration fingerprint over (nodes, network, timers).
    pub fn hash(&self) -> HashType {
        let nodes = hash_list(
            self.inner
                .nodes
                .iter()
                .map(|(a, n)| hash_list([hash_value(a), n.hash()].into_iter())),
        );
        let network = hash_set(self.inner.network.iter().map(|m| hash_value(&**m)));
        let timers = hash_list(
            self.inner
                .timers
                .iter()
                .map(|(a, q)| hash_list([hash_value(a), hash_value(&**q)].into_iter())),
        );
        hash_list([nodes, network, timers].into_iter())
    }

    /// Dedup fingerprint: the configuration plus the captured error kind.
    /// An exceptional state is terminal and must not be deduplicated against
    /// an error-free state with the same configuration.
    pub(crate) fn search_hash(&self) -> HashType {
        match &self.inner.error {
            None => self.hash(),
            Some(e) => hash_list([self.hash(), hash_value(&e.kind)].into_iter()),
        }
    }
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.inner.network == other.inner.network
            && self.inner.timers == other.inner.timers
            && self.inner.nodes.len() == other.inner.nodes.len()
            && self
                .inner
                .nodes
                .iter()
                .zip(other.inner.nodes.iter())
                .all(|((a1, n1), (a2, n2))| a1 == a2 && n1.hash() == n2.hash())
    }
}

impl Eq for SearchState {}

impl Display for SearchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "State(depth={}, nodes=[", self.inner.depth)?;
        for (i, a) in self.inner.nodes.keys().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", a)?;
        }
        write!(f, "], network={{")?;
        for (i, m) in self.inner.network.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", m)?;
        }
        write!(f, "}}, timers={{")?;
        let mut first = true;
        for (a, q) in &self.inner.timers {
            if !q.is_empty() {
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                write!(f, "{}: {}", a, q)?;
            }
        }
        write!(f, "}})")
    }
}

impl Debug for SearchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}
