//! Small protocol fixtures shared by the search tests.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::{
    envelope::MessageEnvelope,
    hash::{hash_value, HashType},
    node::{Context, Node, NodeError},
    predicate::Predicate,
    settings::SearchSettings,
    state::SearchState,
    Address,
};

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Msg {
    Foo,
    Bar,
}

pub fn encode(msg: &Msg) -> String {
    serde_json::to_string(msg).unwrap()
}

pub fn decode(payload: &str) -> Msg {
    serde_json::from_str(payload).unwrap()
}

pub fn msg_env(from: &str, to: &str, msg: &Msg) -> MessageEnvelope {
    MessageEnvelope::new(Address::from(from), Address::from(to), encode(msg))
}

////////////////////////////////////////////////////////////////////////////////

/// Sends one `Foo` to its peer on startup, flips `foo` on `Bar`, and fails
/// on `Foo`.
#[derive(Clone)]
pub struct NodeA {
    peer: Address,
    pub foo: bool,
}

impl NodeA {
    pub fn new(peer: Address) -> Self {
        Self { peer, foo: false }
    }
}

impl Node for NodeA {
    fn init(&mut self, ctx: &mut Context) {
        ctx.send(self.peer.clone(), encode(&Msg::Foo));
    }

    fn on_message(
        &mut self,
        msg: String,
        _from: Address,
        _to: Address,
        _ctx: &mut Context,
    ) -> Result<(), NodeError> {
        match decode(&msg) {
            Msg::Foo => Err(NodeError::new("unexpected-message", "a cannot handle Foo")),
            Msg::Bar => {
                self.foo = true;
                Ok(())
            }
        }
    }

    fn on_timer(&mut self, _timer: String, _to: Address, _ctx: &mut Context) -> Result<(), NodeError> {
        Ok(())
    }

    fn hash(&self) -> HashType {
        hash_value(&self.foo)
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Stateless responder: every `Foo` gets a `Foo` and a `Bar` back.
#[derive(Clone)]
pub struct NodeB;

impl Node for NodeB {
    fn init(&mut self, _ctx: &mut Context) {}

    fn on_message(
        &mut self,
        msg: String,
        from: Address,
        _to: Address,
        ctx: &mut Context,
    ) -> Result<(), NodeError> {
        if decode(&msg) == Msg::Foo {
            ctx.send(from.clone(), encode(&Msg::Foo));
            ctx.send(from, encode(&Msg::Bar));
        }
        Ok(())
    }

    fn on_timer(&mut self, _timer: String, _to: Address, _ctx: &mut Context) -> Result<(), NodeError> {
        Ok(())
    }

    fn hash(&self) -> HashType {
        0
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `a` and `b` wired at each other; the state space is tiny but contains a
/// reachable crash (deliver `Foo` back to `a`) and a reachable `foo` flag.
pub fn ab_system(settings: &SearchSettings) -> SearchState {
    let a = Address::from("a");
    let b = Address::from("b");
    SearchState::initial(
        vec![
            (a.clone(), Box::new(NodeA::new(b.clone())) as Box<dyn Node>),
            (b, Box::new(NodeB) as Box<dyn Node>),
        ],
        settings,
    )
}

pub fn foo_flag(state: &SearchState) -> bool {
    state
        .node(&Address::from("a"))
        .and_then(|n| n.as_any().downcast_ref::<NodeA>())
        .map(|n| n.foo)
        .unwrap_or(false)
}

pub fn foo_stays_unset() -> Predicate {
    Predicate::with_detail("a.foo stays unset", |s| {
        Ok((!foo_flag(s), Some("foo was set".to_owned())))
    })
}

////////////////////////////////////////////////////////////////////////////////

/// Sends one `Foo` to its peer on startup and otherwise stays quiet.
#[derive(Clone)]
pub struct PingNode {
    peer: Address,
}

impl PingNode {
    pub fn new(peer: Address) -> Self {
        Self { peer }
    }
}

impl Node for PingNode {
    fn init(&mut self, ctx: &mut Context) {
        ctx.send(self.peer.clone(), encode(&Msg::Foo));
    }

    fn on_message(
        &mut self,
        _msg: String,
        _from: Address,
        _to: Address,
        _ctx: &mut Context,
    ) -> Result<(), NodeError> {
        Ok(())
    }

    fn on_timer(&mut self, _timer: String, _to: Address, _ctx: &mut Context) -> Result<(), NodeError> {
        Ok(())
    }

    fn hash(&self) -> HashType {
        0
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Counts delivered `Foo`s up to a cap; past the cap redelivery leaves the
/// state unchanged, so the reachable space is finite.
#[derive(Clone)]
pub struct CounterNode {
    pub count: u64,
    cap: u64,
}

impl CounterNode {
    pub fn new(cap: u64) -> Self {
        Self { count: 0, cap }
    }
}

impl Node for CounterNode {
    fn init(&mut self, _ctx: &mut Context) {}

    fn on_message(
        &mut self,
        msg: String,
        _from: Address,
        _to: Address,
        _ctx: &mut Context,
    ) -> Result<(), NodeError> {
        if decode(&msg) == Msg::Foo && self.count < self.cap {
            self.count += 1;
        }
        Ok(())
    }

    fn on_timer(&mut self, _timer: String, _to: Address, _ctx: &mut Context) -> Result<(), NodeError> {
        Ok(())
    }

    fn hash(&self) -> HashType {
        hash_value(&self.count)
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Ping/counter pair: exactly `cap + 1` reachable configurations.
pub fn counter_system(cap: u64, settings: &SearchSettings) -> SearchState {
    let a = Address::from("a");
    let b = Address::from("b");
    SearchState::initial(
        vec![
            (a, Box::new(PingNode::new(b.clone())) as Box<dyn Node>),
            (b, Box::new(CounterNode::new(cap)) as Box<dyn Node>),
        ],
        settings,
    )
}

////////////////////////////////////////////////////////////////////////////////

/// Echoes every payload back with one more character appended, making the
/// reachable space infinite. The node holding a peer seeds the exchange.
#[derive(Clone)]
pub struct GrowNode {
    seed_peer: Option<Address>,
}

impl GrowNode {
    pub fn new(seed_peer: Option<Address>) -> Self {
        Self { seed_peer }
    }
}

impl Node for GrowNode {
    fn init(&mut self, ctx: &mut Context) {
        if let Some(peer) = &self.seed_peer {
            ctx.send(peer.clone(), "m");
        }
    }

    fn on_message(
        &mut self,
        msg: String,
        from: Address,
        _to: Address,
        ctx: &mut Context,
    ) -> Result<(), NodeError> {
        ctx.send(from, format!("{}x", msg));
        Ok(())
    }

    fn on_timer(&mut self, _timer: String, _to: Address, _ctx: &mut Context) -> Result<(), NodeError> {
        Ok(())
    }

    fn hash(&self) -> HashType {
        0
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn unbounded_system(settings: &SearchSettings) -> SearchState {
    let a = Address::from("a");
    let b = Address::from("b");
    SearchState::initial(
        vec![
            (
                a,
                Box::new(GrowNode::new(Some(b.clone()))) as Box<dyn Node>,
            ),
            (b, Box::new(GrowNode::new(None)) as Box<dyn Node>),
        ],
        settings,
    )
}

////////////////////////////////////////////////////////////////////////////////

/// Arms two timers on startup: `t1` in `[1, 2]` and `t2` in `[3, 4]`, so
/// `t2` cannot fire before `t1`.
#[derive(Clone)]
pub struct TimerNode {
    pub fired: Vec<String>,
}

impl TimerNode {
    pub fn new() -> Self {
        Self { fired: Vec::new() }
    }
}

impl Node for TimerNode {
    fn init(&mut self, ctx: &mut Context) {
        ctx.set_timer("t1", 1, 2);
        ctx.set_timer("t2", 3, 4);
    }

    fn on_message(
        &mut self,
        _msg: String,
        _from: Address,
        _to: Address,
        _ctx: &mut Context,
    ) -> Result<(), NodeError> {
        Ok(())
    }

    fn on_timer(&mut self, timer: String, _to: Address, _ctx: &mut Context) -> Result<(), NodeError> {
        self.fired.push(timer);
        Ok(())
    }

    fn hash(&self) -> HashType {
        hash_value(&self.fired)
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn timer_system(settings: &SearchSettings) -> SearchState {
    SearchState::initial(
        vec![(
            Address::from("t"),
            Box::new(TimerNode::new()) as Box<dyn Node>,
        )],
        settings,
    )
}

pub fn fired_timers(state: &SearchState) -> Vec<String> {
    state
        .node(&Address::from("t"))
        .and_then(|n| n.as_any().downcast_ref::<TimerNode>())
        .map(|n| n.fired.clone())
        .unwrap_or_default()
}
