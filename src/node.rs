//! Protocol-facing node capability.

use std::any::Any;

use thiserror::Error;

use crate::{
    envelope::{MessageEnvelope, TimerEnvelope},
    hash::HashType,
    settings::Jitter,
    Address,
};

////////////////////////////////////////////////////////////////////////////////

/// Failure raised by protocol logic inside a handler.
///
/// The checker captures it on the resulting state snapshot and reports the
/// run as `EXCEPTION_THROWN`; it never propagates out of a step. The `kind`
/// identifies the class of failure and is what crash minimization matches on.
#[derive(Error, Debug, Clone, Hash, PartialEq, Eq)]
#[error("{kind}: {info}")]
pub struct NodeError {
    pub kind: String,
    pub info: String,
}

impl NodeError {
    pub fn new(kind: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            info: info.into(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// One deterministic protocol node.
///
/// Handlers receive a [`Context`] through which the node may synchronously
/// send messages, broadcast, and arm timers. Handlers returning `Err` model
/// protocol-logic exceptions: the error is captured on the successor state
/// and ends that branch of the search.
pub trait Node: Send + Sync {
    /// Called once when the node is placed into the initial state.
    fn init(&mut self, ctx: &mut Context);

    /// Called when a message addressed to this node (or one of its
    /// sub-components, see `to`) is delivered.
    fn on_message(
        &mut self,
        msg: String,
        from: Address,
        to: Address,
        ctx: &mut Context,
    ) -> Result<(), NodeError>;

    /// Called when an armed timer fires.
    fn on_timer(&mut self, timer: String, to: Address, ctx: &mut Context)
        -> Result<(), NodeError>;

    /// Fingerprint of the node state, folded into the state fingerprint used
    /// for deduplication.
    fn hash(&self) -> HashType;

    /// Value clone used by copy-on-write stepping.
    fn clone_node(&self) -> Box<dyn Node>;

    /// Downcast hook for predicates inspecting concrete node state.
    fn as_any(&self) -> &dyn Any;
}

////////////////////////////////////////////////////////////////////////////////

/// Output collector handed to node handlers.
///
/// Emissions are recorded here synchronously and folded into the successor
/// snapshot by the stepper once the handler returns.
pub struct Context {
    self_addr: Address,
    jitter: Jitter,
    sent: Vec<MessageEnvelope>,
    set_timers: Vec<TimerEnvelope>,
}

impl Context {
    pub(crate) fn new(self_addr: Address, jitter: Jitter) -> Self {
        Self {
            self_addr,
            jitter,
            sent: Vec::new(),
            set_timers: Vec::new(),
        }
    }

    /// Address the current handler was invoked on. For message delivery this
    /// is the envelope's `to` (possibly a sub-address).
    pub fn self_addr(&self) -> &Address {
        &self.self_addr
    }

    /// Send a message. The payload is recorded by value; mutating node state
    /// afterwards does not affect what was sent.
    pub fn send(&mut self, to: Address, msg: impl Into<String>) {
        self.sent
            .push(MessageEnvelope::new(self.self_addr.clone(), to, msg));
    }

    /// Send the same message to every recipient.
    pub fn broadcast(&mut self, to: impl IntoIterator<Item = Address>, msg: impl Into<String>) {
        let msg = msg.into();
        for recipient in to {
            self.send(recipient, msg.clone());
        }
    }

    /// Arm a timer for this node firing after some duration in
    /// `[min_ms, max_ms]`. The concrete duration is sampled from the
    /// configured seeded source; at search time any moment in the range is
    /// explored subject to the timer ordering rule.
    pub fn set_timer(&mut self, timer: impl Into<String>, min_ms: u64, max_ms: u64) {
        assert!(min_ms <= max_ms, "timer range is empty");
        let duration_ms = self.jitter.sample(min_ms, max_ms);
        self.set_timers.push(TimerEnvelope::new(
            self.self_addr.clone(),
            timer,
            min_ms,
            max_ms,
            duration_ms,
        ));
    }

    pub(crate) fn into_emissions(self) -> (Vec<MessageEnvelope>, Vec<TimerEnvelope>) {
        (self.sent, self.set_timers)
    }
}
