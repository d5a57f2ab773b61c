//! Value types for pending messages and timers, and the tagged choice of
//! which one to deliver next.

use std::{
    cmp::Ordering,
    fmt::Display,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Instant,
};

use crate::Address;

////////////////////////////////////////////////////////////////////////////////

/// A message pending in the network. Value-equal; the network is a set of
/// these, and delivery never removes an envelope, so redelivery is always a
/// legal transition.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct MessageEnvelope {
    from: Address,
    to: Address,
    message: String,
}

impl MessageEnvelope {
    pub fn new(from: Address, to: Address, message: impl Into<String>) -> Self {
        Self {
            from,
            to,
            message: message.into(),
        }
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> &Address {
        &self.to
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for MessageEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Message({} -> {}, {})", self.from, self.to, self.message)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// An outstanding timer: destination, payload, the allowed duration range,
/// the concretely sampled duration, and the arming instant.
///
/// Equality, ordering and hashing cover only `(to, timer, min, max)`. The
/// sampled duration and the arming instant are bookkeeping, not identity.
#[derive(Debug, Clone)]
pub struct TimerEnvelope {
    to: Address,
    timer: String,
    min_duration_ms: u64,
    max_duration_ms: u64,
    duration_ms: u64,
    armed_at: Instant,
}

impl TimerEnvelope {
    pub fn new(
        to: Address,
        timer: impl Into<String>,
        min_duration_ms: u64,
        max_duration_ms: u64,
        duration_ms: u64,
    ) -> Self {
        assert!(min_duration_ms <= max_duration_ms, "timer range is empty");
        assert!(duration_ms >= min_duration_ms && duration_ms <= max_duration_ms);
        Self {
            to,
            timer: timer.into(),
            min_duration_ms,
            max_duration_ms,
            duration_ms,
            armed_at: Instant::now(),
        }
    }

    /// Timer with a fixed duration. Handy in tests and for protocols without
    /// jitter.
    pub fn fixed(to: Address, timer: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(to, timer, duration_ms, duration_ms, duration_ms)
    }

    pub fn to(&self) -> &Address {
        &self.to
    }

    pub fn timer(&self) -> &str {
        &self.timer
    }

    pub fn min_duration_ms(&self) -> u64 {
        self.min_duration_ms
    }

    pub fn max_duration_ms(&self) -> u64 {
        self.max_duration_ms
    }

    /// The concretely sampled duration, somewhere in `[min, max]`.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn armed_at(&self) -> Instant {
        self.armed_at
    }

    fn identity(&self) -> (&Address, &str, u64, u64) {
        (
            &self.to,
            self.timer.as_str(),
            self.min_duration_ms,
            self.max_duration_ms,
        )
    }
}

impl PartialEq for TimerEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for TimerEnvelope {}

impl Hash for TimerEnvelope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for TimerEnvelope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEnvelope {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Display for TimerEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timer(-> {}, {})", self.to, self.timer)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// The atomic choice of delivering one pending message or firing one
/// deliverable timer.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Transition {
    Message(Arc<MessageEnvelope>),
    Timer(TimerEnvelope),
}

impl Transition {
    pub fn is_message(&self) -> bool {
        matches!(self, Transition::Message(_))
    }
}

impl Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Message(m) => write!(f, "{}", m),
            Transition::Timer(t) => write!(f, "{}", t),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
