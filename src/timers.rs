//! Per-node timer ordering structure.

use std::fmt::Display;

use crate::envelope::TimerEnvelope;

////////////////////////////////////////////////////////////////////////////////

/// Outstanding timers of a single node, in arming order.
///
/// The only constraint on delivery: if a node armed timer A before timer B
/// and `B.min >= A.max`, then A must fire before B.
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq)]
pub struct TimerQueue {
    timers: Vec<TimerEnvelope>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(&mut self, timer: TimerEnvelope) {
        self.timers.push(timer);
    }

    /// The frontier of timers currently legal to deliver: a timer is blocked
    /// iff its `min` is at least the running minimum of `max` over the timers
    /// emitted so far.
    pub fn deliverable(&self) -> impl Iterator<Item = &TimerEnvelope> {
        let mut min_max: Option<u64> = None;
        self.timers.iter().filter(move |t| {
            match min_max {
                Some(m) if t.min_duration_ms() >= m => false,
                _ => {
                    let new_min = match min_max {
                        Some(m) => m.min(t.max_duration_ms()),
                        None => t.max_duration_ms(),
                    };
                    min_max = Some(new_min);
                    true
                }
            }
        })
    }

    /// Whether `timer` is present (by value) and not blocked by an earlier
    /// still-outstanding timer.
    pub fn is_deliverable(&self, timer: &TimerEnvelope) -> bool {
        for t in &self.timers {
            if t == timer {
                return true;
            }
            if timer.min_duration_ms() >= t.max_duration_ms() {
                return false;
            }
        }
        false
    }

    /// Remove the first value-equal entry; removing a non-member is a no-op.
    pub fn remove(&mut self, timer: &TimerEnvelope) {
        if let Some(pos) = self.timers.iter().position(|t| t == timer) {
            self.timers.remove(pos);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimerEnvelope> {
        self.timers.iter()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Display for TimerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, t) in self.timers.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "]")
    }
}

////////////////////////////////////////////////////////////////////////////////
