//! Bounded explicit-state model checker for message-passing distributed
//! protocols. Plug in [`Node`] implementations, describe the run with
//! [`SearchSettings`], and explore the reachable state space with [`bfs`]
//! or [`random_dfs`].

mod addr;
mod envelope;
mod hash;
mod node;
mod predicate;
mod search;
mod settings;
mod state;
mod timers;

////////////////////////////////////////////////////////////////////////////////

pub use addr::Address;

pub use node::{Context, Node, NodeError};

pub use envelope::{MessageEnvelope, TimerEnvelope, Transition};

pub use timers::TimerQueue;

pub use state::SearchState;

pub use predicate::{EvalError, Predicate, PredicateResult};

pub use settings::SearchSettings;

pub use hash::{hash_list, hash_set, HashType};

pub use search::{
    bfs::{bfs, Bfs},
    error::SearchError,
    minimize::{minimize_exceptional_trace, minimize_trace},
    random::{random_dfs, RandomDfs},
    results::{EndCondition, SearchResults},
};
