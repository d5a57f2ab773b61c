use std::time::Duration;

use thiserror::Error;

use crate::predicate::PredicateResult;

////////////////////////////////////////////////////////////////////////////////

/// Fatal search failures. An invariant violation or a crashing handler is a
/// *finding* and lands in the results; these are failures of the search run
/// itself.
#[derive(Error, Debug)]
pub enum SearchError {
    /// A prune predicate raised an error. Pruning decides which states get
    /// expanded, so an unanswerable prune makes the whole search suspect.
    #[error("prune predicate failed: {0}")]
    Prune(PredicateResult),

    /// Workers did not exit within the shutdown grace period.
    #[error("worker pool failed to shut down within {0:?}")]
    PoolShutdown(Duration),
}
