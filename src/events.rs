//! Event payloads and the observer protocol.
//!
//! Workers emit [`SearchEvent`] values synchronously on the thread that
//! produced them. Observers must therefore be thread-safe, and consumers
//! with thread-affinity requirements marshal to their own thread.

use std::time::Duration;

use crate::errors::SearchError;
use crate::progress::ProgressSnapshot;
use crate::results::SearchMatch;

/// Identifier used on error events that are not tied to a single source,
/// such as the notice emitted when the parallel pass is retried sequentially.
pub const GENERAL_ERROR_ID: &str = "(general error)";

/// Event emitted during a search run.
#[derive(Debug)]
pub enum SearchEvent {
    /// Periodic counter sample.
    Progress(ProgressSnapshot),
    /// All matches found in one source, in source order. Emitted once per
    /// source and only when at least one match was found.
    MatchFound {
        source_id: String,
        matches: Vec<SearchMatch>,
    },
    /// A source failed to scan, or the engine hit a recoverable fault.
    Error {
        source_id: String,
        error: SearchError,
    },
    /// Previously delivered results are stale and must be discarded; fired
    /// before the sequential retry re-scans every source.
    Reset,
    /// The run finished. Fired exactly once per successful `begin`, with the
    /// final counters and any unrecovered fatal error. Cancelled runs
    /// complete with `error: None`.
    Completed {
        elapsed: Duration,
        counters: ProgressSnapshot,
        error: Option<SearchError>,
    },
}

/// Receiver for search events.
///
/// Implementations must be safe to call from multiple worker threads
/// concurrently; dispatch happens inline on the producing worker.
pub trait SearchObserver: Send + Sync {
    fn notify(&self, event: &SearchEvent);
}
