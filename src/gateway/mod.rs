//! Progress gateway
//!
//! Lets callers outside the engine start runs, watch them and stop them:
//!
//! - `ProgressSnapshot`: a consistent point-in-time view of one run
//! - `ProgressEvent`: pushed to subscribers as pages are recorded
//! - `RunRegistry`: owns every run started through the gateway, keyed by id
//!
//! Observers only ever take read locks on a run's state; the engine task is
//! the only writer.

mod progress;
mod registry;

pub use progress::{ProgressEvent, ProgressSnapshot, RunId};
pub use registry::{GatewayError, RunRegistry, DEFAULT_RETENTION};

use crate::state::{read, SharedState};

/// Takes a snapshot of a shared run state
pub fn snapshot(state: &SharedState) -> ProgressSnapshot {
    ProgressSnapshot::capture(&read(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{shared, CrawlState, RunState};

    #[test]
    fn test_snapshot_of_shared_state() {
        let state = shared(CrawlState::new("http://example.test/"));
        let snapshot = snapshot(&state);
        assert_eq!(snapshot.seed, "http://example.test/");
        assert_eq!(snapshot.state, RunState::Idle);
    }
}
