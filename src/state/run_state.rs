/// Run state definitions for tracking a crawl's lifecycle
///
/// This module defines the states a run moves through and the reasons a run
/// can end.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a crawl run
///
/// `Idle -> Running -> {Completed, Stopped, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run has been created but not started
    Idle,

    /// The fetch/extract/enqueue loop is active
    Running,

    // ===== Terminal States =====
    /// Frontier exhausted or a page/depth limit reached
    Completed,

    /// Cancelled by the operator or out of time; results remain valid
    Stopped,

    /// Continued crawling is meaningless (bad seed, corrupted state)
    Failed,
}

impl RunState {
    /// Returns true if this is a terminal state (no further mutation)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }

    /// Returns true if the run ended normally and its results can be emitted
    pub fn has_results(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped)
    }

    /// Converts the run state to its wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// No URLs left to fetch
    FrontierExhausted,

    /// The configured maximum page count was reached
    PageLimit,

    /// An operator asked the run to stop
    Cancelled,

    /// The configured time budget expired
    TimeBudget,

    /// The seed URL was rejected by the normalizer or scope filter
    SeedInvalid,

    /// The seed URL could not be reached at all
    SeedUnreachable,

    /// Internal bookkeeping was found inconsistent
    InvariantViolation,
}

impl TerminalReason {
    /// The run state a reason leads to
    pub fn run_state(&self) -> RunState {
        match self {
            Self::FrontierExhausted | Self::PageLimit => RunState::Completed,
            Self::Cancelled | Self::TimeBudget => RunState::Stopped,
            Self::SeedInvalid | Self::SeedUnreachable | Self::InvariantViolation => {
                RunState::Failed
            }
        }
    }

    /// Human readable description
    pub fn describe(&self) -> &'static str {
        match self {
            Self::FrontierExhausted => "frontier exhausted",
            Self::PageLimit => "page limit reached",
            Self::Cancelled => "stopped by request",
            Self::TimeBudget => "time budget expired",
            Self::SeedInvalid => "invalid seed",
            Self::SeedUnreachable => "seed unreachable",
            Self::InvariantViolation => "internal invariant violated",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
