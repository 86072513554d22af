//! Progress reporting and loader status
//!
//! Progress callbacks are advisory: they are told `(current, total)` once per
//! processed record and never influence the fill itself.

use std::fmt;
use thiserror::Error;

/// Receiver of `(current, total)` progress updates
pub trait ProgressSink: Send + Sync {
    fn report(&self, current: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, current: usize, total: usize) {
        self(current, total)
    }
}

/// Sink that discards updates
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _current: usize, _total: usize) {}
}

/// Presentation state of a fill batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Progress { current: usize, total: usize },
    Complete { filled: usize, attempted: usize },
    Empty,
    Error(String),
}

impl LoaderState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
            Self::Empty => "empty",
            Self::Error(_) => "error",
        }
    }

    /// Complete, empty and error stay until dismissed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Empty | Self::Error(_))
    }
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Progress { current, total } => write!(f, "filling row {}/{}", current, total),
            Self::Complete { filled, attempted } => {
                write!(f, "filled {} of {} row(s)", filled, attempted)
            }
            Self::Empty => write!(f, "nothing to fill"),
            Self::Error(message) => write!(f, "failed: {}", message),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid loader transition from {from} to {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

/// Loader state with enforced transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderStatus {
    state: LoaderState,
}

impl Default for LoaderStatus {
    fn default() -> Self {
        Self {
            state: LoaderState::Idle,
        }
    }
}

impl LoaderStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LoaderState {
        &self.state
    }

    /// Move to `next` if the transition is allowed
    pub fn transition(&mut self, next: LoaderState) -> Result<(), TransitionError> {
        use LoaderState::*;

        let allowed = match (&self.state, &next) {
            (Idle, Progress { .. }) => true,
            (Progress { current, .. }, Progress { current: next_current, .. }) => {
                next_current >= current
            }
            (Progress { .. }, Complete { .. } | Empty | Error(_)) => true,
            (Progress { .. }, Idle) => true,
            (from, Idle) => from.is_terminal(),
            _ => false,
        };

        if !allowed {
            return Err(TransitionError {
                from: self.state.name(),
                to: next.name(),
            });
        }

        log::debug!("Loader status: {} -> {}", self.state.name(), next.name());
        self.state = next;
        Ok(())
    }

    pub fn start(&mut self, total: usize) -> Result<(), TransitionError> {
        self.transition(LoaderState::Progress { current: 0, total })
    }

    pub fn advance(&mut self, current: usize, total: usize) -> Result<(), TransitionError> {
        self.transition(LoaderState::Progress { current, total })
    }

    /// Terminal state for a finished batch: empty when nothing was attempted
    pub fn finish(&mut self, filled: usize, attempted: usize) -> Result<(), TransitionError> {
        if attempted == 0 {
            self.transition(LoaderState::Empty)
        } else {
            self.transition(LoaderState::Complete { filled, attempted })
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(LoaderState::Error(message.into()))
    }

    /// Back to idle: clears a terminal state, or drops a running batch
    /// without a result
    pub fn dismiss(&mut self) -> Result<(), TransitionError> {
        self.transition(LoaderState::Idle)
    }
}
