//! Row-fill engine and its coordination primitives
//!
//! - [`RowFillEngine`] drives row creation and field writes on a [`HostPage`](crate::page::HostPage)
//! - [`AbortHandle`] carries cooperative cancellation through the batch
//! - [`ProgressSink`] and [`LoaderStatus`] report progress to a front end
//! - [`wait`] holds the single wait primitive every suspension point uses

mod abort;
mod engine;
mod loader;
mod progress;
pub mod wait;

pub use abort::{AbortHandle, AbortReason};
pub use engine::{FillError, FillTimings, RowFillEngine, format_value};
pub use loader::RowFillLoader;
pub use progress::{LoaderState, LoaderStatus, NoProgress, ProgressSink, TransitionError};
