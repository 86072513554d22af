//! Host page contract
//!
//! The row-fill engine never touches a DOM directly. Everything it needs from
//! the legacy form is expressed by [`HostPage`]: a control that appends a
//! blank row, addressable elements, an optional max-row counter, an
//! observable mutation signal, an optional item search, and a hook through
//! which blocking dialogs become abort signals.

mod memory;

pub use memory::{CatalogItem, Interaction, MemoryPage, PageBehavior};

use crate::fill::AbortHandle;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Observable state of one form element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ElementState {
    pub value: String,
    pub checked: bool,
    pub readonly: bool,
    pub visible: bool,
}

/// Result of an item search keyed by stock code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The search added a row for the item at this index
    CreatedRow(usize),
    /// The search finished without adding a row
    NoRow,
    /// The search did not finish in time
    TimedOut,
    /// The host has no item search
    Unsupported,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("element '{0}' not found")]
    MissingElement(String),

    #[error("element '{0}' is not visible")]
    Hidden(String),

    #[error("row request rejected: {0}")]
    RowRequest(String),
}

/// The legacy form as seen by the fill engine
pub trait HostPage: Send + Sync {
    /// Activate the control that appends one blank row
    fn request_row(&self) -> impl Future<Output = Result<(), PageError>> + Send;

    /// Host-maintained highest row index, if the host keeps one
    fn max_row(&self) -> impl Future<Output = Option<usize>> + Send;

    fn is_visible(&self, name: &str) -> impl Future<Output = bool> + Send;

    fn element(&self, name: &str) -> impl Future<Output = Option<ElementState>> + Send;

    fn focus(&self, name: &str) -> impl Future<Output = Result<(), PageError>> + Send;

    /// Set the value the way typing would, firing input and change
    fn commit(&self, name: &str, value: &str) -> impl Future<Output = Result<(), PageError>> + Send;

    fn blur(&self, name: &str) -> impl Future<Output = Result<(), PageError>> + Send;

    fn click(&self, name: &str) -> impl Future<Output = Result<(), PageError>> + Send;

    /// Generation counter bumped on every mutation of the row container
    fn mutations(&self) -> watch::Receiver<u64>;

    /// Look an item up by stock code through the host's own search
    fn search_item(
        &self,
        code: &str,
        timeout: Duration,
    ) -> impl Future<Output = SearchOutcome> + Send {
        let _ = (code, timeout);
        async { SearchOutcome::Unsupported }
    }

    /// Route blocking dialogs to `abort` until [`HostPage::release_dialogs`]
    fn intercept_dialogs(&self, abort: AbortHandle);

    fn release_dialogs(&self);
}
