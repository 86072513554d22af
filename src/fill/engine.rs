//! Row-fill engine
//!
//! Each record walks the same states: search the stock code (when present),
//! create a row unless the search already did, wait for the page to settle,
//! write the fields in registry order, and wait for it to settle again.
//! Per-row failures yield `None` for that record; only aborts and
//! configuration errors end the batch.

use super::abort::{AbortHandle, AbortReason};
use super::progress::ProgressSink;
use super::wait;
use crate::page::{HostPage, PageError, SearchOutcome};
use crate::record::{FieldValue, RowRecord};
use crate::schema::{
    DEFAULT_PROFILE, DomNames, FieldCatalog, FieldSpec, SchemaError, SchemaRegistry,
};
use crate::transform::coerce_value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;

/// Timeouts and pacing of the fill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillTimings {
    /// Absolute limit for a requested row to appear
    pub row_timeout: Duration,
    /// Polling fallback interval for every wait
    pub poll: Duration,
    pub pre_quiet: Duration,
    pub pre_budget: Duration,
    pub post_quiet: Duration,
    pub post_budget: Duration,
    /// Pause after each field write
    pub field_pace: Duration,
    pub search_timeout: Duration,
}

impl Default for FillTimings {
    fn default() -> Self {
        Self {
            row_timeout: Duration::from_millis(2500),
            poll: Duration::from_millis(25),
            pre_quiet: Duration::from_millis(100),
            pre_budget: Duration::from_millis(400),
            post_quiet: Duration::from_millis(150),
            post_budget: Duration::from_millis(600),
            field_pace: Duration::from_millis(40),
            search_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Error)]
pub enum FillError {
    /// The batch stopped early; `partial` holds the records processed so far
    #[error("{reason}")]
    Aborted {
        reason: AbortReason,
        partial: Vec<Option<usize>>,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl FillError {
    pub fn partial(&self) -> Option<&[Option<usize>]> {
        match self {
            Self::Aborted { partial, .. } => Some(partial),
            Self::Schema(_) => None,
        }
    }
}

/// Render a value the way a user would type it into the host
pub fn format_value(value: &FieldValue, decimal_separator: char) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Number(n) => n.to_string().replace('.', &decimal_separator.to_string()),
        FieldValue::Text(s) => s.clone(),
    }
}

/// Transient state of the row being filled
struct RowFillState {
    row: Option<usize>,
    searched: bool,
    cursor: usize,
    signal: watch::Receiver<u64>,
}

/// Routes host dialogs to the batch abort handle while alive
struct DialogGuard<'a, P: HostPage> {
    page: &'a P,
}

impl<'a, P: HostPage> DialogGuard<'a, P> {
    fn new(page: &'a P, abort: AbortHandle) -> Self {
        page.intercept_dialogs(abort);
        Self { page }
    }
}

impl<P: HostPage> Drop for DialogGuard<'_, P> {
    fn drop(&mut self) {
        self.page.release_dialogs();
    }
}

pub struct RowFillEngine<P> {
    page: P,
    registry: Arc<SchemaRegistry>,
    timings: FillTimings,
}

impl<P: HostPage> RowFillEngine<P> {
    pub fn new(page: P, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            page,
            registry,
            timings: FillTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: FillTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn timings(&self) -> &FillTimings {
        &self.timings
    }

    /// Fill every record into its own row, in order
    ///
    /// Returns one entry per record: the host row index, or `None` when the
    /// row could not be created.
    pub async fn fill_rows(
        &self,
        records: &[RowRecord],
        progress: &dyn ProgressSink,
        transaction_type: Option<&str>,
    ) -> Result<Vec<Option<usize>>, FillError> {
        self.fill_rows_with(records, progress, transaction_type, &AbortHandle::new())
            .await
    }

    /// [`Self::fill_rows`] with a caller-owned abort handle
    pub async fn fill_rows_with(
        &self,
        records: &[RowRecord],
        progress: &dyn ProgressSink,
        transaction_type: Option<&str>,
        abort: &AbortHandle,
    ) -> Result<Vec<Option<usize>>, FillError> {
        let fields = self
            .registry
            .resolve_fields(transaction_type.unwrap_or(DEFAULT_PROFILE));
        let total = records.len();
        let mut results = Vec::with_capacity(total);

        let guard = DialogGuard::new(&self.page, abort.clone());
        for (i, record) in records.iter().enumerate() {
            if abort.is_aborted() {
                break;
            }

            let row = self.fill_record(record, &fields, abort).await?;
            match row {
                Some(row) => log::info!("Record {}/{} filled into row {}", i + 1, total, row),
                None => log::warn!("Record {}/{} could not be placed in a row", i + 1, total),
            }
            results.push(row);
            progress.report(i + 1, total);
        }
        drop(guard);

        if let Some(reason) = abort.reason() {
            log::warn!("Fill stopped after {}/{} record(s): {}", results.len(), total, reason);
            return Err(FillError::Aborted {
                reason,
                partial: results,
            });
        }

        log::info!(
            "Filled {}/{} row(s)",
            results.iter().flatten().count(),
            total
        );
        Ok(results)
    }

    async fn fill_record(
        &self,
        record: &RowRecord,
        fields: &[&FieldSpec],
        abort: &AbortHandle,
    ) -> Result<Option<usize>, SchemaError> {
        let mut state = RowFillState {
            row: None,
            searched: false,
            cursor: 0,
            signal: self.page.mutations(),
        };

        if let Some(code) = self.stock_code(record, fields) {
            let outcome = tokio::select! {
                outcome = self.page.search_item(code, self.timings.search_timeout) => outcome,
                _ = abort.aborted() => {
                    log::debug!("Search for {} abandoned", code);
                    return Ok(None);
                }
            };
            match outcome {
                SearchOutcome::CreatedRow(row) => {
                    log::debug!("Search for {} created row {}", code, row);
                    state.row = Some(row);
                    state.searched = true;
                }
                SearchOutcome::TimedOut => {
                    log::warn!("Search for {} timed out", code);
                    return Ok(None);
                }
                SearchOutcome::NoRow => log::debug!("Search for {} added no row", code),
                SearchOutcome::Unsupported => {}
            }
        }

        if state.row.is_none() {
            if abort.is_aborted() {
                return Ok(None);
            }
            state.row = self.create_row(&mut state.signal, abort).await?;
        }
        let Some(row) = state.row else {
            return Ok(None);
        };

        if !self
            .settle(&mut state.signal, abort, self.timings.pre_quiet, self.timings.pre_budget)
            .await
        {
            log::debug!("Row {} still busy before fill, continuing", row);
        }

        let stock_id = self.registry.stock_field().map(|field| field.id.as_str());
        for field in fields {
            if abort.is_aborted() {
                log::debug!("Halting row {} after {} field(s)", row, state.cursor);
                return Ok(Some(row));
            }
            state.cursor += 1;
            if state.searched && stock_id == Some(field.id.as_str()) {
                continue;
            }
            if self.write_field(field, record.get(&field.id), row).await? {
                sleep(self.timings.field_pace).await;
            }
        }

        if !abort.is_aborted()
            && !self
                .settle(&mut state.signal, abort, self.timings.post_quiet, self.timings.post_budget)
                .await
        {
            log::debug!("Row {} still busy after fill, continuing", row);
        }
        Ok(Some(row))
    }

    fn stock_code<'r>(&self, record: &'r RowRecord, fields: &[&FieldSpec]) -> Option<&'r str> {
        let stock = self.registry.stock_field()?;
        if !fields.iter().any(|field| field.id == stock.id) {
            return None;
        }
        record
            .get(&stock.id)
            .and_then(FieldValue::as_str)
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    async fn settle(
        &self,
        signal: &mut watch::Receiver<u64>,
        abort: &AbortHandle,
        window: Duration,
        budget: Duration,
    ) -> bool {
        wait::quiet(signal, abort, window, budget, self.timings.poll).await
    }

    /// Highest existing row: the host counter, or the last visible row
    async fn current_max_row(&self, probe: &FieldSpec) -> Result<usize, SchemaError> {
        if let Some(max) = self.page.max_row().await {
            return Ok(max);
        }
        let mut row = 0;
        while self
            .page
            .is_visible(&self.registry.resolve_dom_name(&probe.id, row + 1)?)
            .await
        {
            row += 1;
        }
        Ok(row)
    }

    async fn create_row(
        &self,
        signal: &mut watch::Receiver<u64>,
        abort: &AbortHandle,
    ) -> Result<Option<usize>, SchemaError> {
        let Some(probe) = self.registry.fields().first() else {
            return Ok(None);
        };
        let expected = self.current_max_row(probe).await? + 1;
        let probe_name = self.registry.resolve_dom_name(&probe.id, expected)?;

        signal.borrow_and_update();
        if let Err(e) = self.page.request_row().await {
            log::warn!("Row request failed: {}", e);
            return Ok(None);
        }

        let page = &self.page;
        let probe_name = probe_name.as_str();
        let created = wait::until(
            signal,
            abort,
            self.timings.poll,
            self.timings.row_timeout,
            move || async move {
                page.max_row().await.is_some_and(|max| max >= expected)
                    || page.is_visible(probe_name).await
            },
        )
        .await;

        if created {
            Ok(Some(expected))
        } else if abort.is_aborted() {
            log::debug!("Stopped waiting for row {}", expected);
            Ok(None)
        } else {
            log::warn!(
                "Row {} did not appear within {:?}",
                expected,
                self.timings.row_timeout
            );
            Ok(None)
        }
    }

    /// Write one field; returns whether the page was touched
    async fn write_field(
        &self,
        field: &FieldSpec,
        value: Option<&FieldValue>,
        row: usize,
    ) -> Result<bool, SchemaError> {
        let name = self.registry.resolve_dom_name(&field.id, row)?;

        let result = if field.is_calculated() {
            self.touch(&name).await
        } else {
            let Some(value) = value
                .map(|value| coerce_value(field, value))
                .filter(|value| !value.is_blank())
            else {
                return Ok(false);
            };
            if field.is_toggle() {
                self.toggle(&name, &value).await
            } else {
                let text = format_value(&value, self.registry.decimal_separator());
                self.type_value(&name, &text).await
            }
        };

        match result {
            Ok(touched) => Ok(touched),
            Err(e) => {
                log::warn!("Skipping {} in row {}: {}", field.id, row, e);
                Ok(false)
            }
        }
    }

    /// Focus and blur without a value, so the host recalculates
    async fn touch(&self, name: &str) -> Result<bool, PageError> {
        self.page.focus(name).await?;
        self.page.blur(name).await?;
        Ok(true)
    }

    async fn toggle(&self, name: &str, value: &FieldValue) -> Result<bool, PageError> {
        let Some(desired) = value.as_bool() else {
            return Ok(false);
        };
        let current = self
            .page
            .element(name)
            .await
            .ok_or_else(|| PageError::MissingElement(name.to_string()))?;
        if current.checked == desired {
            return Ok(false);
        }
        self.page.click(name).await?;
        Ok(true)
    }

    async fn type_value(&self, name: &str, text: &str) -> Result<bool, PageError> {
        let readonly = self
            .page
            .element(name)
            .await
            .ok_or_else(|| PageError::MissingElement(name.to_string()))?
            .readonly;
        if readonly {
            return self.touch(name).await;
        }
        self.page.focus(name).await?;
        self.page.commit(name, text).await?;
        self.page.blur(name).await?;
        Ok(true)
    }
}
