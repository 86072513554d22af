//! Loader that fills row records into a host page

use super::abort::AbortHandle;
use super::engine::RowFillEngine;
use super::progress::{LoaderState, LoaderStatus, NoProgress, ProgressSink, TransitionError};
use crate::etl::Loader;
use crate::page::HostPage;
use crate::record::RowRecord;
use eyre::Result;
use std::sync::{Mutex, PoisonError};

/// Fills records into a host page through a [`RowFillEngine`]
///
/// The loader owns the batch abort handle; hand a clone to whatever may
/// need to stop the fill. Results of the last batch, partial ones included,
/// stay available through [`RowFillLoader::results`].
pub struct RowFillLoader<P> {
    engine: RowFillEngine<P>,
    transaction_type: Option<String>,
    abort: AbortHandle,
    progress: Box<dyn ProgressSink>,
    status: Mutex<LoaderStatus>,
    results: Mutex<Vec<Option<usize>>>,
}

impl<P: HostPage> RowFillLoader<P> {
    pub fn new(engine: RowFillEngine<P>) -> Self {
        Self {
            engine,
            transaction_type: None,
            abort: AbortHandle::new(),
            progress: Box::new(NoProgress),
            status: Mutex::new(LoaderStatus::new()),
            results: Mutex::new(Vec::new()),
        }
    }

    pub fn with_transaction_type(mut self, transaction_type: impl Into<String>) -> Self {
        self.transaction_type = Some(transaction_type.into());
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn engine(&self) -> &RowFillEngine<P> {
        &self.engine
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn status(&self) -> LoaderState {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
            .clone()
    }

    pub fn results(&self) -> Vec<Option<usize>> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, change: impl FnOnce(&mut LoaderStatus) -> Result<(), TransitionError>) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        match change(&mut status) {
            Ok(()) => log::debug!("Status: {}", status.state()),
            Err(e) => log::warn!("{}", e),
        }
    }

    fn store(&self, results: Vec<Option<usize>>) {
        *self.results.lock().unwrap_or_else(PoisonError::into_inner) = results;
    }
}

impl<P: HostPage> Loader for RowFillLoader<P> {
    type Item = RowRecord;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        let total = items.len();
        self.update(|status| {
            if status.state().is_terminal() {
                status.dismiss()?;
            }
            status.start(total)
        });

        let progress = |current: usize, total: usize| {
            self.update(|status| status.advance(current, total));
            self.progress.report(current, total);
        };

        match self
            .engine
            .fill_rows_with(&items, &progress, self.transaction_type.as_deref(), &self.abort)
            .await
        {
            Ok(results) => {
                let filled = results.iter().flatten().count();
                self.store(results);
                self.update(|status| status.finish(filled, total));
                log::info!("{}", self.status());
                Ok(filled)
            }
            Err(e) => {
                if let Some(partial) = e.partial() {
                    self.store(partial.to_vec());
                }
                self.update(|status| status.fail(e.to_string()));
                log::error!("{}", self.status());
                Err(e.into())
            }
        }
    }
}
