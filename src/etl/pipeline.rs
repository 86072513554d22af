//! Runs one extract → transform → load pass
//!
//! `formfill` has two passes: page images to a record file, and a record
//! file into the host form. Both share this driver so they log and report
//! the same way.

use super::{Extractor, Loader, Transformer};
use eyre::{Context, Result};
use std::fmt;
use tokio::time::Instant;

/// Counts of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Items the extractor produced
    pub extracted: usize,
    /// Items the loader reported as delivered
    pub loaded: usize,
}

impl RunSummary {
    /// Items that reached the loader without being delivered
    pub fn missed(&self) -> usize {
        self.extracted.saturating_sub(self.loaded)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} item(s) loaded", self.loaded, self.extracted)
    }
}

/// One extractor, transformer and loader wired together
///
/// The loader stays reachable after the run so callers can read state it
/// keeps, such as per-record rows or the fill status.
pub struct Pipeline<E, T, L> {
    name: &'static str,
    extractor: E,
    transformer: T,
    loader: L,
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
    L: Loader<Item = T::Output>,
{
    pub fn new(extractor: E, transformer: T, loader: L) -> Self {
        Self {
            name: "pipeline",
            extractor,
            transformer,
            loader,
        }
    }

    /// Label used in log lines and error context
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Run all three stages
    ///
    /// An empty extraction still reaches the loader, so an empty batch ends
    /// in the loader's empty state rather than being skipped. Extract and
    /// transform failures carry the pipeline name; loader errors are passed
    /// through untouched so callers can downcast them.
    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();

        let items = self
            .extractor
            .extract()
            .await
            .with_context(|| format!("{}: extraction failed", self.name))?;
        let extracted = items.len();
        if extracted == 0 {
            log::warn!("{}: nothing extracted", self.name);
        } else {
            log::debug!("{}: extracted {} item(s)", self.name, extracted);
        }

        let transformed = self
            .transformer
            .transform_many(items)
            .with_context(|| format!("{}: transform failed", self.name))?;

        let loaded = self.loader.load(transformed).await?;
        let summary = RunSummary { extracted, loaded };

        log::info!("{}: {} in {:?}", self.name, summary, started.elapsed());
        if summary.missed() > 0 {
            log::warn!("{}: {} item(s) not delivered", self.name, summary.missed());
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::IdentityTransformer;
    use crate::record::RowRecord;
    use eyre::{Result, bail};
    use std::sync::Mutex;

    struct Records(Vec<RowRecord>);

    impl Extractor for Records {
        type Item = RowRecord;
        async fn extract(&self) -> Result<Vec<Self::Item>> {
            Ok(self.0.clone())
        }
    }

    /// Accepts records that carry a description
    #[derive(Default)]
    struct DescribedOnly(Mutex<Vec<RowRecord>>);

    impl Loader for DescribedOnly {
        type Item = RowRecord;
        async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
            let mut kept = self.0.lock().unwrap();
            kept.extend(items.into_iter().filter(|r| !r.is_blank("description")));
            Ok(kept.len())
        }
    }

    struct Unreadable;

    impl Extractor for Unreadable {
        type Item = RowRecord;
        async fn extract(&self) -> Result<Vec<Self::Item>> {
            bail!("line 3: expected value")
        }
    }

    #[tokio::test]
    async fn test_summary_counts_missed_records() {
        let pipeline = Pipeline::new(
            Records(vec![
                RowRecord::new().with("description", "Gauze"),
                RowRecord::new().with("quantity", 2.0),
            ]),
            IdentityTransformer::new(),
            DescribedOnly::default(),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary, RunSummary { extracted: 2, loaded: 1 });
        assert_eq!(summary.missed(), 1);
        assert_eq!(summary.to_string(), "1 of 2 item(s) loaded");
        assert_eq!(pipeline.loader().0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_extraction_reaches_loader() {
        let pipeline = Pipeline::new(
            Records(Vec::new()),
            IdentityTransformer::new(),
            DescribedOnly::default(),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary, RunSummary { extracted: 0, loaded: 0 });
    }

    #[tokio::test]
    async fn test_extract_error_names_pipeline() {
        let pipeline = Pipeline::new(Unreadable, IdentityTransformer::new(), DescribedOnly::default())
            .named("rehearse");

        let err = pipeline.run().await.unwrap_err();
        assert_eq!(err.to_string(), "rehearse: extraction failed");
        assert!(format!("{:?}", err).contains("line 3"));
    }
}
