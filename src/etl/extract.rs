//! Extractor trait for pulling items out of a source

use eyre::Result;

/// Extractor trait for extracting items from a source
///
/// Implementors define how to produce items from sources like:
/// - Document images sent to a vision model
/// - NDJSON record files
///
/// # Example
/// ```no_run
/// use formfill::etl::Extractor;
/// use eyre::Result;
/// use std::path::PathBuf;
///
/// struct LineFileExtractor {
///     path: PathBuf,
/// }
///
/// impl Extractor for LineFileExtractor {
///     type Item = String;
///
///     async fn extract(&self) -> Result<Vec<Self::Item>> {
///         Ok(std::fs::read_to_string(&self.path)?
///             .lines()
///             .map(String::from)
///             .collect())
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// The type of items extracted
    type Item: Send;

    /// Extract items from the source
    ///
    /// # Errors
    /// Returns an error if the source as a whole is unusable. Per-item
    /// failures are expected to be absorbed by the implementor.
    fn extract(&self) -> impl std::future::Future<Output = Result<Vec<Self::Item>>> + Send;
}
