//! Loader trait for delivering items to a destination

use eyre::Result;

/// Loader trait for loading items to a destination
///
/// Implementors define how to deliver items:
/// - Typing rows into a host form
/// - Writing NDJSON record files
///
/// # Example
/// ```no_run
/// use formfill::etl::Loader;
/// use eyre::Result;
///
/// struct StdoutLoader;
///
/// impl Loader for StdoutLoader {
///     type Item = String;
///
///     async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
///         for item in &items {
///             println!("{}", item);
///         }
///         Ok(items.len())
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// The type of items to load
    type Item: Send;

    /// Load items to the destination
    ///
    /// Returns the number of items successfully loaded
    ///
    /// # Errors
    /// Returns an error if loading fails as a whole (I/O, cancellation, etc.)
    fn load(
        &self,
        items: Vec<Self::Item>,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}
