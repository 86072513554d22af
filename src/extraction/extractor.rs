//! Image extractor
//!
//! Turns document images into raw line items: compress each image, send it
//! with the schema prompt in its own request, parse the answer, and
//! concatenate the items in input order.

use super::compress::{CompressionOptions, compress_image};
use super::parse::{RawItem, parse_items};
use super::prompt::build_prompt;
use super::SourceImage;
use crate::client::{RetryPolicy, VisionModel};
use crate::etl::Extractor;
use crate::schema::SchemaRegistry;
use eyre::Result;
use std::sync::Arc;

/// Default cap on images per batch
pub const DEFAULT_MAX_IMAGES: usize = 50;

/// Terminal status of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// The model answered; items may still be empty
    Success,
    /// Every attempt was answered with an overload
    Exhausted,
    /// A non-retryable error ended the attempt
    Failed,
}

/// Transient per-image state, discarded once the image completes
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    pub image: String,
    pub attempts: u32,
    pub status: AttemptStatus,
    pub raw: Option<String>,
    pub items: Vec<RawItem>,
}

/// Extractor that reads line items out of document images
///
/// # Example
/// ```no_run
/// use formfill::client::VisionClient;
/// use formfill::etl::Extractor;
/// use formfill::extraction::{ImageExtractor, SourceImage};
/// use formfill::schema::SchemaRegistry;
/// use std::sync::Arc;
/// use url::Url;
///
/// # async fn example() -> eyre::Result<()> {
/// let registry = Arc::new(SchemaRegistry::builtin()?);
/// let client = VisionClient::try_new(Url::parse(formfill::client::DEFAULT_URL)?, "gemini-2.5-flash", "key")?;
/// let page = SourceImage::new("page-1.jpg", "image/jpeg", std::fs::read("page-1.jpg")?);
///
/// let extractor = ImageExtractor::new(client, registry, vec![page]).with_transaction_type("purchase");
/// let items = extractor.extract().await?;
/// # Ok(())
/// # }
/// ```
pub struct ImageExtractor<M> {
    model: M,
    registry: Arc<SchemaRegistry>,
    images: Vec<SourceImage>,
    transaction_type: String,
    compression: CompressionOptions,
    retry: RetryPolicy,
    max_images: usize,
}

impl<M: VisionModel> ImageExtractor<M> {
    pub fn new(model: M, registry: Arc<SchemaRegistry>, images: Vec<SourceImage>) -> Self {
        Self {
            model,
            registry,
            images,
            transaction_type: crate::schema::DEFAULT_PROFILE.to_string(),
            compression: CompressionOptions::default(),
            retry: RetryPolicy::default(),
            max_images: DEFAULT_MAX_IMAGES,
        }
    }

    pub fn with_transaction_type(mut self, transaction_type: impl Into<String>) -> Self {
        self.transaction_type = transaction_type.into();
        self
    }

    pub fn with_compression(mut self, compression: CompressionOptions) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    /// Run one image through compression, request, retry and parsing
    async fn extract_one(&self, prompt: &str, source: &SourceImage) -> ExtractionAttempt {
        let image = compress_image(source, &self.compression);

        let (result, attempts) = self
            .retry
            .run(|attempt| {
                log::debug!("Requesting {} (attempt {})", image.name, attempt);
                self.model.generate(prompt, &image)
            })
            .await;

        match result {
            Ok(raw) => {
                let items = parse_items(&raw);
                ExtractionAttempt {
                    image: source.name.clone(),
                    attempts,
                    status: AttemptStatus::Success,
                    raw: Some(raw),
                    items,
                }
            }
            Err(e) => {
                let status = if e.is_overloaded() {
                    AttemptStatus::Exhausted
                } else {
                    AttemptStatus::Failed
                };
                log::error!(
                    "Extraction of {} failed after {} attempt(s): {}",
                    source.name,
                    attempts,
                    e
                );
                ExtractionAttempt {
                    image: source.name.clone(),
                    attempts,
                    status,
                    raw: None,
                    items: Vec::new(),
                }
            }
        }
    }
}

impl<M: VisionModel> Extractor for ImageExtractor<M> {
    type Item = RawItem;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        let prompt = build_prompt(self.registry.as_ref(), &self.transaction_type);

        if self.images.len() > self.max_images {
            log::warn!(
                "{} images given, only the first {} are processed",
                self.images.len(),
                self.max_images
            );
        }
        let images = &self.images[..self.images.len().min(self.max_images)];

        let mut items = Vec::new();
        for (i, source) in images.iter().enumerate() {
            log::info!("Reading image {}/{}: {}", i + 1, images.len(), source);
            let attempt = self.extract_one(&prompt, source).await;
            log::debug!(
                "{}: {:?} after {} attempt(s), {} item(s), {} raw chars",
                attempt.image,
                attempt.status,
                attempt.attempts,
                attempt.items.len(),
                attempt.raw.as_ref().map_or(0, String::len)
            );
            items.extend(attempt.items);
        }

        log::info!(
            "Extracted {} line item(s) from {} image(s)",
            items.len(),
            images.len()
        );
        Ok(items)
    }
}
