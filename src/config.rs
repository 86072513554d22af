//! Runtime settings from the environment
//!
//! `main` sources the dotenv file first, so every value here may come from
//! `.env` or the process environment. Unset values fall back to defaults;
//! set but unreadable values are errors.
//!
//! | Variable           | Default                  |
//! |--------------------|--------------------------|
//! | `VISION_API_KEY`   | required for extraction  |
//! | `VISION_URL`       | Gemini v1beta endpoint   |
//! | `VISION_MODEL`     | `gemini-2.5-flash`       |
//! | `TARGET_IMAGE_KB`  | 100                      |
//! | `MAX_IMAGES`       | 50                       |
//! | `MAX_PAGES`        | 88                       |
//! | `ROW_TIMEOUT_MS`   | 2500                     |
//! | `PRE_QUIET_MS`     | 100                      |
//! | `PRE_BUDGET_MS`    | 400                      |
//! | `POST_QUIET_MS`    | 150                      |
//! | `POST_BUDGET_MS`   | 600                      |
//! | `FIELD_PACE_MS`    | 40                       |
//! | `TRANSACTION_TYPE` | `default`                |
//! | `SCHEMA_FILE`      | built-in schema          |

use crate::client::{DEFAULT_MODEL, DEFAULT_URL, REDACTED, VisionClient};
use crate::extraction::{CompressionOptions, DEFAULT_MAX_IMAGES};
use crate::fill::FillTimings;
use crate::schema::DEFAULT_PROFILE;
use crate::storage::DEFAULT_MAX_PAGES;
use eyre::{Context, Result, eyre};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_TARGET_KB: usize = 100;

#[derive(Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub vision_url: Url,
    pub vision_model: String,
    pub target_image_kb: usize,
    pub max_images: usize,
    pub max_pages: usize,
    pub timings: FillTimings,
    pub transaction_type: String,
    pub schema_file: Option<PathBuf>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("vision_url", &self.vision_url.as_str())
            .field("vision_model", &self.vision_model)
            .field("target_image_kb", &self.target_image_kb)
            .field("max_images", &self.max_images)
            .field("max_pages", &self.max_pages)
            .field("timings", &self.timings)
            .field("transaction_type", &self.transaction_type)
            .field("schema_file", &self.schema_file)
            .finish()
    }
}

/// Non-empty value of an environment variable
fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", name, raw)),
        None => Ok(default),
    }
}

fn millis(name: &str, default: Duration) -> Result<Duration> {
    parsed(name, default.as_millis() as u64).map(Duration::from_millis)
}

impl Settings {
    /// Read settings from environment variables
    pub fn from_env() -> Result<Self> {
        let url = var("VISION_URL").unwrap_or_else(|| DEFAULT_URL.to_string());
        let vision_url =
            Url::parse(&url).with_context(|| format!("Invalid VISION_URL: {}", url))?;

        let defaults = FillTimings::default();
        let timings = FillTimings {
            row_timeout: millis("ROW_TIMEOUT_MS", defaults.row_timeout)?,
            pre_quiet: millis("PRE_QUIET_MS", defaults.pre_quiet)?,
            pre_budget: millis("PRE_BUDGET_MS", defaults.pre_budget)?,
            post_quiet: millis("POST_QUIET_MS", defaults.post_quiet)?,
            post_budget: millis("POST_BUDGET_MS", defaults.post_budget)?,
            field_pace: millis("FIELD_PACE_MS", defaults.field_pace)?,
            ..defaults
        };

        Ok(Self {
            api_key: var("VISION_API_KEY"),
            vision_url,
            vision_model: var("VISION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            target_image_kb: parsed("TARGET_IMAGE_KB", DEFAULT_TARGET_KB)?,
            max_images: parsed("MAX_IMAGES", DEFAULT_MAX_IMAGES)?,
            max_pages: parsed("MAX_PAGES", DEFAULT_MAX_PAGES)?,
            timings,
            transaction_type: var("TRANSACTION_TYPE").unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            schema_file: var("SCHEMA_FILE").map(PathBuf::from),
        })
    }

    pub fn compression(&self) -> CompressionOptions {
        CompressionOptions::default().with_target_kb(self.target_image_kb)
    }

    /// Client for the configured vision endpoint; needs `VISION_API_KEY`
    pub fn vision_client(&self) -> Result<VisionClient> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| eyre!("VISION_API_KEY environment variable not set"))?;
        VisionClient::try_new(self.vision_url.clone(), &self.vision_model, api_key)
            .context("Failed to create vision client")
    }
}
