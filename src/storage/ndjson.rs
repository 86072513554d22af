//! NDJSON (Newline Delimited JSON) record files

use crate::etl::{Extractor, Loader};
use crate::record::RowRecord;

use eyre::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Read typed items from an NDJSON file
pub struct NdjsonReader<T = RowRecord> {
    path: PathBuf,
    _item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> NdjsonReader<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _item: PhantomData,
        }
    }

    /// Read all non-empty lines
    pub fn read(&self) -> Result<Vec<T>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read NDJSON file: {}", self.path.display()))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("Failed to parse line {} of {}", n + 1, self.path.display())
                })
            })
            .collect()
    }
}

impl<T: DeserializeOwned + Send> Extractor for NdjsonReader<T> {
    type Item = T;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        self.read()
    }
}

/// Write typed items to an NDJSON file
pub struct NdjsonWriter<T = RowRecord> {
    path: PathBuf,
    _item: PhantomData<fn(T)>,
}

impl<T: Serialize> NdjsonWriter<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _item: PhantomData,
        }
    }

    /// Replace the file with `items`, one per line
    pub fn write(&self, items: &[T]) -> Result<()> {
        let ndjson = items
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        let content = if ndjson.is_empty() {
            String::new()
        } else {
            format!("{}\n", ndjson)
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write NDJSON file: {}", self.path.display()))?;

        Ok(())
    }
}

impl<T: Serialize + Send> Loader for NdjsonWriter<T> {
    type Item = T;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        self.write(&items)?;
        log::info!("Wrote {} record(s) to {}", items.len(), self.path.display());
        Ok(items.len())
    }
}
