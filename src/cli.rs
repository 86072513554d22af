//! CLI helper functions

use crate::{
    config::Settings,
    etl::{IdentityTransformer, Pipeline, Transformer},
    extraction::{ImageExtractor, build_prompt},
    fill::{FillError, LoaderState, RowFillEngine, RowFillLoader},
    page::MemoryPage,
    record::RowRecord,
    schema::{DomNames, FieldCatalog, FieldType, SchemaRegistry},
    storage::{ImageDirectory, NdjsonReader, NdjsonWriter},
    transform::{Normalizer, Sanitizer},
};
use eyre::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Load the schema registry from `SCHEMA_FILE`/`--schema`, or the built-in one
///
/// A registry that cannot be loaded is fatal for every command.
pub fn load_registry(schema_file: Option<&Path>) -> Result<Arc<SchemaRegistry>> {
    let registry = SchemaRegistry::load(schema_file).context("Failed to load schema registry")?;
    log::debug!(
        "Schema {} with {} field(s), profiles: {}",
        registry.version(),
        registry.fields().len(),
        registry.profiles().join(", ")
    );
    Ok(Arc::new(registry))
}

/// Extract line items from images into an NDJSON record file
///
/// Pipeline: ImageExtractor → Normalizer → Sanitizer → NdjsonWriter
pub async fn extract_records(
    settings: &Settings,
    registry: Arc<SchemaRegistry>,
    inputs: &[PathBuf],
    output: &Path,
    transaction_type: &str,
) -> Result<usize> {
    let images = ImageDirectory::new(inputs)
        .with_max_pages(settings.max_pages)
        .read()?;
    log::info!("Read {} page image(s)", images.len());

    let client = settings.vision_client()?;
    log::info!("Using model {} at {}", client.model(), client.url());

    let extractor = ImageExtractor::new(client, registry.clone(), images)
        .with_transaction_type(transaction_type)
        .with_compression(settings.compression())
        .with_max_images(settings.max_images);
    let transformer = Normalizer::new(registry.clone(), transaction_type)
        .then(Sanitizer::new(registry));
    let writer = NdjsonWriter::new(output);

    let summary = Pipeline::new(extractor, transformer, writer)
        .named("extract")
        .run()
        .await?;
    log::info!("✓ Extracted {} record(s) to {}", summary.loaded, output.display());
    Ok(summary.loaded)
}

/// Outcome of a rehearsal fill
#[derive(Debug)]
pub struct Rehearsal {
    /// Row index per record, `None` where the row could not be created
    pub results: Vec<Option<usize>>,
    pub status: LoaderState,
    /// The host signal or stop that ended the batch early
    pub aborted: Option<String>,
}

/// In-memory host page for rehearsals, with the line total wired when the
/// registry has the fields for it
pub fn rehearsal_page(registry: &SchemaRegistry) -> MemoryPage {
    let page = MemoryPage::for_registry(registry);
    let has = |id: &str| registry.field(id).is_some();
    if has("line_total") && has("quantity") && has("unit_price") {
        page.with_line_total("line_total", "quantity", "unit_price")
    } else {
        page
    }
}

/// Fill an NDJSON record file into the in-memory host page
///
/// Pipeline: NdjsonReader → IdentityTransformer → RowFillLoader
pub async fn rehearse(
    settings: &Settings,
    registry: Arc<SchemaRegistry>,
    records: &Path,
    transaction_type: &str,
    dump: Option<&Path>,
) -> Result<Rehearsal> {
    let page = rehearsal_page(&registry);
    let engine =
        RowFillEngine::new(page.clone(), registry).with_timings(settings.timings.clone());
    let loader = RowFillLoader::new(engine)
        .with_transaction_type(transaction_type)
        .with_progress(|current: usize, total: usize| {
            log::info!("Row {}/{} done", current, total);
        });

    let pipeline = Pipeline::new(
        NdjsonReader::<RowRecord>::new(records),
        IdentityTransformer::new(),
        loader,
    )
    .named("rehearse");

    let aborted = match pipeline.run().await {
        Ok(_) => None,
        Err(e) => match e.downcast_ref::<FillError>() {
            Some(FillError::Aborted { reason, .. }) => Some(reason.to_string()),
            _ => return Err(e),
        },
    };

    if let Some(path) = dump {
        let form = serde_json::to_string_pretty(&page.snapshot())?;
        std::fs::write(path, form)
            .with_context(|| format!("Failed to write form state: {}", path.display()))?;
        log::info!("Form state written to {}", path.display());
    }

    let loader = pipeline.loader();
    Ok(Rehearsal {
        results: loader.results(),
        status: loader.status(),
        aborted,
    })
}

/// One resolved field as listed by `schema`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    pub id: String,
    pub kind: FieldType,
    pub calculated: bool,
    pub dom_name: String,
}

/// Fields active for a transaction type, with their DOM names for `row`
pub fn describe_fields(
    registry: &SchemaRegistry,
    transaction_type: &str,
    row: usize,
) -> Result<Vec<FieldRow>> {
    registry
        .resolve_fields(transaction_type)
        .into_iter()
        .map(|field| {
            Ok(FieldRow {
                id: field.id.clone(),
                kind: field.kind,
                calculated: field.is_calculated(),
                dom_name: registry.resolve_dom_name(&field.id, row)?,
            })
        })
        .collect()
}

/// The extraction prompt for a transaction type
pub fn prompt_for(registry: &SchemaRegistry, transaction_type: &str) -> String {
    build_prompt(registry, transaction_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> Arc<SchemaRegistry> {
        load_registry(None).unwrap()
    }

    #[test]
    fn test_missing_schema_file_is_fatal() {
        let err = load_registry(Some(Path::new("/nonexistent/schema.yml"))).unwrap_err();
        assert!(err.to_string().contains("schema registry"));
    }

    #[test]
    fn test_describe_fields() {
        let rows = describe_fields(&registry(), "transfer", 1).unwrap();
        assert_eq!(rows[0].id, "stock_code");
        assert_eq!(rows[0].dom_name, "grdLines$1$txtStockCode");
        assert!(rows.iter().all(|row| !row.calculated));
        assert!(rows.iter().all(|row| row.id != "unit_price"));
    }

    #[test]
    fn test_prompt_lists_profile_fields() {
        let prompt = prompt_for(&registry(), "sales");
        assert!(prompt.contains("free_of_charge"));
        assert!(!prompt.contains("lot_number"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rehearse_fills_and_dumps() {
        let temp = TempDir::new().unwrap();
        let records = temp.path().join("records.ndjson");
        let dump = temp.path().join("form.json");
        std::fs::write(
            &records,
            "{\"stock_code\":\"ST-1\",\"quantity\":2,\"unit_price\":1.5}\n{\"description\":\"Gauze\"}\n",
        )
        .unwrap();

        let settings = Settings {
            api_key: None,
            vision_url: url::Url::parse(crate::client::DEFAULT_URL).unwrap(),
            vision_model: crate::client::DEFAULT_MODEL.to_string(),
            target_image_kb: 100,
            max_images: 50,
            max_pages: 88,
            timings: crate::fill::FillTimings::default(),
            transaction_type: "purchase".to_string(),
            schema_file: None,
        };

        let rehearsal = rehearse(&settings, registry(), &records, "purchase", Some(&dump))
            .await
            .unwrap();
        assert_eq!(rehearsal.results, vec![Some(1), Some(2)]);
        assert_eq!(rehearsal.aborted, None);
        assert_eq!(
            rehearsal.status,
            LoaderState::Complete {
                filled: 2,
                attempted: 2
            }
        );

        let form: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&dump).unwrap()).unwrap();
        assert_eq!(form["grdLines$1$txtLineTotal"]["value"], "3");
        assert_eq!(form["grdLines$2$txtDescription"]["value"], "Gauze");
    }
}
