//! Integration tests for the row-fill engine against the in-memory host page

use formfill::fill::{AbortReason, FillError, FillTimings, NoProgress, RowFillEngine};
use formfill::page::{Interaction, MemoryPage, PageBehavior};
use formfill::record::RowRecord;
use formfill::schema::SchemaRegistry;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ORDERED: &str = r#"
version: 1.0.0
decimal_separator: "."
fields:
  - id: a
    type: string
    dom: { base: "grid$", suffix: "{row}$a" }
  - id: b
    type: number
    dom: { base: "grid$", suffix: "{row}$b" }
  - id: c
    type: string
    dom: { base: "grid$", suffix: "{row}$c" }
profiles:
  default: [c, a, b]
"#;

fn builtin() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::builtin().unwrap())
}

fn records(n: usize) -> Vec<RowRecord> {
    (0..n)
        .map(|i| {
            RowRecord::new()
                .with("description", format!("Item {}", i + 1))
                .with("quantity", (i + 1) as f64)
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_fields_written_in_registry_order() {
    let registry = Arc::new(SchemaRegistry::from_yaml(ORDERED).unwrap());
    let engine = RowFillEngine::new(MemoryPage::for_registry(&registry), registry);

    let record = RowRecord::new()
        .with("a", "alpha")
        .with("b", 2.5)
        .with("c", "gamma");
    engine.fill_rows(&[record], &NoProgress, None).await.unwrap();

    let names: Vec<String> = engine
        .page()
        .commits()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["grid$1$c", "grid$1$a", "grid$1$b"]);
    assert_eq!(engine.page().value("grid$1$b").as_deref(), Some("2.5"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_row_yields_null_and_batch_continues() {
    for k in 0..4 {
        let page = MemoryPage::for_registry(&builtin()).fail_request(k);
        let engine = RowFillEngine::new(page, builtin());

        let results = engine
            .fill_rows(&records(4), &NoProgress, None)
            .await
            .expect("per-row failures never fail the batch");

        assert_eq!(results.len(), 4);
        for (i, result) in results.iter().enumerate() {
            if i == k {
                assert_eq!(*result, None, "record {} of k={}", i, k);
            } else {
                assert!(result.is_some(), "record {} of k={}", i, k);
            }
        }
        let rows: Vec<usize> = results.iter().flatten().copied().collect();
        assert!(rows.windows(2).all(|w| w[0] < w[1]), "indices are monotonic");
    }
}

#[tokio::test(start_paused = true)]
async fn test_row_timeout_is_bounded() {
    let page = MemoryPage::for_registry(&builtin()).fail_request(0);
    let timings = FillTimings {
        row_timeout: Duration::from_millis(500),
        ..FillTimings::default()
    };
    let engine = RowFillEngine::new(page, builtin()).with_timings(timings);

    let start = tokio::time::Instant::now();
    let results = engine.fill_rows(&records(1), &NoProgress, None).await.unwrap();
    assert_eq!(results, vec![None]);
    assert!(start.elapsed() < Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_host_signal_aborts_with_partial_results() {
    // rows are numbered from 1, so record k lands in row k + 1
    let k = 2;
    let page = MemoryPage::for_registry(&builtin()).dialog_on_row(k + 1, "Stock is insufficient");
    let engine = RowFillEngine::new(page, builtin());

    let err = engine
        .fill_rows(&records(5), &NoProgress, None)
        .await
        .unwrap_err();

    match &err {
        FillError::Aborted { reason, partial } => {
            assert_eq!(
                *reason,
                AbortReason::HostSignal("Stock is insufficient".to_string())
            );
            assert_eq!(*partial, vec![Some(1), Some(2), Some(3)]);
        }
        other => panic!("expected abort, got {other}"),
    }

    let page = engine.page();
    assert_eq!(page.requests(), k + 1, "no row requested after record k");
    assert!(
        page.commits().iter().all(|(name, _)| !name.starts_with("grdLines$4$")),
        "nothing written past the aborted row"
    );
    assert!(
        page.journal()
            .contains(&Interaction::Dialog("Stock is insufficient".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_abort_halts_row_at_next_field() {
    let page = MemoryPage::for_registry(&builtin()).dialog_on_row(1, "Session expired");
    let engine = RowFillEngine::new(page, builtin());
    let record = RowRecord::new()
        .with("description", "Gauze")
        .with("unit", "BOX")
        .with("quantity", 3.0);

    let err = engine.fill_rows(&[record], &NoProgress, None).await.unwrap_err();
    assert_eq!(err.partial(), Some(&[Some(1)][..]));

    let commits = engine.page().commits();
    assert_eq!(commits.len(), 1, "the triggering write completes, the rest is skipped");
    assert_eq!(commits[0].0, "grdLines$1$txtDescription");
}

#[tokio::test(start_paused = true)]
async fn test_progress_reported_once_per_record() {
    let seen = Mutex::new(Vec::new());
    let progress = |current: usize, total: usize| seen.lock().unwrap().push((current, total));

    let page = MemoryPage::for_registry(&builtin()).fail_request(1);
    let engine = RowFillEngine::new(page, builtin());
    engine.fill_rows(&records(3), &progress, None).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_host_still_fills() {
    let page = MemoryPage::for_registry(&builtin()).with_behavior(PageBehavior {
        row_delay: Duration::from_millis(2_000),
        ..PageBehavior::default()
    });
    let engine = RowFillEngine::new(page, builtin());

    let results = engine.fill_rows(&records(2), &NoProgress, None).await.unwrap();
    assert_eq!(results, vec![Some(1), Some(2)]);
    assert_eq!(
        engine.page().value("grdLines$2$txtDescription").as_deref(),
        Some("Item 2")
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch() {
    let engine = RowFillEngine::new(MemoryPage::for_registry(&builtin()), builtin());
    let results = engine.fill_rows(&[], &NoProgress, None).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(engine.page().requests(), 0);
}
