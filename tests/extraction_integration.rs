//! Integration tests for image extraction against a mock vision endpoint

use base64::Engine;
use eyre::Result;
use formfill::client::{RetryPolicy, VisionClient};
use formfill::etl::{Extractor, Pipeline, Transformer};
use formfill::extraction::{ImageExtractor, SourceImage};
use formfill::record::{FieldValue, RowRecord};
use formfill::schema::SchemaRegistry;
use formfill::storage::{NdjsonReader, NdjsonWriter};
use formfill::transform::{Normalizer, Sanitizer};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-test";
const ENDPOINT: &str = "/models/gemini-test:generateContent";

fn answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
}

fn overloaded() -> ResponseTemplate {
    ResponseTemplate::new(503).set_body_json(json!({
        "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
    }))
}

/// Undecodable bytes pass through compression untouched
fn page(name: &str) -> SourceImage {
    SourceImage::new(name, "image/png", name.as_bytes().to_vec())
}

fn encoded(name: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(name.as_bytes())
}

fn extractor(server: &MockServer, pages: Vec<SourceImage>) -> ImageExtractor<VisionClient> {
    let url = Url::parse(&server.uri()).unwrap();
    let client = VisionClient::try_new(url, MODEL, "test-key").unwrap();
    let registry = Arc::new(SchemaRegistry::builtin().unwrap());
    ImageExtractor::new(client, registry, pages)
        .with_transaction_type("purchase")
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
}

#[tokio::test]
async fn test_overload_is_retried_until_answer() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(overloaded())
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(query_param("key", "test-key"))
        .respond_with(answer(r#"[{"description": "Gauze", "quantity": 10}]"#))
        .expect(1)
        .mount(&server)
        .await;

    let items = extractor(&server, vec![page("p1")]).extract().await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["description"], "Gauze");
    Ok(())
}

#[tokio::test]
async fn test_exhausted_image_contributes_nothing() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains(encoded("p1")))
        .respond_with(overloaded())
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(encoded("p2")))
        .respond_with(answer(r#"[{"quantity": 1}, {"quantity": 2}]"#))
        .expect(1)
        .mount(&server)
        .await;

    let items = extractor(&server, vec![page("p1"), page("p2")])
        .extract()
        .await?;
    assert_eq!(items.len(), 2, "only the second page contributes");
    Ok(())
}

#[tokio::test]
async fn test_client_error_is_not_retried() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "Invalid image", "status": "INVALID_ARGUMENT"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = extractor(&server, vec![page("p1")]).extract().await?;
    assert!(items.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_pages_concatenate_in_input_order() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains(encoded("p1")))
        .respond_with(answer("```json\n[{\"stock_code\": \"A\"}, {\"stock_code\": \"B\"}]\n```"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(encoded("p2")))
        .respond_with(answer("Here are the items: [{\"stock_code\": \"C\"}]"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(encoded("p3")))
        .respond_with(answer("[]"))
        .mount(&server)
        .await;

    let items = extractor(&server, vec![page("p1"), page("p2"), page("p3")])
        .extract()
        .await?;
    let codes: Vec<_> = items.iter().map(|i| i["stock_code"].clone()).collect();
    assert_eq!(codes, vec!["A", "B", "C"]);
    Ok(())
}

#[tokio::test]
async fn test_request_carries_prompt_image_and_sampling() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(answer("[]"))
        .mount(&server)
        .await;

    extractor(&server, vec![page("p1")]).extract().await?;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body)?;
    let parts = &body["contents"][0]["parts"];
    assert!(parts[0]["text"].as_str().unwrap().contains("JSON array"));
    assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
    assert_eq!(parts[1]["inline_data"]["data"], encoded("p1"));
    assert_eq!(body["generationConfig"]["temperature"].as_f64(), Some(0.1));
    Ok(())
}

#[tokio::test]
async fn test_extract_normalize_sanitize_to_ndjson() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(answer(
            r#"[
                {"stock_code": "ST-100", "description": "Sterile   gauze", "quantity": "12,5 kg",
                 "unit_price": "$1,234.50", "expiry_day": "7", "lot_number": "----------------",
                 "color": "blue"},
                {"stock_code": "X", "quantity": "abc", "free_of_charge": "yes"}
            ]"#,
        ))
        .mount(&server)
        .await;

    let temp = TempDir::new()?;
    let output = temp.path().join("records.ndjson");
    let registry = Arc::new(SchemaRegistry::builtin()?);

    let pipeline = Pipeline::new(
        extractor(&server, vec![page("p1")]),
        Normalizer::new(registry.clone(), "purchase").then(Sanitizer::new(registry)),
        NdjsonWriter::new(&output),
    );
    assert_eq!(pipeline.run().await?.loaded, 2);

    let records: Vec<RowRecord> = NdjsonReader::new(&output).read()?;
    let first = &records[0];
    assert_eq!(first.get("description"), Some(&FieldValue::text("Sterile gauze")));
    assert_eq!(first.get("quantity"), Some(&FieldValue::Number(12.5)));
    assert_eq!(first.get("unit_price"), Some(&FieldValue::Number(1234.5)));
    assert_eq!(first.get("expiry_day"), Some(&FieldValue::text("07")));
    assert_eq!(first.get("lot_number"), Some(&FieldValue::text("")));
    assert!(!first.contains("color"));

    let second = &records[1];
    assert_eq!(second.get("stock_code"), Some(&FieldValue::text("")), "below min length");
    assert_eq!(second.get("quantity"), Some(&FieldValue::Null));
    assert!(!second.contains("free_of_charge"), "not active for purchase");
    Ok(())
}
