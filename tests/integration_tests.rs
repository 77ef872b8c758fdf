//! Integration tests for the movie catalog
//!
//! These drive the catalog service end to end over the in-memory backend,
//! the axum router over a real loopback socket, and the OpenAI translator
//! against a mock server. None of them need a database.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use movie_catalog::cache::FailurePolicy;
use movie_catalog::error::TranslationError;
use movie_catalog::handlers::{CatalogService, Method, OutcomeKind, RequestDescriptor};
use movie_catalog::record::{Record, RecordKey};
use movie_catalog::retry::RetryPolicy;
use movie_catalog::server::{router, AppState};
use movie_catalog::store::{MemoryBackend, RecordBackend, RecordStore};
use movie_catalog::translator::{OpenAiTranslator, Translator};

// ==================== Test Helpers ====================

/// Dictionary translator that counts calls and can be switched to fail
#[derive(Default)]
struct DictionaryTranslator {
    calls: AtomicUsize,
    fail: bool,
}

impl DictionaryTranslator {
    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for DictionaryTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(source_language, "auto");
        if self.fail {
            return Err(TranslationError::Api {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(match (text, target_language) {
            ("Hello", "fr") => "Bonjour".to_string(),
            ("Hello", "es") => "Hola".to_string(),
            _ => format!("[{}] {}", target_language, text),
        })
    }
}

fn movie(category: &str, id: &str, title: &str, description: &str) -> Record {
    Record {
        partition_key: category.to_string(),
        sort_key: id.to_string(),
        title: title.to_string(),
        director: "Agnes Varda".to_string(),
        year: 1962,
        rating: 8.1,
        description: description.to_string(),
        is_available: true,
        translations: HashMap::new(),
    }
}

fn seeded_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::with_records(vec![
        movie("action", "m1", "Heat", "Hello"),
        movie("drama", "d1", "Cleo from 5 to 7", "A singer waits for test results."),
        movie("drama", "d2", "Vagabond", "A drifter's last winter."),
        movie("comedy", "c1", "Playtime", ""),
    ]))
}

fn catalog(
    backend: Arc<MemoryBackend>,
    translator: Arc<DictionaryTranslator>,
    policy: FailurePolicy,
) -> CatalogService {
    let store = RecordStore::new(backend, 50);
    let (service, _worker) = CatalogService::new(store, translator, policy);
    service
}

fn translate_request(category: &str, id: &str, language: &str) -> RequestDescriptor {
    RequestDescriptor::new(Method::Get)
        .with_path(Some(category), Some(id))
        .with_query("language", language)
}

// ==================== Translation Scenario Tests ====================

#[tokio::test]
async fn test_translate_miss_then_hit_persists_cache() {
    let backend = seeded_backend();
    let translator = Arc::new(DictionaryTranslator::default());
    let service = catalog(backend.clone(), translator.clone(), FailurePolicy::Strict);

    let first = service.dispatch(&translate_request("action", "m1", "fr")).await;
    assert_eq!(first.outcome, OutcomeKind::Success);
    assert_eq!(first.translated_text.as_deref(), Some("Bonjour"));

    service.flush_pending_writes().await;
    let stored = backend
        .get(&RecordKey::new("action", "m1"))
        .await
        .expect("get")
        .expect("present");
    assert_eq!(stored.translations.get("fr").map(String::as_str), Some("Bonjour"));
    assert_eq!(stored.title, "Heat");

    let second = service.dispatch(&translate_request("action", "m1", "fr")).await;
    assert_eq!(second.translated_text.as_deref(), Some("Bonjour"));
    assert_eq!(translator.calls(), 1);
}

#[tokio::test]
async fn test_translate_empty_description_skips_translator() {
    let translator = Arc::new(DictionaryTranslator::default());
    let service = catalog(seeded_backend(), translator.clone(), FailurePolicy::Strict);

    let response = service.dispatch(&translate_request("comedy", "c1", "fr")).await;

    assert_eq!(response.outcome, OutcomeKind::Success);
    assert_eq!(response.translated_text.as_deref(), Some(""));
    assert_eq!(translator.calls(), 0);
}

#[tokio::test]
async fn test_translate_failure_leaves_cache_untouched() {
    let backend = seeded_backend();
    let translator = Arc::new(DictionaryTranslator::failing());
    let service = catalog(backend.clone(), translator.clone(), FailurePolicy::Strict);

    let response = service.dispatch(&translate_request("action", "m1", "fr")).await;
    service.flush_pending_writes().await;

    assert_eq!(response.outcome, OutcomeKind::ServiceError);
    assert_eq!(response.error_code.as_deref(), Some("http_503"));
    let stored = backend
        .get(&RecordKey::new("action", "m1"))
        .await
        .expect("get")
        .expect("present");
    assert!(stored.translations.is_empty());
}

#[tokio::test]
async fn test_translate_lenient_failure_retries_on_next_read() {
    let translator = Arc::new(DictionaryTranslator::failing());
    let service = catalog(seeded_backend(), translator.clone(), FailurePolicy::Lenient);

    let first = service.dispatch(&translate_request("action", "m1", "fr")).await;
    service.flush_pending_writes().await;
    let second = service.dispatch(&translate_request("action", "m1", "fr")).await;

    assert!(first.degraded);
    assert_eq!(first.translated_text.as_deref(), Some("[fr] Hello"));
    assert!(second.degraded);
    // Placeholders are never cached
    assert_eq!(translator.calls(), 2);
}

// ==================== Catalog Workflow Tests ====================

#[tokio::test]
async fn test_list_drama_returns_full_records() {
    let service = catalog(
        seeded_backend(),
        Arc::new(DictionaryTranslator::default()),
        FailurePolicy::Strict,
    );

    let response = service
        .dispatch(&RequestDescriptor::new(Method::Get).with_query("category", "drama"))
        .await;

    let records = response.records.expect("records");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.partition_key == "drama"));
    assert_eq!(records[0].title, "Cleo from 5 to 7");
    assert_eq!(records[0].director, "Agnes Varda");
    assert_eq!(records[0].year, 1962);
}

#[tokio::test]
async fn test_create_update_translate_workflow() {
    let translator = Arc::new(DictionaryTranslator::default());
    let service = catalog(
        Arc::new(MemoryBackend::new()),
        translator.clone(),
        FailurePolicy::Strict,
    );

    let created = service
        .dispatch(&RequestDescriptor::new(Method::Post).with_body(json!({
            "title": "Amelie",
            "category": "romance",
            "description": "Hello",
            "translations": {"fr": "ignored"}
        })))
        .await;
    assert_eq!(created.outcome, OutcomeKind::Success);
    let record = created.record.expect("record");
    assert!(!record.sort_key.is_empty());
    assert!(record.translations.is_empty());

    let updated = service
        .dispatch(
            &RequestDescriptor::new(Method::Patch)
                .with_path(Some("romance"), Some(&record.sort_key))
                .with_body(json!({"year": 2001, "isAvailable": false})),
        )
        .await;
    assert_eq!(updated.outcome, OutcomeKind::Success);
    assert_eq!(updated.record.as_ref().map(|r| r.year), Some(2001));

    let translated = service
        .dispatch(
            &RequestDescriptor::new(Method::Get)
                .with_query("id", &record.sort_key)
                .with_query("language", "es"),
        )
        .await;
    assert_eq!(translated.translated_text.as_deref(), Some("Hola"));
    assert_eq!(translator.calls(), 1);
}

// ==================== HTTP Server Tests ====================

async fn spawn_server(service: CatalogService, api_key: Option<&str>) -> String {
    let app = router(AppState::new(service, api_key.map(str::to_string)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_http_translate_and_status_codes() {
    let service = catalog(
        seeded_backend(),
        Arc::new(DictionaryTranslator::default()),
        FailurePolicy::Strict,
    );
    let base = spawn_server(service, None).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/movies/action/m1?language=fr", base))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["outcome"], "success");
    assert_eq!(body["translatedText"], "Bonjour");
    assert_eq!(body["record"]["category"], "action");

    let missing = client
        .get(format!("{}/movies/ghost", base))
        .send()
        .await
        .expect("request");
    assert_eq!(missing.status().as_u16(), 404);

    let invalid = client
        .post(format!("{}/movies", base))
        .json(&json!({"title": "No category"}))
        .send()
        .await
        .expect("request");
    assert_eq!(invalid.status().as_u16(), 400);
    let body: Value = invalid.json().await.expect("json");
    assert_eq!(body["outcome"], "validation_error");

    let created = client
        .post(format!("{}/movies", base))
        .json(&json!({"title": "Heat 2", "category": "action", "description": "Sequel"}))
        .send()
        .await
        .expect("request");
    assert_eq!(created.status().as_u16(), 201);

    let noop = client
        .put(format!("{}/movies/action/m1", base))
        .json(&json!({"unknown": true}))
        .send()
        .await
        .expect("request");
    assert_eq!(noop.status().as_u16(), 200);
    let body: Value = noop.json().await.expect("json");
    assert_eq!(body["outcome"], "no_op");

    let unsupported = client
        .delete(format!("{}/movies/action/m1", base))
        .send()
        .await
        .expect("request");
    assert_eq!(unsupported.status().as_u16(), 400);
}

#[tokio::test]
async fn test_http_malformed_json_is_validation_error() {
    let service = catalog(
        seeded_backend(),
        Arc::new(DictionaryTranslator::default()),
        FailurePolicy::Strict,
    );
    let base = spawn_server(service, None).await;

    let response = reqwest::Client::new()
        .post(format!("{}/movies", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_http_api_key_gate() {
    let service = catalog(
        seeded_backend(),
        Arc::new(DictionaryTranslator::default()),
        FailurePolicy::Strict,
    );
    let base = spawn_server(service, Some("test-api-key")).await;
    let client = reqwest::Client::new();

    let denied = client
        .get(format!("{}/movies", base))
        .send()
        .await
        .expect("request");
    assert_eq!(denied.status().as_u16(), 401);

    let wrong = client
        .get(format!("{}/movies", base))
        .header("x-api-key", "nope")
        .send()
        .await
        .expect("request");
    assert_eq!(wrong.status().as_u16(), 401);

    let allowed = client
        .get(format!("{}/movies", base))
        .header("x-api-key", "test-api-key")
        .send()
        .await
        .expect("request");
    assert_eq!(allowed.status().as_u16(), 200);
    let body: Value = allowed.json().await.expect("json");
    assert_eq!(body["records"].as_array().map(Vec::len), Some(4));

    let health = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("request");
    assert_eq!(health.status().as_u16(), 200);
}

// ==================== Translator Wiring Tests ====================

#[tokio::test]
async fn test_openai_translator_behind_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Bonjour"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let translator = OpenAiTranslator::new(
        format!("{}/v1/chat/completions", server.uri()),
        "test-key",
        "test-model",
        Duration::from_secs(5),
    )
    .expect("client")
    .with_retry_policy(RetryPolicy::no_retry());

    let store = RecordStore::new(seeded_backend(), 50);
    let (service, _worker) = CatalogService::new(store, Arc::new(translator), FailurePolicy::Strict);

    let first = service.dispatch(&translate_request("action", "m1", "fr")).await;
    service.flush_pending_writes().await;
    let second = service.dispatch(&translate_request("action", "m1", "fr")).await;

    assert_eq!(first.translated_text.as_deref(), Some("Bonjour"));
    assert_eq!(second.translated_text.as_deref(), Some("Bonjour"));
    // MockServer verifies the single expected call on drop
}
