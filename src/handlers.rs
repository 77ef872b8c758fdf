//! Operation dispatch.
//!
//! A [`RequestDescriptor`] (method, path params, query, body) is parsed into
//! an [`Operation`], validated, and executed against the record store and
//! the translation cache. Every path ends in a [`CatalogResponse`]; nothing
//! here returns an error to the caller.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{FailurePolicy, PersistQueue, RecordLocator, TranslateOutcome, TranslationCache};
use crate::error::ValidationError;
use crate::language::LanguageCode;
use crate::record::{Record, RecordFilters, RecordPatch};
use crate::store::{Listing, Lookup, RecordStore, UpdateOutcome, WriteOutcome};
use crate::translator::Translator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Other,
}

impl Method {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            _ => Method::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    pub partition_key: Option<String>,
    pub sort_key: Option<String>,
}

/// Normalized inbound request produced by the routing layer
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: PathParams,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            path: PathParams::default(),
            query: HashMap::new(),
            body: None,
        }
    }

    pub fn with_path(mut self, partition_key: Option<&str>, sort_key: Option<&str>) -> Self {
        self.path = PathParams {
            partition_key: partition_key.map(str::to_string),
            sort_key: sort_key.map(str::to_string),
        };
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    List {
        category: Option<String>,
        filters: RecordFilters,
    },
    Get(RecordLocator),
    Create(Record),
    Update {
        partition_key: String,
        sort_key: String,
        patch: RecordPatch,
    },
    Translate {
        locator: RecordLocator,
        language: LanguageCode,
    },
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Operation {
    /// Route and validate. No store access happens here.
    pub fn from_request(request: &RequestDescriptor) -> Result<Self, ValidationError> {
        let partition_key = non_blank(request.path.partition_key.as_deref())
            .or_else(|| non_blank(request.query_param("category")));
        let sort_key = non_blank(request.path.sort_key.as_deref())
            .or_else(|| non_blank(request.query_param("id")));

        match request.method {
            Method::Get => {
                let Some(sort_key) = sort_key else {
                    if request.query_param("language").is_some() {
                        return Err(ValidationError::MissingFields(vec!["id"]));
                    }
                    return Ok(Operation::List {
                        category: partition_key,
                        filters: RecordFilters::from_query(&request.query)?,
                    });
                };

                let locator = match partition_key {
                    Some(partition_key) => RecordLocator::Key {
                        partition_key,
                        sort_key,
                    },
                    None => RecordLocator::SortKey(sort_key),
                };

                if request.query.contains_key("language") {
                    let language = LanguageCode::parse(request.query_param("language").unwrap_or(""))?;
                    Ok(Operation::Translate { locator, language })
                } else {
                    Ok(Operation::Get(locator))
                }
            }
            Method::Post => {
                let body = request
                    .body
                    .as_ref()
                    .ok_or_else(|| ValidationError::MalformedBody("request body is required".to_string()))?;
                Ok(Operation::Create(Record::from_create_payload(body)?))
            }
            Method::Put | Method::Patch => {
                let mut missing = Vec::new();
                if partition_key.is_none() {
                    missing.push("category");
                }
                if sort_key.is_none() {
                    missing.push("id");
                }
                let (Some(partition_key), Some(sort_key)) = (partition_key, sort_key) else {
                    return Err(ValidationError::MissingFields(missing));
                };
                let body = request
                    .body
                    .as_ref()
                    .ok_or_else(|| ValidationError::MalformedBody("request body is required".to_string()))?;
                Ok(Operation::Update {
                    partition_key,
                    sort_key,
                    patch: RecordPatch::from_json(body)?,
                })
            }
            Method::Other => Err(ValidationError::UnsupportedOperation(
                "only GET, POST, PUT and PATCH are supported".to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Operation::List { .. } => "list",
            Operation::Get(_) => "get",
            Operation::Create(_) => "create",
            Operation::Update { .. } => "update",
            Operation::Translate { .. } => "translate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NotFound,
    NoOp,
    ValidationError,
    StoreUnavailable,
    ServiceError,
}

/// Result handed back to the routing layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
    /// Set on successful creates so the router can answer 201
    #[serde(skip)]
    pub created: bool,
}

impl CatalogResponse {
    fn new(outcome: OutcomeKind) -> Self {
        Self {
            outcome,
            message: None,
            error_code: None,
            record: None,
            records: None,
            translated_text: None,
            degraded: false,
            created: false,
        }
    }

    pub fn success() -> Self {
        Self::new(OutcomeKind::Success)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(OutcomeKind::NotFound).with_message(message)
    }

    pub fn validation(err: &ValidationError) -> Self {
        Self::new(OutcomeKind::ValidationError).with_message(err.to_string())
    }

    pub fn store_unavailable() -> Self {
        Self::new(OutcomeKind::StoreUnavailable)
            .with_message("record store is temporarily unavailable")
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn with_record(mut self, record: Record) -> Self {
        self.record = Some(record);
        self
    }

    fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = Some(records);
        self
    }
}

/// Entry point for all catalog operations. Cheap to clone.
#[derive(Clone)]
pub struct CatalogService {
    store: RecordStore,
    cache: TranslationCache,
    persist: PersistQueue,
}

impl CatalogService {
    /// Build the service and spawn its write-behind worker on the current runtime
    pub fn new(
        store: RecordStore,
        translator: Arc<dyn Translator>,
        policy: FailurePolicy,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (persist, worker) = PersistQueue::spawn(store.clone());
        let cache = TranslationCache::new(store.clone(), translator, policy, persist.clone());
        (
            Self {
                store,
                cache,
                persist,
            },
            worker,
        )
    }

    /// Wait for pending translation cache writes to be attempted
    pub async fn flush_pending_writes(&self) {
        self.persist.flush().await;
    }

    pub async fn dispatch(&self, request: &RequestDescriptor) -> CatalogResponse {
        match Operation::from_request(request) {
            Ok(operation) => self.execute(operation).await,
            Err(err) => {
                info!("Rejected {:?} request: {}", request.method, err);
                CatalogResponse::validation(&err)
            }
        }
    }

    pub async fn execute(&self, operation: Operation) -> CatalogResponse {
        let name = operation.name();
        let response = match operation {
            Operation::List { category, filters } => self.list(category.as_deref(), &filters).await,
            Operation::Get(locator) => self.get(&locator).await,
            Operation::Create(record) => self.create(record).await,
            Operation::Update {
                partition_key,
                sort_key,
                patch,
            } => self.update(&partition_key, &sort_key, &patch).await,
            Operation::Translate { locator, language } => self.translate(&locator, &language).await,
        };

        if matches!(
            response.outcome,
            OutcomeKind::StoreUnavailable | OutcomeKind::ServiceError
        ) {
            warn!("{} finished degraded: {:?}", name, response.outcome);
        }
        response
    }

    async fn list(&self, category: Option<&str>, filters: &RecordFilters) -> CatalogResponse {
        let listing = match category {
            Some(category) => self.store.list_by_partition(category, filters).await,
            None => self.store.list_all(filters).await,
        };
        match listing {
            Listing::Records(records) => CatalogResponse::success().with_records(records),
            // Empty list plus an explicit outcome, never sample data
            Listing::Unavailable => CatalogResponse::store_unavailable().with_records(Vec::new()),
        }
    }

    async fn get(&self, locator: &RecordLocator) -> CatalogResponse {
        let lookup = match locator {
            RecordLocator::Key {
                partition_key,
                sort_key,
            } => self.store.get_by_key(partition_key, sort_key).await,
            RecordLocator::SortKey(sort_key) => self.store.get_by_sort_key(sort_key).await,
        };
        match lookup {
            Lookup::Found(record) => CatalogResponse::success().with_record(record),
            Lookup::NotFound => CatalogResponse::not_found("record not found"),
            Lookup::Unavailable => CatalogResponse::store_unavailable(),
        }
    }

    async fn create(&self, record: Record) -> CatalogResponse {
        match self.store.insert(&record).await {
            WriteOutcome::Written => {
                info!("Created record {}", record.key());
                let mut response = CatalogResponse::success().with_record(record);
                response.created = true;
                response
            }
            WriteOutcome::Failed => CatalogResponse::store_unavailable(),
        }
    }

    async fn update(&self, partition_key: &str, sort_key: &str, patch: &RecordPatch) -> CatalogResponse {
        match self.store.update_fields(partition_key, sort_key, patch).await {
            UpdateOutcome::Updated(record) => CatalogResponse::success().with_record(record),
            UpdateOutcome::NotFound => CatalogResponse::not_found("record not found"),
            UpdateOutcome::NoOp => CatalogResponse::new(OutcomeKind::NoOp)
                .with_message("no updatable fields in request"),
            UpdateOutcome::Unavailable => CatalogResponse::store_unavailable(),
        }
    }

    async fn translate(&self, locator: &RecordLocator, language: &LanguageCode) -> CatalogResponse {
        match self.cache.get_translated_description(locator, language).await {
            TranslateOutcome::Translated {
                record,
                translated_text,
                ..
            } => {
                let mut response = CatalogResponse::success().with_record(record);
                response.translated_text = Some(translated_text);
                response
            }
            TranslateOutcome::Degraded {
                record,
                placeholder,
                error,
            } => {
                let mut response = CatalogResponse::success()
                    .with_record(record)
                    .with_message(format!("translation unavailable: {}", error));
                response.translated_text = Some(placeholder);
                response.error_code = Some(error.code());
                response.degraded = true;
                response
            }
            TranslateOutcome::TranslationFailed { record, error } => {
                let mut response = CatalogResponse::new(OutcomeKind::ServiceError)
                    .with_record(record)
                    .with_message(format!("translation service error: {}", error));
                response.error_code = Some(error.code());
                response
            }
            TranslateOutcome::NotFound => CatalogResponse::not_found("record not found"),
            TranslateOutcome::StoreUnavailable => CatalogResponse::store_unavailable(),
        }
    }
}
