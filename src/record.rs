//! Catalog record model plus the filter and patch types that travel with it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::ValidationError;

/// A movie in the catalog, keyed by (category, id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(rename = "category")]
    pub partition_key: String,
    #[serde(rename = "id")]
    pub sort_key: String,
    pub title: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub year: i64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_available")]
    pub is_available: bool,
    /// Cached translations of `description`, keyed by language code
    #[serde(default)]
    pub translations: HashMap<String, String>,
}

fn default_available() -> bool {
    true
}

impl Record {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.partition_key, &self.sort_key)
    }

    /// Build a new record from a create payload.
    ///
    /// `title`, `category` and `description` must be present and non-blank.
    /// `id` is generated when absent. Any `translations` in the payload are
    /// ignored; a fresh record starts with an empty cache.
    pub fn from_create_payload(body: &Value) -> Result<Record, ValidationError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ValidationError::MalformedBody("expected a JSON object".to_string()))?;

        let mut missing = Vec::new();
        let title = required_string(obj, "title", &mut missing)?;
        let category = required_string(obj, "category", &mut missing)?;
        let description = required_string(obj, "description", &mut missing)?;
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let id = match obj.get("id") {
            None | Some(Value::Null) => uuid::Uuid::new_v4().to_string(),
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(_) => {
                return Err(ValidationError::InvalidField {
                    field: "id".to_string(),
                    reason: "expected a non-empty string".to_string(),
                })
            }
        };

        let mut record = Record {
            partition_key: category,
            sort_key: id,
            title,
            director: String::new(),
            year: 0,
            rating: 0.0,
            description,
            is_available: true,
            translations: HashMap::new(),
        };

        let mut optional = RecordPatch::from_json(body)?;
        optional.title = None;
        optional.description = None;
        optional.translations = None;
        optional.apply(&mut record);

        Ok(record)
    }
}

fn required_string(
    obj: &Map<String, Value>,
    field: &'static str,
    missing: &mut Vec<&'static str>,
) -> Result<String, ValidationError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            missing.push(field);
            Ok(String::new())
        }
        Some(_) => Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "expected a string".to_string(),
        }),
    }
}

/// Two-part primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub partition_key: String,
    pub sort_key: String,
}

impl RecordKey {
    pub fn new(partition_key: &str, sort_key: &str) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            sort_key: sort_key.to_string(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.sort_key)
    }
}

/// Conjunction of optional list predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilters {
    pub year: Option<i64>,
    /// Case-insensitive substring match
    pub director: Option<String>,
    pub is_available: Option<bool>,
}

impl RecordFilters {
    /// Parse `year`, `director` and `isAvailable` query parameters.
    /// Blank values are treated as absent.
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let param = |name: &str| {
            query
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let year = param("year")
            .map(|v| {
                v.parse::<i64>().map_err(|_| ValidationError::InvalidField {
                    field: "year".to_string(),
                    reason: format!("'{}' is not an integer", v),
                })
            })
            .transpose()?;

        let is_available = param("isAvailable")
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(ValidationError::InvalidField {
                    field: "isAvailable".to_string(),
                    reason: format!("'{}' is not a boolean", v),
                }),
            })
            .transpose()?;

        Ok(Self {
            year,
            director: param("director").map(str::to_string),
            is_available,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.director.is_none() && self.is_available.is_none()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(year) = self.year {
            if record.year != year {
                return false;
            }
        }
        if let Some(director) = &self.director {
            if !record
                .director
                .to_lowercase()
                .contains(&director.to_lowercase())
            {
                return false;
            }
        }
        if let Some(available) = self.is_available {
            if record.is_available != available {
                return false;
            }
        }
        true
    }
}

/// Partial update restricted to the mutable attribute whitelist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub director: Option<String>,
    pub year: Option<i64>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub is_available: Option<bool>,
    pub translations: Option<HashMap<String, String>>,
}

impl RecordPatch {
    /// Extract whitelisted attributes from a JSON object.
    ///
    /// Unknown keys, `null` values and blank strings are ignored. A
    /// whitelisted key holding the wrong JSON type is a validation error.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ValidationError::MalformedBody("expected a JSON object".to_string()))?;

        let field = |name: &str| obj.get(name).filter(|v| !v.is_null());
        let invalid = |name: &str, reason: &str| ValidationError::InvalidField {
            field: name.to_string(),
            reason: reason.to_string(),
        };

        let string_field = |name: &str| {
            field(name)
                .map(|v| {
                    v.as_str()
                        .map(str::trim)
                        .ok_or_else(|| invalid(name, "expected a string"))
                })
                .transpose()
                .map(|s| s.filter(|s| !s.is_empty()).map(str::to_string))
        };

        let year = field("year")
            .map(|v| v.as_i64().ok_or_else(|| invalid("year", "expected an integer")))
            .transpose()?;
        let rating = field("rating")
            .map(|v| v.as_f64().ok_or_else(|| invalid("rating", "expected a number")))
            .transpose()?;
        let is_available = field("isAvailable")
            .map(|v| v.as_bool().ok_or_else(|| invalid("isAvailable", "expected a boolean")))
            .transpose()?;
        let translations = field("translations")
            .map(|v| {
                serde_json::from_value::<HashMap<String, String>>(v.clone())
                    .map_err(|_| invalid("translations", "expected an object of strings"))
            })
            .transpose()?;

        Ok(Self {
            title: string_field("title")?,
            director: string_field("director")?,
            year,
            rating,
            description: string_field("description")?,
            is_available,
            translations,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.director.is_none()
            && self.year.is_none()
            && self.rating.is_none()
            && self.description.is_none()
            && self.is_available.is_none()
            && self.translations.is_none()
    }

    /// Overwrite the present attributes on `record`. Keys are never touched.
    pub fn apply(&self, record: &mut Record) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(director) = &self.director {
            record.director = director.clone();
        }
        if let Some(year) = self.year {
            record.year = year;
        }
        if let Some(rating) = self.rating {
            record.rating = rating;
        }
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
        if let Some(available) = self.is_available {
            record.is_available = available;
        }
        if let Some(translations) = &self.translations {
            record.translations = translations.clone();
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_record(category: &str, id: &str) -> Record {
    Record {
        partition_key: category.to_string(),
        sort_key: id.to_string(),
        title: format!("Movie {}", id),
        director: "Jane Doe".to_string(),
        year: 2001,
        rating: 7.5,
        description: "A story about something.".to_string(),
        is_available: true,
        translations: HashMap::new(),
    }
}
