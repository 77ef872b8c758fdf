//! Target language codes accepted by the translate operation.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ValidationError;

/// Source language passed to the translator; it detects the language itself.
pub const AUTO_DETECT: &str = "auto";

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{2,8})*$").expect("language code pattern is valid")
    })
}

/// A syntactically valid BCP-47-ish language tag such as `fr` or `pt-BR`.
///
/// Case is normalized on parse because the code is also the key in a
/// record's translation map: `FR` and `fr` must hit the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::MissingFields(vec!["language"]));
        }
        if code.eq_ignore_ascii_case(AUTO_DETECT) || !code_pattern().is_match(code) {
            return Err(ValidationError::InvalidField {
                field: "language".to_string(),
                reason: format!("'{}' is not a valid target language code", code),
            });
        }
        Ok(Self(normalize_case(code)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Primary subtag lowercase, region uppercase, script title case
fn normalize_case(code: &str) -> String {
    code.split('-')
        .enumerate()
        .map(|(i, subtag)| {
            let alphabetic = subtag.chars().all(|c| c.is_ascii_alphabetic());
            match subtag.len() {
                _ if i == 0 => subtag.to_ascii_lowercase(),
                2 if alphabetic => subtag.to_ascii_uppercase(),
                4 if alphabetic => {
                    let (head, tail) = subtag.split_at(1);
                    format!("{}{}", head.to_ascii_uppercase(), tail.to_ascii_lowercase())
                }
                _ => subtag.to_ascii_lowercase(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
