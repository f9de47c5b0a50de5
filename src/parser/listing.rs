//! Listing payload parser
//!
//! The listing endpoint answers with a JSON object whose `airsResult` field
//! holds a second JSON document as a string:
//!
//! ```text
//! {"airsResult": "{\"result\": {\"101\": [ {entry}, ... ]}}"}
//! ```
//!
//! Extraction is all-or-nothing per page: one bad entry rejects the page.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{detail_url, ArticleRecord, NewsCategory};
use crate::utils::clean_text;
use crate::utils::error::ParseError;

/// Field of the outer document carrying the nested document
const NESTED_FIELD: &str = "airsResult";

/// One listing entry as the API spells it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    article_id: String,
    title: String,
    summary: String,
    office_id: String,
    office_name: String,
    service_time: i64,
}

/// Parser for listing payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingParser;

impl ListingParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self
    }

    /// Parse one listing page into records for `category`
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if either document layer is malformed, the
    /// category's entries are missing, or any single entry is invalid.
    pub fn parse(&self, body: &str, category: NewsCategory) -> Result<Vec<ArticleRecord>, ParseError> {
        let outer: Value = serde_json::from_str(body).map_err(ParseError::InvalidDocument)?;
        let nested = Self::unwrap_nested(&outer)?;

        let result = nested
            .get("result")
            .and_then(Value::as_object)
            .ok_or(ParseError::MissingResult)?;

        let code = category.code();
        let entries = result
            .get(&code.to_string())
            .ok_or(ParseError::MissingCategory(code))?
            .as_array()
            .ok_or(ParseError::NotAList(code))?;

        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| Self::extract(index, entry, category))
            .collect()
    }

    /// Return the nested document, decoding it if it arrived as a string
    fn unwrap_nested(outer: &Value) -> Result<Value, ParseError> {
        match outer.get(NESTED_FIELD) {
            Some(Value::String(raw)) => {
                serde_json::from_str(raw).map_err(ParseError::InvalidNestedDocument)
            }
            Some(object @ Value::Object(_)) => Ok(object.clone()),
            _ => Err(ParseError::MissingField(NESTED_FIELD)),
        }
    }

    fn extract(
        index: usize,
        entry: &Value,
        category: NewsCategory,
    ) -> Result<ArticleRecord, ParseError> {
        let raw = RawEntry::deserialize(entry).map_err(|e| ParseError::InvalidEntry {
            index,
            reason: e.to_string(),
        })?;

        let article_id = raw.article_id.trim();
        let office_id = raw.office_id.trim();
        if article_id.is_empty() || office_id.is_empty() {
            return Err(ParseError::InvalidEntry {
                index,
                reason: String::from("empty articleId or officeId"),
            });
        }

        Ok(ArticleRecord {
            id: article_id.to_string(),
            category,
            title: clean_text(&raw.title),
            summary: clean_text(&raw.summary),
            publisher_name: clean_text(&raw.office_name),
            published_at: raw.service_time,
            detail_url: detail_url(office_id, article_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(article_id: &str, office_id: &str) -> Value {
        json!({
            "articleId": article_id,
            "title": "제목",
            "summary": "요약",
            "officeId": office_id,
            "officeName": "연합뉴스",
            "serviceTime": 1_700_000_000_i64
        })
    }

    fn double_encoded(code: &str, entries: Vec<Value>) -> String {
        let inner = json!({ "result": { code: entries } }).to_string();
        json!({ "airsResult": inner }).to_string()
    }

    #[test]
    fn test_parse_double_encoded() {
        let body = double_encoded("100", vec![entry("0001", "001"), entry("0002", "002")]);
        let records = ListingParser::new()
            .parse(&body, NewsCategory::Politics)
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "0001");
        assert_eq!(records[0].category, NewsCategory::Politics);
        assert_eq!(records[1].detail_url, "https://n.news.naver.com/article/002/0002");
    }

    #[test]
    fn test_parse_already_decoded_nested_object() {
        let body = json!({ "airsResult": { "result": { "104": [entry("9", "055")] } } }).to_string();
        let records = ListingParser::new().parse(&body, NewsCategory::World).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].publisher_name, "연합뉴스");
    }

    #[test]
    fn test_empty_entry_list_is_valid() {
        let body = double_encoded("101", vec![]);
        let records = ListingParser::new().parse(&body, NewsCategory::Economy).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_invalid_outer_json() {
        let result = ListingParser::new().parse("<html>blocked</html>", NewsCategory::Economy);
        assert!(matches!(result, Err(ParseError::InvalidDocument(_))));
    }

    #[test]
    fn test_missing_nested_field() {
        let result = ListingParser::new().parse(r#"{"other": 1}"#, NewsCategory::Economy);
        assert!(matches!(result, Err(ParseError::MissingField("airsResult"))));
    }

    #[test]
    fn test_invalid_nested_json() {
        let body = json!({ "airsResult": "{not json" }).to_string();
        let result = ListingParser::new().parse(&body, NewsCategory::Economy);
        assert!(matches!(result, Err(ParseError::InvalidNestedDocument(_))));
    }

    #[test]
    fn test_missing_result() {
        let body = json!({ "airsResult": "{\"status\": \"ok\"}" }).to_string();
        let result = ListingParser::new().parse(&body, NewsCategory::Economy);
        assert!(matches!(result, Err(ParseError::MissingResult)));
    }

    #[test]
    fn test_missing_category_code() {
        let body = double_encoded("100", vec![entry("1", "001")]);
        let result = ListingParser::new().parse(&body, NewsCategory::Economy);
        assert!(matches!(result, Err(ParseError::MissingCategory(101))));
    }

    #[test]
    fn test_entries_not_a_list() {
        let inner = json!({ "result": { "101": "nope" } }).to_string();
        let body = json!({ "airsResult": inner }).to_string();
        let result = ListingParser::new().parse(&body, NewsCategory::Economy);
        assert!(matches!(result, Err(ParseError::NotAList(101))));
    }

    #[test]
    fn test_one_bad_entry_rejects_page() {
        let mut bad = entry("3", "001");
        bad.as_object_mut().unwrap().remove("title");
        let body = double_encoded("101", vec![entry("1", "001"), entry("2", "001"), bad]);

        let result = ListingParser::new().parse(&body, NewsCategory::Economy);
        match result {
            Err(ParseError::InvalidEntry { index, reason }) => {
                assert_eq!(index, 2);
                assert!(reason.contains("title"));
            }
            other => panic!("expected InvalidEntry, got {other:?}"),
        }
    }

    #[test]
    fn test_mistyped_service_time_rejects_page() {
        let mut bad = entry("1", "001");
        bad["serviceTime"] = json!("yesterday");
        let body = double_encoded("101", vec![bad]);
        let result = ListingParser::new().parse(&body, NewsCategory::Economy);
        assert!(matches!(result, Err(ParseError::InvalidEntry { index: 0, .. })));
    }

    #[test]
    fn test_empty_ids_reject_page() {
        let body = double_encoded("101", vec![entry("", "001")]);
        let result = ListingParser::new().parse(&body, NewsCategory::Economy);
        assert!(matches!(result, Err(ParseError::InvalidEntry { index: 0, .. })));
    }

    #[test]
    fn test_text_fields_are_cleaned() {
        let mut e = entry("1", "001");
        e["title"] = json!("  &quot;반도체&quot;\n수출 회복 ");
        e["summary"] = json!("A &amp; B\t\tC");
        let body = double_encoded("101", vec![e]);

        let records = ListingParser::new().parse(&body, NewsCategory::Economy).unwrap();
        assert_eq!(records[0].title, "\"반도체\" 수출 회복");
        assert_eq!(records[0].summary, "A & B C");
    }
}
