//! `SearchIndex` over a Solr core's JSON API.
//!
//! Documents use dynamic-field suffixes: `_txt` for analyzed text, `_s` for
//! exact strings, `_i`/`_f` for numbers, `_ss` for string lists and `_dt` for
//! dates. Empty dates are omitted because Solr rejects them.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use sporthub_core::search::{IndexError, SearchDocument, SearchIndex, SearchQuery, SearchResult};
use tracing::debug;

const QUERY_FIELDS: &str = "name_txt^2 category_s location_s instructor_s";
const PHRASE_FIELDS: &str = "name_txt^3";

/// Solr-backed document index.
#[derive(Debug, Clone)]
pub struct SolrIndex {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<Map<String, Value>>,
}

impl SolrIndex {
    /// Index rooted at a core URL such as `http://solr:8983/solr/activities`.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
        })
    }

    async fn select(&self, params: &[(&str, String)]) -> Result<SelectBody, IndexError> {
        let response = self
            .http
            .get(format!("{}/select", self.base_url))
            .query(params)
            .send()
            .await
            .map_err(|e| IndexError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IndexError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        let body: SelectResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        Ok(body.response)
    }

    async fn update(&self, body: Value) -> Result<(), IndexError> {
        let response = self
            .http
            .post(format!("{}/update", self.base_url))
            .query(&[("commit", "true")])
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(IndexError::Rejected {
                status: status.as_u16(),
                message: solr_error_message(&text).unwrap_or(text),
            });
        }
        if let Some(message) = solr_error_message(&text) {
            return Err(IndexError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for SolrIndex {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, IndexError> {
        let params = select_params(query);
        let body = self.select(&params).await?;
        debug!(total = body.num_found, returned = body.docs.len(), "solr search");
        Ok(SearchResult {
            total: body.num_found,
            page: query.page,
            size: query.size,
            docs: body.docs.iter().map(from_solr).collect(),
        })
    }

    async fn get(&self, id: &str) -> Result<Option<SearchDocument>, IndexError> {
        let params = [
            ("q", "*:*".to_owned()),
            ("fq", format!("id:{}", quote(id))),
            ("rows", "1".to_owned()),
            ("wt", "json".to_owned()),
        ];
        let body = self.select(&params).await?;
        Ok(body.docs.first().map(from_solr))
    }

    async fn upsert(&self, doc: &SearchDocument) -> Result<(), IndexError> {
        self.update(json!({ "add": [to_solr(doc)] })).await
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        self.update(json!({ "delete": { "id": id } })).await
    }
}

fn select_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
    let words: Vec<String> = query
        .text
        .split_whitespace()
        .map(escape_term)
        .filter(|w| !w.is_empty())
        .collect();
    let q = if words.is_empty() {
        "*:*".to_owned()
    } else {
        words.join(" ")
    };
    let mm = if words.len() > 1 { "100%" } else { "1" };

    let mut params = vec![
        ("defType", "edismax".to_owned()),
        ("q", q),
        ("qf", QUERY_FIELDS.to_owned()),
        ("pf", PHRASE_FIELDS.to_owned()),
        ("mm", mm.to_owned()),
        ("q.op", "OR".to_owned()),
    ];
    if !query.category.is_empty() {
        params.push(("fq", format!("category_s:{}", quote(&query.category))));
    }
    if !query.location.is_empty() {
        params.push(("fq", format!("location_s:{}", quote(&query.location))));
    }
    if !query.date.is_empty() {
        params.push(("fq", format!("start_dt:[{}T00:00:00Z TO *]", query.date)));
    }
    params.push(("sort", query.sort.clone()));
    params.push(("start", query.offset().to_string()));
    params.push(("rows", query.size.to_string()));
    params.push(("wt", "json".to_owned()));
    params
}

/// Escapes the characters edismax treats as syntax.
fn escape_term(word: &str) -> String {
    let mut escaped = String::with_capacity(word.len());
    for c in word.chars() {
        if matches!(
            c,
            '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~'
                | '?' | ':' | '\\' | '/'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn solr_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let msg = value.get("error")?.get("msg")?;
    Some(msg.as_str().map_or_else(|| msg.to_string(), str::to_owned))
}

fn to_solr(doc: &SearchDocument) -> Value {
    let mut fields = Map::new();
    fields.insert("id".to_owned(), json!(doc.id));
    fields.insert("activity_id".to_owned(), json!(doc.activity_id));
    fields.insert("name_txt".to_owned(), json!(doc.name));
    fields.insert("category_s".to_owned(), json!(doc.category));
    fields.insert("location_s".to_owned(), json!(doc.location));
    fields.insert("instructor_s".to_owned(), json!(doc.instructor));
    fields.insert("difficulty_i".to_owned(), json!(doc.difficulty));
    fields.insert("price_f".to_owned(), json!(doc.price));
    fields.insert("tags_ss".to_owned(), json!(doc.tags));
    for (name, value) in [
        ("start_dt", doc.start_at),
        ("end_dt", doc.end_at),
        ("updated_dt", doc.updated_at),
    ] {
        if let Some(value) = value {
            fields.insert(name.to_owned(), json!(value.to_rfc3339()));
        }
    }
    Value::Object(fields)
}

/// Solr may return single-valued text fields as one-element arrays.
fn text(doc: &Map<String, Value>, field: &str) -> String {
    match doc.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn date(doc: &Map<String, Value>, field: &str) -> Option<DateTime<Utc>> {
    let raw = text(doc, field);
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn from_solr(doc: &Map<String, Value>) -> SearchDocument {
    let difficulty = doc
        .get("difficulty_i")
        .and_then(Value::as_i64)
        .and_then(|d| i32::try_from(d).ok())
        .unwrap_or_default();
    let tags = doc
        .get("tags_ss")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    SearchDocument {
        id: text(doc, "id"),
        activity_id: text(doc, "activity_id"),
        session_id: String::new(),
        name: text(doc, "name_txt"),
        category: text(doc, "category_s"),
        location: text(doc, "location_s"),
        instructor: text(doc, "instructor_s"),
        start_at: date(doc, "start_dt"),
        end_at: date(doc, "end_dt"),
        difficulty,
        price: doc.get("price_f").and_then(Value::as_f64).unwrap_or_default(),
        tags,
        updated_at: date(doc, "updated_dt"),
    }
}
