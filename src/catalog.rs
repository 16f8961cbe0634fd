//! Learning sessions, examples, hypotheses, mappings and stats
//!
//! Plain records for the learner's data-access operations plus the few
//! client-side rules around them: input validation before a mutation is
//! sent, pending/answered filtering of queries and mapping proposals, menu
//! grouping and the aggregate stats shown in the session overview.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::{QueryId, SessionId};

/// Client-side validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("malformed stats payload: {0}")]
    InvalidStats(String),
    #[error("price must be a finite, non-negative number")]
    InvalidPrice,
    #[error("unknown mapping status '{0}', expected accepted, rejected or pending")]
    UnknownStatus(String),
}

/// Kind of training example
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExampleKind {
    Positive,
    Negative,
    Counterexample,
    #[serde(other)]
    Unknown,
}

impl ExampleKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "pos" | "+" => Some(ExampleKind::Positive),
            "negative" | "neg" | "-" => Some(ExampleKind::Negative),
            "counterexample" | "counter" => Some(ExampleKind::Counterexample),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExampleKind::Positive => "positive",
            ExampleKind::Negative => "negative",
            ExampleKind::Counterexample => "counterexample",
            ExampleKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ExampleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleRecord {
    pub id: i64,
    #[serde(default)]
    pub source_data: String,
    #[serde(default)]
    pub target_data: String,
    #[serde(rename = "type")]
    pub kind: ExampleKind,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterexampleRecord {
    pub id: i64,
    #[serde(default)]
    pub source_data: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisRecord {
    pub id: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub function_code: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub examples: Vec<ExampleRecord>,
    #[serde(default)]
    pub counterexamples: Vec<CounterexampleRecord>,
}

/// Session as listed by the learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningSession {
    pub id: SessionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub hypotheses: Vec<HypothesisRecord>,
    #[serde(default)]
    pub examples: Vec<ExampleRecord>,
}

impl LearningSession {
    pub fn created_on(&self) -> Option<NaiveDate> {
        self.created_at.as_deref().and_then(parse_date)
    }
}

/// A stored oracle query with its answer, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleQueryRecord {
    pub id: QueryId,
    pub query_type: String,
    #[serde(default)]
    pub query_data: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl OracleQueryRecord {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }
}

/// Full view of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    pub id: SessionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub hypotheses: Vec<HypothesisRecord>,
    #[serde(default)]
    pub examples: Vec<ExampleRecord>,
    #[serde(default)]
    pub oracle_queries: Vec<OracleQueryRecord>,
}

impl SessionDetails {
    pub fn pending_queries(&self) -> Vec<&OracleQueryRecord> {
        self.oracle_queries.iter().filter(|q| q.is_pending()).collect()
    }

    pub fn answered_queries(&self) -> Vec<&OracleQueryRecord> {
        self.oracle_queries.iter().filter(|q| !q.is_pending()).collect()
    }

    /// Most recent hypothesis, the learner lists newest first
    pub fn current_hypothesis(&self) -> Option<&HypothesisRecord> {
        self.hypotheses.first()
    }
}

/// Input for `addExample`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExample {
    pub session_id: SessionId,
    pub source_data: String,
    pub target_data: String,
    #[serde(rename = "type")]
    pub kind: ExampleKind,
}

impl NewExample {
    pub fn new(
        session_id: SessionId,
        source_data: impl Into<String>,
        target_data: impl Into<String>,
        kind: ExampleKind,
    ) -> Result<Self, CatalogError> {
        let example = Self {
            session_id,
            source_data: source_data.into(),
            target_data: target_data.into(),
            kind,
        };
        example.validate()?;
        Ok(example)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.source_data.trim().is_empty() {
            return Err(CatalogError::EmptyField("source data"));
        }
        if self.target_data.trim().is_empty() {
            return Err(CatalogError::EmptyField("target data"));
        }
        Ok(())
    }

    /// Both sides parse as JSON, the format the learner expects
    pub fn is_json(&self) -> bool {
        serde_json::from_str::<Value>(&self.source_data).is_ok()
            && serde_json::from_str::<Value>(&self.target_data).is_ok()
    }
}

/// Trimmed session name, rejected when blank
pub fn validate_session_name(name: &str) -> Result<String, CatalogError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::EmptyField("session name"));
    }
    Ok(trimmed.to_string())
}

/// Outcome of `testHypothesis`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HypothesisTestReport {
    pub success: bool,
    pub correct_count: Option<u64>,
    pub total_count: Option<u64>,
    pub confidence: Option<f64>,
    pub message: Option<String>,
}

impl HypothesisTestReport {
    /// The learner answers with a bool, a JSON object, or JSON text
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(success) => Self {
                success: *success,
                ..Default::default()
            },
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(inner @ (Value::Object(_) | Value::Bool(_))) => Self::from_value(&inner),
                _ => Self {
                    success: true,
                    message: Some(text.clone()),
                    ..Default::default()
                },
            },
            Value::Object(map) => Self {
                success: map.get("success").and_then(Value::as_bool).unwrap_or(true),
                correct_count: map.get("correctCount").and_then(Value::as_u64),
                total_count: map.get("totalCount").and_then(Value::as_u64),
                confidence: map.get("confidence").and_then(Value::as_f64),
                message: map.get("message").and_then(Value::as_str).map(str::to_string),
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSession {
    pub name: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub hypothesis_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub total_examples: u32,
    #[serde(default)]
    pub total_hypotheses: u32,
    #[serde(default)]
    pub average_confidence: f64,
    #[serde(default)]
    pub top_performing_session: Option<TopSession>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    #[serde(default)]
    pub total_examples: u32,
    #[serde(default)]
    pub positive_examples: u32,
    #[serde(default)]
    pub negative_examples: u32,
    #[serde(default)]
    pub total_hypotheses: u32,
    #[serde(default)]
    pub best_hypothesis: f64,
    #[serde(default)]
    pub average_confidence: f64,
    /// Days since the session was created
    #[serde(default)]
    pub session_age: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 0.0 to 1.0
    #[serde(default)]
    pub progress: f64,
}

impl Achievement {
    pub fn is_unlocked(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Ids arrive as numbers from some learners and strings from others
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// Decode a stats field that the learner serializes to JSON text
pub fn decode_stats<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, CatalogError> {
    serde_json::from_str(text).map_err(|e| CatalogError::InvalidStats(e.to_string()))
}

/// Totals across all sessions, computed client-side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearningStats {
    pub total_sessions: usize,
    pub total_examples: usize,
    pub total_hypotheses: usize,
}

impl LearningStats {
    pub fn from_sessions(sessions: &[LearningSession]) -> Self {
        Self {
            total_sessions: sessions.len(),
            total_examples: sessions.iter().map(|s| s.examples.len()).sum(),
            total_hypotheses: sessions.iter().map(|s| s.hypotheses.len()).sum(),
        }
    }
}

/// Review state of a proposed mapping. Anything unrecognized is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    Accepted,
    Rejected,
    #[serde(other)]
    Pending,
}

impl MappingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingStatus::Accepted => "accepted",
            MappingStatus::Rejected => "rejected",
            MappingStatus::Pending => "pending",
        }
    }
}

impl std::str::FromStr for MappingStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accepted" | "accept" => Ok(MappingStatus::Accepted),
            "rejected" | "reject" => Ok(MappingStatus::Rejected),
            "pending" => Ok(MappingStatus::Pending),
            other => Err(CatalogError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A proposed transformation from source entries to the target schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub id: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub function_code: Option<String>,
    pub status: MappingStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Mapping {
    pub fn is_pending(&self) -> bool {
        self.status == MappingStatus::Pending
    }
}

/// Split mappings into (pending, evaluated), keeping the learner's order
pub fn partition_mappings(mappings: &[Mapping]) -> (Vec<&Mapping>, Vec<&Mapping>) {
    mappings.iter().partition(|m| m.is_pending())
}

/// Input for `proposeMapping`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMapping {
    pub description: String,
    pub function_code: String,
}

impl NewMapping {
    pub fn new(description: impl Into<String>, function_code: impl Into<String>) -> Result<Self, CatalogError> {
        let mapping = Self {
            description: description.into(),
            function_code: function_code.into(),
        };
        if mapping.description.trim().is_empty() {
            return Err(CatalogError::EmptyField("description"));
        }
        if mapping.function_code.trim().is_empty() {
            return Err(CatalogError::EmptyField("function code"));
        }
        Ok(mapping)
    }
}

/// A row of the source (T1) menu data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: String,
}

/// Input row for `seedT1Data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSourceEntry {
    pub name: String,
    pub price: f64,
    pub category: String,
}

impl NewSourceEntry {
    pub fn new(name: impl Into<String>, price: f64, category: impl Into<String>) -> Result<Self, CatalogError> {
        let entry = Self {
            name: name.into(),
            price,
            category: category.into(),
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::EmptyField("name"));
        }
        if self.category.trim().is_empty() {
            return Err(CatalogError::EmptyField("category"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(CatalogError::InvalidPrice);
        }
        Ok(())
    }
}

const DEFAULT_SEED: &[(&str, f64, &str)] = &[
    ("Margherita Pizza", 9.99, "Pizza"),
    ("BBQ Chicken Pizza", 11.99, "Pizza"),
    ("Caesar Salad", 7.5, "Salad"),
    ("Greek Salad", 8.5, "Salad"),
    ("Spaghetti Carbonara", 10.5, "Pasta"),
];

/// Sample source rows used when `data seed` is given no file
pub fn default_seed() -> Vec<NewSourceEntry> {
    DEFAULT_SEED
        .iter()
        .map(|(name, price, category)| NewSourceEntry {
            name: name.to_string(),
            price: *price,
            category: category.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
}

/// Target-schema menu item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: Option<CategoryRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemRef {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub menu_items: Vec<MenuItemRef>,
}

/// Menu items keyed by category title; uncategorized items go under `""`
pub fn group_by_category(items: &[MenuItem]) -> BTreeMap<&str, Vec<&MenuItem>> {
    let mut groups: BTreeMap<&str, Vec<&MenuItem>> = BTreeMap::new();
    for item in items {
        let key = item.category.as_ref().map(|c| c.title.as_str()).unwrap_or("");
        groups.entry(key).or_default().push(item);
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunFact {
    #[serde(default)]
    pub emoji: String,
    pub fact: String,
    #[serde(default)]
    pub category: String,
}

/// One fact per calendar day, rotating through the list
pub fn fact_for_day(facts: &[FunFact], day: NaiveDate) -> Option<&FunFact> {
    if facts.is_empty() {
        return None;
    }
    facts.get(day.ordinal0() as usize % facts.len())
}

/// Confidence as shown to users, e.g. `87.5%`
pub fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(examples: usize, hypotheses: usize) -> LearningSession {
        serde_json::from_value(json!({
            "id": 1,
            "name": "Menu System Migration",
            "status": "active",
            "createdAt": "2024-03-05T10:15:00.123456",
            "examples": (0..examples).map(|i| json!({"id": i, "type": "positive"})).collect::<Vec<_>>(),
            "hypotheses": (0..hypotheses).map(|i| json!({"id": i, "confidence": 0.5})).collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    #[test]
    fn test_learning_stats_sum_over_sessions() {
        let stats = LearningStats::from_sessions(&[session(2, 1), session(3, 0)]);
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_examples, 5);
        assert_eq!(stats.total_hypotheses, 1);
    }

    #[test]
    fn test_created_on_accepts_naive_timestamps() {
        assert_eq!(session(0, 0).created_on(), NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn test_new_example_requires_both_sides() {
        let err = NewExample::new(SessionId(1), "  ", "{}", ExampleKind::Positive).unwrap_err();
        assert_eq!(err, CatalogError::EmptyField("source data"));

        let example = NewExample::new(
            SessionId(1),
            r#"{"name": "Margherita Pizza", "price": 9.99, "category": "Pizza"}"#,
            r#"{"title": "Margherita", "price": 9.99, "category": "Pizza"}"#,
            ExampleKind::Positive,
        )
        .unwrap();
        assert!(example.is_json());
        let wire = serde_json::to_value(&example).unwrap();
        assert_eq!(wire["type"], "positive");
        assert_eq!(wire["sessionId"], 1);
    }

    #[test]
    fn test_session_name_is_trimmed() {
        assert_eq!(validate_session_name("  Food Categorization ").unwrap(), "Food Categorization");
        assert!(validate_session_name("   ").is_err());
    }

    #[test]
    fn test_pending_and_answered_queries() {
        let details: SessionDetails = serde_json::from_value(json!({
            "id": 1,
            "name": "s",
            "oracleQueries": [
                {"id": 1, "queryType": "membership", "queryData": "{}", "status": "pending"},
                {"id": 2, "queryType": "equivalence", "queryData": "{}", "status": "answered", "response": "correct"}
            ]
        }))
        .unwrap();
        assert_eq!(details.pending_queries().len(), 1);
        assert_eq!(details.answered_queries()[0].response.as_deref(), Some("correct"));
    }

    #[test]
    fn test_unknown_example_kind() {
        let record: ExampleRecord = serde_json::from_value(json!({"id": 1, "type": "neutral"})).unwrap();
        assert_eq!(record.kind, ExampleKind::Unknown);
    }

    #[test]
    fn test_hypothesis_test_report_shapes() {
        assert!(HypothesisTestReport::from_value(&json!(true)).success);
        let report = HypothesisTestReport::from_value(&json!(
            "{\"correctCount\": 4, \"totalCount\": 5, \"confidence\": 0.8, \"success\": true}"
        ));
        assert_eq!(report.correct_count, Some(4));
        assert_eq!(report.total_count, Some(5));
        let plain = HypothesisTestReport::from_value(&json!("Hypothesis tested"));
        assert_eq!(plain.message.as_deref(), Some("Hypothesis tested"));
    }

    #[test]
    fn test_decode_stats_and_achievement_ids() {
        let stats: GlobalStats = decode_stats(
            r#"{"totalSessions": 3, "averageConfidence": 0.75,
                "topPerformingSession": {"name": "Menu", "confidence": 0.9, "hypothesisCount": 2}}"#,
        )
        .unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(format_percent(stats.average_confidence), "75.0%");

        let achievements: Vec<Achievement> =
            decode_stats(r#"[{"id": 7, "title": "First Example", "progress": 1.0}]"#).unwrap();
        assert_eq!(achievements[0].id, "7");
        assert!(achievements[0].is_unlocked());

        assert!(decode_stats::<SessionStats>("nope").is_err());
    }

    #[test]
    fn test_mapping_status_and_partition() {
        let mappings: Vec<Mapping> = serde_json::from_value(json!([
            {"id": 1, "description": "Strip category suffix", "status": "pending", "createdAt": "2024-03-05T10:15:00"},
            {"id": 2, "description": "Raise prices", "functionCode": "return entry;", "status": "accepted"},
            {"id": 3, "description": "Group categories", "status": "in-review"}
        ]))
        .unwrap();
        assert_eq!(mappings[2].status, MappingStatus::Pending);

        let (pending, evaluated) = partition_mappings(&mappings);
        assert_eq!(pending.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(evaluated[0].function_code.as_deref(), Some("return entry;"));

        assert_eq!("Reject".parse::<MappingStatus>().unwrap(), MappingStatus::Rejected);
        assert!(matches!("maybe".parse::<MappingStatus>(), Err(CatalogError::UnknownStatus(_))));
        assert_eq!(serde_json::to_value(MappingStatus::Accepted).unwrap(), json!("accepted"));
    }

    #[test]
    fn test_new_mapping_requires_description_and_code() {
        assert_eq!(
            NewMapping::new(" ", "return entry;").unwrap_err(),
            CatalogError::EmptyField("description")
        );
        assert_eq!(
            NewMapping::new("Identity", "\n").unwrap_err(),
            CatalogError::EmptyField("function code")
        );
        let wire = serde_json::to_value(NewMapping::new("Identity", "return entry;").unwrap()).unwrap();
        assert_eq!(wire, json!({"description": "Identity", "functionCode": "return entry;"}));
    }

    #[test]
    fn test_source_entries() {
        let seed = default_seed();
        assert_eq!(seed.len(), 5);
        assert_eq!(seed[1].name, "BBQ Chicken Pizza");
        assert!(seed.iter().all(|e| e.validate().is_ok()));

        assert_eq!(NewSourceEntry::new("Tiramisu", -1.0, "Dessert").unwrap_err(), CatalogError::InvalidPrice);
        assert_eq!(NewSourceEntry::new("Tiramisu", f64::NAN, "Dessert").unwrap_err(), CatalogError::InvalidPrice);
        assert_eq!(NewSourceEntry::new("Tiramisu", 6.0, "").unwrap_err(), CatalogError::EmptyField("category"));

        let entry: SourceEntry =
            serde_json::from_value(json!({"id": 4, "name": "Greek Salad", "price": 8.5, "category": "Salad"})).unwrap();
        assert_eq!(entry.price, 8.5);
    }

    #[test]
    fn test_menu_grouping() {
        let items: Vec<MenuItem> = serde_json::from_value(json!([
            {"id": "1", "title": "Margherita", "price": 9.99, "category": {"id": 1, "title": "Pizza"}},
            {"id": 2, "title": "Caesar", "price": 7.5, "category": {"id": "2", "title": "Salad"}},
            {"id": 3, "title": "BBQ Chicken", "price": 11.99, "category": {"id": 1, "title": "Pizza"}},
            {"id": 4, "title": "Mystery", "category": null}
        ]))
        .unwrap();
        let groups = group_by_category(&items);
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["", "Pizza", "Salad"]);
        assert_eq!(groups["Pizza"].len(), 2);
        assert_eq!(groups[""][0].title, "Mystery");

        let categories: Vec<Category> = serde_json::from_value(json!([
            {"id": 1, "title": "Pizza", "menuItems": [{"id": 1, "title": "Margherita"}]}
        ]))
        .unwrap();
        assert_eq!(categories[0].menu_items[0].id, "1");
    }

    #[test]
    fn test_fact_for_day_rotates() {
        let facts: Vec<FunFact> = decode_stats(
            r#"[{"emoji": "🧠", "fact": "L* learns regular languages", "category": "Theory"},
                {"emoji": "🍕", "fact": "Pizza is a category", "category": "Demo"}]"#,
        )
        .unwrap();
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(fact_for_day(&facts, jan1).unwrap().category, "Theory");
        assert_eq!(fact_for_day(&facts, jan2).unwrap().category, "Demo");
        assert!(fact_for_day(&[], jan1).is_none());
    }
}
