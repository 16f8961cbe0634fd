//! Oracle query records and their typed payloads
//!
//! The learner hands out queries as `{id, type, payload}` where `payload` is
//! serialized JSON text (some deployments inline the object instead). The
//! raw record is kept as-is in the session; decoding into the typed sum type
//! happens on presentation so a malformed payload never takes the session
//! down with it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::OracleError;
use crate::oracle::convergence::FinalResult;
use crate::oracle::hypothesis::Hypothesis;
use crate::types::{QueryId, QueryKind, SessionId};

/// Membership query budget in the reference configuration
pub const DEFAULT_MAX_MEMBERSHIP_QUERIES: u32 = 8;

/// Equivalence query budget in the reference configuration
pub const DEFAULT_MAX_EQUIVALENCE_QUERIES: u32 = 3;

/// Query counters reported by the learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default)]
    pub membership_queries: u32,
    #[serde(default = "default_max_membership")]
    pub max_membership_queries: u32,
    #[serde(default)]
    pub equivalence_queries: u32,
    #[serde(default = "default_max_equivalence")]
    pub max_equivalence_queries: u32,
}

fn default_max_membership() -> u32 {
    DEFAULT_MAX_MEMBERSHIP_QUERIES
}

fn default_max_equivalence() -> u32 {
    DEFAULT_MAX_EQUIVALENCE_QUERIES
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            membership_queries: 0,
            max_membership_queries: DEFAULT_MAX_MEMBERSHIP_QUERIES,
            equivalence_queries: 0,
            max_equivalence_queries: DEFAULT_MAX_EQUIVALENCE_QUERIES,
        }
    }
}

impl Progress {
    /// Counters are within their configured maxima
    pub fn within_limits(&self) -> bool {
        self.membership_queries <= self.max_membership_queries
            && self.equivalence_queries <= self.max_equivalence_queries
    }

    /// Both budgets are spent
    pub fn is_exhausted(&self) -> bool {
        self.membership_queries >= self.max_membership_queries
            && self.equivalence_queries >= self.max_equivalence_queries
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "membership {}/{}, equivalence {}/{}",
            self.membership_queries,
            self.max_membership_queries,
            self.equivalence_queries,
            self.max_equivalence_queries
        )
    }
}

/// A query as it arrives from the learner, payload still undecoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuery {
    pub id: QueryId,
    #[serde(rename = "type")]
    pub query_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl RawQuery {
    /// Build a record whose payload is serialized text, the way the learner sends it
    pub fn serialized<T: Serialize>(id: QueryId, kind: QueryKind, payload: &T) -> Result<Self, OracleError> {
        Ok(Self {
            id,
            query_type: kind.as_str().to_string(),
            payload: Value::String(serde_json::to_string(payload)?),
        })
    }

    pub fn kind(&self) -> Option<QueryKind> {
        QueryKind::from_wire(&self.query_type)
    }

    /// Payload as a JSON value, parsing it first when it arrived as text
    fn payload_value(&self) -> Result<Value, OracleError> {
        match &self.payload {
            Value::String(text) => serde_json::from_str(text)
                .map_err(|e| OracleError::Decode(format!("query {} payload: {}", self.id, e))),
            Value::Null => Err(OracleError::Decode(format!("query {} has no payload", self.id))),
            other => Ok(other.clone()),
        }
    }

    /// Decode into the typed query
    pub fn decode(&self) -> Result<OracleQuery, OracleError> {
        let kind = self.kind().ok_or_else(|| {
            OracleError::Decode(format!("query {} has unknown type '{}'", self.id, self.query_type))
        })?;
        let value = self.payload_value()?;

        let payload = match kind {
            QueryKind::Membership => QueryPayload::Membership(
                serde_json::from_value(value)
                    .map_err(|e| OracleError::Decode(format!("membership query {}: {}", self.id, e)))?,
            ),
            QueryKind::Equivalence => QueryPayload::Equivalence(
                serde_json::from_value(value)
                    .map_err(|e| OracleError::Decode(format!("equivalence query {}: {}", self.id, e)))?,
            ),
        };

        Ok(OracleQuery { id: self.id, payload })
    }
}

/// Typed oracle query
#[derive(Debug, Clone, PartialEq)]
pub struct OracleQuery {
    pub id: QueryId,
    pub payload: QueryPayload,
}

impl OracleQuery {
    pub fn kind(&self) -> QueryKind {
        match self.payload {
            QueryPayload::Membership(_) => QueryKind::Membership,
            QueryPayload::Equivalence(_) => QueryKind::Equivalence,
        }
    }

    pub fn progress(&self) -> Progress {
        match &self.payload {
            QueryPayload::Membership(p) => p.progress,
            QueryPayload::Equivalence(p) => p.progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryPayload {
    Membership(MembershipPayload),
    Equivalence(EquivalencePayload),
}

/// "Does this example belong to the category?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPayload {
    pub question: String,
    #[serde(default)]
    pub category: String,
    /// Example label -> example text
    #[serde(default)]
    pub examples: BTreeMap<String, String>,
    #[serde(default)]
    pub progress: Progress,
}

/// "Is this hypothesis the target concept?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquivalencePayload {
    #[serde(default)]
    pub instruction: String,
    pub hypothesis: Hypothesis,
    #[serde(default)]
    pub examples: EquivalenceGuidance,
    #[serde(default)]
    pub progress: Progress,
}

/// How to answer an equivalence query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceGuidance {
    #[serde(default)]
    pub correct: String,
    #[serde(default)]
    pub counterexample: String,
}

/// Answer to a membership query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAnswer {
    Yes,
    No,
}

impl MembershipAnswer {
    /// Parse common spellings of yes/no
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" => Some(MembershipAnswer::Yes),
            "false" | "no" | "n" => Some(MembershipAnswer::No),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            MembershipAnswer::Yes => "true",
            MembershipAnswer::No => "false",
        }
    }

    /// Exactly one of the two canonical wire values
    pub fn is_canonical(response: &str) -> bool {
        response == "true" || response == "false"
    }
}

/// Answer to an equivalence query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EquivalenceAnswer {
    Correct,
    /// Identifier of an item the hypothesis misclassifies
    Counterexample(String),
}

impl EquivalenceAnswer {
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.to_lowercase().as_str() {
            "correct" | "c" | "equivalent" => Some(EquivalenceAnswer::Correct),
            _ => Some(EquivalenceAnswer::Counterexample(trimmed.to_string())),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            EquivalenceAnswer::Correct => "correct",
            EquivalenceAnswer::Counterexample(item) => item,
        }
    }
}

/// Reply to `startLearning`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReply {
    pub session_id: SessionId,
    #[serde(default)]
    pub current_query: Option<RawQuery>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub final_result: Option<FinalResult>,
}

/// Reply to `answerQuery`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReply {
    #[serde(default)]
    pub next_query: Option<RawQuery>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub final_result: Option<FinalResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnswerReply {
    /// A logical rejection that leaves the session where it was
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn membership_record(payload: Value) -> RawQuery {
        RawQuery {
            id: QueryId(1),
            query_type: "membership".to_string(),
            payload,
        }
    }

    #[test]
    fn test_decode_serialized_membership_payload() {
        let text = json!({
            "question": "Is a Margherita Pizza a Pizza?",
            "category": "Pizza",
            "examples": {"Margherita Pizza": "tomato, mozzarella, basil"},
            "progress": {
                "membershipQueries": 0,
                "maxMembershipQueries": 8,
                "equivalenceQueries": 0,
                "maxEquivalenceQueries": 3
            }
        })
        .to_string();

        let query = membership_record(Value::String(text)).decode().unwrap();
        assert_eq!(query.kind(), QueryKind::Membership);
        match query.payload {
            QueryPayload::Membership(p) => {
                assert_eq!(p.question, "Is a Margherita Pizza a Pizza?");
                assert_eq!(p.examples.len(), 1);
                assert_eq!(p.progress.max_membership_queries, 8);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_decode_inline_payload() {
        let query = membership_record(json!({"question": "Is Tiramisu a Pizza?"}))
            .decode()
            .unwrap();
        assert_eq!(query.progress(), Progress::default());
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        let err = membership_record(Value::String("{not json".to_string()))
            .decode()
            .unwrap_err();
        assert!(matches!(err, OracleError::Decode(_)));
    }

    #[test]
    fn test_unknown_type_is_decode_error() {
        let mut record = membership_record(json!({"question": "?"}));
        record.query_type = "transformation".to_string();
        assert!(matches!(record.decode(), Err(OracleError::Decode(_))));
    }

    #[test]
    fn test_missing_payload_is_decode_error() {
        assert!(matches!(
            membership_record(Value::Null).decode(),
            Err(OracleError::Decode(_))
        ));
    }

    #[test]
    fn test_equivalence_requires_hypothesis() {
        let record = RawQuery {
            id: QueryId(4),
            query_type: "equivalence".to_string(),
            payload: json!({"instruction": "Check the automaton"}),
        };
        assert!(matches!(record.decode(), Err(OracleError::Decode(_))));
    }

    #[test]
    fn test_progress_limits() {
        let mut progress = Progress::default();
        assert!(progress.within_limits());
        assert!(!progress.is_exhausted());

        progress.membership_queries = 8;
        progress.equivalence_queries = 3;
        assert!(progress.within_limits());
        assert!(progress.is_exhausted());

        progress.equivalence_queries = 4;
        assert!(!progress.within_limits());
    }

    #[test]
    fn test_membership_answer_parsing() {
        assert_eq!(MembershipAnswer::parse("Yes"), Some(MembershipAnswer::Yes));
        assert_eq!(MembershipAnswer::parse("n"), Some(MembershipAnswer::No));
        assert_eq!(MembershipAnswer::parse("maybe"), None);
        assert!(MembershipAnswer::is_canonical("true"));
        assert!(!MembershipAnswer::is_canonical("True"));
    }

    #[test]
    fn test_equivalence_answer_parsing() {
        assert_eq!(EquivalenceAnswer::parse("Correct"), Some(EquivalenceAnswer::Correct));
        assert_eq!(
            EquivalenceAnswer::parse(" Caesar Salad "),
            Some(EquivalenceAnswer::Counterexample("Caesar Salad".to_string()))
        );
        assert_eq!(EquivalenceAnswer::parse("   "), None);
    }

    #[test]
    fn test_answer_reply_error_is_optional() {
        let reply: AnswerReply = serde_json::from_str(r#"{"isComplete": false}"#).unwrap();
        assert!(reply.error.is_none());
        assert!(reply.next_query.is_none());
    }
}
