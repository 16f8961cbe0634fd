//! Remote learner interfaces
//!
//! The learning engine lives behind these traits:
//! - `LearnerApi`: the three calls the oracle session driver needs
//! - `CatalogApi`: plain data access for sessions, examples, hypotheses,
//!   mapping proposals and the menu data they are learned from
//!
//! Implementations:
//! - `graphql::GraphQlClient` talks to the learner's GraphQL endpoint
//! - `offline::OfflineLearner` is an in-process scripted learner

pub mod graphql;
pub mod offline;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::{
    Achievement, Category, ExampleRecord, FunFact, GlobalStats, HypothesisTestReport, LearningSession, Mapping,
    MappingStatus, MenuItem, NewExample, NewMapping, NewSourceEntry, OracleQueryRecord, SessionDetails,
    SessionStats, SourceEntry,
};
use crate::types::{QueryId, SessionId};

/// Failures below the protocol level
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("learner API error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("GraphQL error: {0}")]
    GraphQl(String),
    #[error("response is missing field '{0}'")]
    MissingData(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// The remote learner as seen by the oracle session driver.
///
/// Every call returns the learner's serialized JSON text; decoding is the
/// caller's job so malformed payloads can be reported instead of failing
/// inside the transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LearnerApi: Send + Sync {
    /// Start a new session: `{sessionId, currentQuery, isComplete, finalResult}`
    async fn start_learning(&self, session_name: &str) -> Result<String, TransportError>;

    /// Answer the outstanding query: `{nextQuery, isComplete, finalResult, error}`
    async fn answer_query(&self, session_id: SessionId, response: &str) -> Result<String, TransportError>;

    /// Current hypothesis snapshot: `{states, alphabet, transitions, startState, acceptStates, targetCategory, error?}`
    async fn current_dfa_state(&self, session_id: SessionId) -> Result<String, TransportError>;

    /// Backend name for logs and banners
    fn name(&self) -> &'static str;
}

/// Data access for sessions, examples, hypotheses, stored oracle queries,
/// mapping proposals and menu data
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<LearningSession>, TransportError>;

    async fn create_session(&self, name: &str, description: &str) -> Result<LearningSession, TransportError>;

    async fn session_details(&self, session_id: SessionId) -> Result<Option<SessionDetails>, TransportError>;

    async fn add_example(&self, example: &NewExample) -> Result<ExampleRecord, TransportError>;

    async fn generate_hypothesis(&self, session_id: SessionId) -> Result<String, TransportError>;

    async fn test_hypothesis(&self, hypothesis_id: i64) -> Result<HypothesisTestReport, TransportError>;

    async fn pending_queries(&self, session_id: SessionId) -> Result<Vec<OracleQueryRecord>, TransportError>;

    async fn answer_oracle_query(&self, query_id: QueryId, response: &str) -> Result<String, TransportError>;

    async fn global_stats(&self) -> Result<GlobalStats, TransportError>;

    async fn session_stats(&self, session_id: SessionId) -> Result<SessionStats, TransportError>;

    async fn achievements(&self, session_id: SessionId) -> Result<Vec<Achievement>, TransportError>;

    async fn fun_facts(&self) -> Result<Vec<FunFact>, TransportError>;

    async fn list_mappings(&self) -> Result<Vec<Mapping>, TransportError>;

    async fn propose_mapping(&self, mapping: &NewMapping) -> Result<Mapping, TransportError>;

    async fn evaluate_mapping(&self, mapping_id: i64, status: MappingStatus) -> Result<Mapping, TransportError>;

    /// Source (T1) rows that mappings transform
    async fn list_source_entries(&self) -> Result<Vec<SourceEntry>, TransportError>;

    async fn seed_source_data(&self, entries: &[NewSourceEntry]) -> Result<Vec<SourceEntry>, TransportError>;

    /// Clear source and target data; returns the learner's message
    async fn reset_data(&self) -> Result<String, TransportError>;

    async fn list_menu_items(&self) -> Result<Vec<MenuItem>, TransportError>;

    async fn list_categories(&self) -> Result<Vec<Category>, TransportError>;
}
