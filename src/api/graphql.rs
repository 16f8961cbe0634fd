//! GraphQL client for the remote learner

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CatalogApi, LearnerApi, TransportError};
use crate::catalog::{
    Achievement, Category, ExampleRecord, FunFact, GlobalStats, HypothesisTestReport, LearningSession, Mapping,
    MappingStatus, MenuItem, NewExample, NewMapping, NewSourceEntry, OracleQueryRecord, SessionDetails,
    SessionStats, SourceEntry,
};
use crate::config::ApiConfig;
use crate::types::{QueryId, SessionId};

const START_LEARNING: &str = r#"
mutation StartLearning($sessionName: String!) {
  startLearning(sessionName: $sessionName)
}"#;

const ANSWER_QUERY: &str = r#"
mutation AnswerQuery($sessionId: Int!, $response: String!) {
  answerQuery(sessionId: $sessionId, response: $response)
}"#;

const CURRENT_DFA_STATE: &str = r#"
query CurrentDFAState($sessionId: Int!) {
  currentDFAState(sessionId: $sessionId)
}"#;

const ALL_SESSIONS: &str = r#"
query AllLearningSessions {
  allLearningSessions {
    id name description status createdAt
    hypotheses { id description confidence status createdAt }
    examples { id sourceData targetData type createdAt }
  }
}"#;

const CREATE_SESSION: &str = r#"
mutation CreateLearningSession($data: LearningSessionInput!) {
  createLearningSession(data: $data) { id name description status createdAt }
}"#;

const SESSION_BY_ID: &str = r#"
query LearningSessionById($id: Int!) {
  learningSessionById(id: $id) {
    id name description status
    hypotheses {
      id description functionCode confidence status createdAt
      examples { id sourceData targetData type }
      counterexamples { id sourceData errorMessage }
    }
    examples { id sourceData targetData type createdAt }
    oracleQueries { id queryType queryData response status createdAt }
  }
}"#;

const ADD_EXAMPLE: &str = r#"
mutation AddExample($data: ExampleInput!) {
  addExample(data: $data) { id sourceData targetData type createdAt }
}"#;

const GENERATE_HYPOTHESIS: &str = r#"
mutation GenerateHypothesis($sessionId: Int!) {
  generateHypothesis(sessionId: $sessionId)
}"#;

const TEST_HYPOTHESIS: &str = r#"
mutation TestHypothesis($hypothesisId: Int!) {
  testHypothesis(hypothesisId: $hypothesisId)
}"#;

const PENDING_QUERIES: &str = r#"
query PendingOracleQueries($sessionId: Int!) {
  pendingOracleQueries(sessionId: $sessionId) { id queryType queryData response status createdAt }
}"#;

const ANSWER_ORACLE_QUERY: &str = r#"
mutation AnswerOracleQuery($queryId: Int!, $response: String!) {
  answerOracleQuery(queryId: $queryId, response: $response)
}"#;

const GLOBAL_STATS: &str = r#"
query GlobalStats {
  globalStats
}"#;

const SESSION_STATS: &str = r#"
query SessionStats($sessionId: Int!) {
  sessionStats(sessionId: $sessionId)
}"#;

const ACHIEVEMENTS: &str = r#"
query Achievements($sessionId: Int!) {
  achievements(sessionId: $sessionId)
}"#;

const FUN_FACTS: &str = r#"
query FunFacts {
  funFacts
}"#;

const ALL_MAPPINGS: &str = r#"
query AllMappings {
  allMappings { id description functionCode status createdAt }
}"#;

const PROPOSE_MAPPING: &str = r#"
mutation ProposeMapping($data: MappingInput!) {
  proposeMapping(data: $data) { id description status }
}"#;

const EVALUATE_MAPPING: &str = r#"
mutation EvaluateMapping($data: MappingStatusInput!) {
  evaluateMapping(data: $data) { id status }
}"#;

const ALL_T1_ENTRIES: &str = r#"
query AllT1Entries {
  allT1Entries { id name price category }
}"#;

const SEED_T1_DATA: &str = r#"
mutation SeedT1Data($data: [T1CreateInput!]!) {
  seedT1Data(data: $data) { id name price category }
}"#;

const RESET_DATA: &str = r#"
mutation ResetData {
  resetData
}"#;

const ALL_MENU_ITEMS: &str = r#"
query AllMenuItems {
  allMenuItems { id title price category { id title } }
}"#;

const ALL_CATEGORIES: &str = r#"
query AllCategories {
  allCategories { id title menuItems { id title } }
}"#;

/// Client for the learner's GraphQL endpoint
#[derive(Clone)]
pub struct GraphQlClient {
    client: Arc<Client>,
    endpoint: String,
    auth_token: Option<String>,
}

impl GraphQlClient {
    /// Client with reqwest defaults
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into(),
            auth_token: None,
        }
    }

    /// Client honouring the configured timeout and token
    pub fn from_config(config: &ApiConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client: Arc::new(client),
            endpoint: config.endpoint.clone(),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one operation and return its `data` object
    pub async fn execute(&self, document: &str, variables: Value) -> Result<Value, TransportError> {
        let body = build_request(document, variables);

        let mut req_builder = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.auth_token {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", token));
        }
        let response = req_builder.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!("Learner returned {}: {}", status, crate::truncate_safe(&text, 200));
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!("GraphQL response: {}", crate::truncate_safe(&text, 500));
        parse_envelope(&text)
    }

    async fn field<T: DeserializeOwned>(
        &self,
        document: &str,
        variables: Value,
        name: &str,
    ) -> Result<T, TransportError> {
        let data = self.execute(document, variables).await?;
        decode_field(data, name)
    }

    async fn text_field(&self, document: &str, variables: Value, name: &str) -> Result<String, TransportError> {
        let data = self.execute(document, variables).await?;
        take_field(data, name).map(into_text)
    }

    /// Stats fields are JSON scalars; some servers send them as text
    async fn json_scalar<T: DeserializeOwned>(
        &self,
        document: &str,
        variables: Value,
        name: &str,
    ) -> Result<T, TransportError> {
        let data = self.execute(document, variables).await?;
        decode_json_scalar(data, name)
    }
}

/// Request body for a GraphQL POST
pub fn build_request(document: &str, variables: Value) -> Value {
    json!({
        "query": document,
        "variables": variables,
    })
}

/// Unwrap a `{data, errors}` response, failing on any reported error
pub fn parse_envelope(body: &str) -> Result<Value, TransportError> {
    let envelope: Value = serde_json::from_str(body)?;

    if let Some(errors) = envelope.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
                .collect();
            return Err(TransportError::GraphQl(messages.join("; ")));
        }
    }

    match envelope.get("data") {
        Some(Value::Null) | None => Err(TransportError::MissingData("data".into())),
        Some(data) => Ok(data.clone()),
    }
}

fn take_field(mut data: Value, name: &str) -> Result<Value, TransportError> {
    match data.get_mut(name).map(Value::take) {
        Some(value) => Ok(value),
        None => Err(TransportError::MissingData(name.to_string())),
    }
}

fn decode_field<T: DeserializeOwned>(data: Value, name: &str) -> Result<T, TransportError> {
    Ok(serde_json::from_value(take_field(data, name)?)?)
}

fn decode_json_scalar<T: DeserializeOwned>(data: Value, name: &str) -> Result<T, TransportError> {
    let value = match take_field(data, name)? {
        Value::String(text) => serde_json::from_str(&text)?,
        other => other,
    };
    Ok(serde_json::from_value(value)?)
}

/// Scalar fields carry serialized JSON; an inline object is re-serialized
fn into_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl LearnerApi for GraphQlClient {
    async fn start_learning(&self, session_name: &str) -> Result<String, TransportError> {
        self.text_field(START_LEARNING, json!({ "sessionName": session_name }), "startLearning")
            .await
    }

    async fn answer_query(&self, session_id: SessionId, response: &str) -> Result<String, TransportError> {
        self.text_field(
            ANSWER_QUERY,
            json!({ "sessionId": session_id, "response": response }),
            "answerQuery",
        )
        .await
    }

    async fn current_dfa_state(&self, session_id: SessionId) -> Result<String, TransportError> {
        self.text_field(CURRENT_DFA_STATE, json!({ "sessionId": session_id }), "currentDFAState")
            .await
    }

    fn name(&self) -> &'static str {
        "graphql"
    }
}

#[async_trait]
impl CatalogApi for GraphQlClient {
    async fn list_sessions(&self) -> Result<Vec<LearningSession>, TransportError> {
        self.field(ALL_SESSIONS, json!({}), "allLearningSessions").await
    }

    async fn create_session(&self, name: &str, description: &str) -> Result<LearningSession, TransportError> {
        self.field(
            CREATE_SESSION,
            json!({ "data": { "name": name, "description": description } }),
            "createLearningSession",
        )
        .await
    }

    async fn session_details(&self, session_id: SessionId) -> Result<Option<SessionDetails>, TransportError> {
        self.field(SESSION_BY_ID, json!({ "id": session_id }), "learningSessionById")
            .await
    }

    async fn add_example(&self, example: &NewExample) -> Result<ExampleRecord, TransportError> {
        self.field(ADD_EXAMPLE, json!({ "data": example }), "addExample").await
    }

    async fn generate_hypothesis(&self, session_id: SessionId) -> Result<String, TransportError> {
        self.text_field(
            GENERATE_HYPOTHESIS,
            json!({ "sessionId": session_id }),
            "generateHypothesis",
        )
        .await
    }

    async fn test_hypothesis(&self, hypothesis_id: i64) -> Result<HypothesisTestReport, TransportError> {
        let data = self
            .execute(TEST_HYPOTHESIS, json!({ "hypothesisId": hypothesis_id }))
            .await?;
        let value = take_field(data, "testHypothesis")?;
        Ok(HypothesisTestReport::from_value(&value))
    }

    async fn pending_queries(&self, session_id: SessionId) -> Result<Vec<OracleQueryRecord>, TransportError> {
        self.field(
            PENDING_QUERIES,
            json!({ "sessionId": session_id }),
            "pendingOracleQueries",
        )
        .await
    }

    async fn answer_oracle_query(&self, query_id: QueryId, response: &str) -> Result<String, TransportError> {
        self.text_field(
            ANSWER_ORACLE_QUERY,
            json!({ "queryId": query_id, "response": response }),
            "answerOracleQuery",
        )
        .await
    }

    async fn global_stats(&self) -> Result<GlobalStats, TransportError> {
        self.json_scalar(GLOBAL_STATS, json!({}), "globalStats").await
    }

    async fn session_stats(&self, session_id: SessionId) -> Result<SessionStats, TransportError> {
        self.json_scalar(SESSION_STATS, json!({ "sessionId": session_id }), "sessionStats")
            .await
    }

    async fn achievements(&self, session_id: SessionId) -> Result<Vec<Achievement>, TransportError> {
        self.json_scalar(ACHIEVEMENTS, json!({ "sessionId": session_id }), "achievements")
            .await
    }

    async fn fun_facts(&self) -> Result<Vec<FunFact>, TransportError> {
        self.json_scalar(FUN_FACTS, json!({}), "funFacts").await
    }

    async fn list_mappings(&self) -> Result<Vec<Mapping>, TransportError> {
        self.field(ALL_MAPPINGS, json!({}), "allMappings").await
    }

    async fn propose_mapping(&self, mapping: &NewMapping) -> Result<Mapping, TransportError> {
        self.field(PROPOSE_MAPPING, json!({ "data": mapping }), "proposeMapping")
            .await
    }

    async fn evaluate_mapping(&self, mapping_id: i64, status: MappingStatus) -> Result<Mapping, TransportError> {
        self.field(
            EVALUATE_MAPPING,
            json!({ "data": { "id": mapping_id, "status": status } }),
            "evaluateMapping",
        )
        .await
    }

    async fn list_source_entries(&self) -> Result<Vec<SourceEntry>, TransportError> {
        self.field(ALL_T1_ENTRIES, json!({}), "allT1Entries").await
    }

    async fn seed_source_data(&self, entries: &[NewSourceEntry]) -> Result<Vec<SourceEntry>, TransportError> {
        self.field(SEED_T1_DATA, json!({ "data": entries }), "seedT1Data").await
    }

    async fn reset_data(&self) -> Result<String, TransportError> {
        self.text_field(RESET_DATA, json!({}), "resetData").await
    }

    async fn list_menu_items(&self) -> Result<Vec<MenuItem>, TransportError> {
        self.field(ALL_MENU_ITEMS, json!({}), "allMenuItems").await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, TransportError> {
        self.field(ALL_CATEGORIES, json!({}), "allCategories").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_carries_variables() {
        let body = build_request(ANSWER_QUERY, json!({ "sessionId": SessionId(4), "response": "yes" }));
        assert_eq!(body["variables"]["sessionId"], 4);
        assert_eq!(body["variables"]["response"], "yes");
        assert!(body["query"].as_str().unwrap().contains("answerQuery("));
    }

    #[test]
    fn test_parse_envelope_returns_data() {
        let data = parse_envelope(r#"{"data": {"startLearning": "{\"sessionId\": 1}"}}"#).unwrap();
        assert_eq!(
            into_text(take_field(data, "startLearning").unwrap()),
            r#"{"sessionId": 1}"#
        );
    }

    #[test]
    fn test_parse_envelope_joins_errors() {
        let err = parse_envelope(
            r#"{"data": null, "errors": [{"message": "Session not found"}, {"message": "bad id"}]}"#,
        )
        .unwrap_err();
        match err {
            TransportError::GraphQl(msg) => assert_eq!(msg, "Session not found; bad id"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_envelope_missing_data() {
        assert!(matches!(
            parse_envelope(r#"{"data": null}"#),
            Err(TransportError::MissingData(_))
        ));
        assert!(matches!(parse_envelope("<html>"), Err(TransportError::Serialization(_))));
    }

    #[test]
    fn test_missing_field() {
        let err = take_field(json!({"other": 1}), "currentDFAState").unwrap_err();
        assert_eq!(err.to_string(), "response is missing field 'currentDFAState'");
    }

    #[test]
    fn test_inline_object_is_reserialized() {
        let text = into_text(json!({"isComplete": true}));
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["isComplete"], true);
    }

    #[test]
    fn test_mappings_from_envelope() {
        let data = parse_envelope(
            r#"{"data": {"allMappings": [
                {"id": 1, "description": "Strip suffix", "functionCode": "return entry;", "status": "accepted", "createdAt": "2024-03-05T10:15:00"},
                {"id": 2, "description": "Raise prices", "functionCode": null, "status": "pending", "createdAt": null}
            ]}}"#,
        )
        .unwrap();
        let mappings: Vec<Mapping> = decode_field(data, "allMappings").unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].status, MappingStatus::Accepted);
        assert!(mappings[1].is_pending());

        // evaluateMapping selects only id and status
        let data = parse_envelope(r#"{"data": {"evaluateMapping": {"id": 2, "status": "rejected"}}}"#).unwrap();
        let evaluated: Mapping = decode_field(data, "evaluateMapping").unwrap();
        assert_eq!(evaluated.status, MappingStatus::Rejected);
        assert!(evaluated.description.is_empty());
    }

    #[test]
    fn test_evaluate_variables_use_wire_status() {
        let body = build_request(
            EVALUATE_MAPPING,
            json!({ "data": { "id": 2, "status": MappingStatus::Accepted } }),
        );
        assert_eq!(body["variables"]["data"]["status"], "accepted");
    }

    #[test]
    fn test_seed_and_source_entries() {
        let body = build_request(SEED_T1_DATA, json!({ "data": crate::catalog::default_seed() }));
        assert_eq!(body["variables"]["data"][0]["name"], "Margherita Pizza");
        assert_eq!(body["variables"]["data"][4]["category"], "Pasta");

        let data = parse_envelope(
            r#"{"data": {"seedT1Data": [{"id": 1, "name": "Margherita Pizza", "price": 9.99, "category": "Pizza"}]}}"#,
        )
        .unwrap();
        let entries: Vec<SourceEntry> = decode_field(data, "seedT1Data").unwrap();
        assert_eq!(entries[0].price, 9.99);

        let data = parse_envelope(r#"{"data": {"resetData": "All data cleared"}}"#).unwrap();
        assert_eq!(into_text(take_field(data, "resetData").unwrap()), "All data cleared");
    }

    #[test]
    fn test_menu_items_and_categories() {
        let data = parse_envelope(
            r#"{"data": {"allMenuItems": [{"id": "1", "title": "Margherita", "price": 9.99, "category": {"id": "1", "title": "Pizza"}}]}}"#,
        )
        .unwrap();
        let items: Vec<MenuItem> = decode_field(data, "allMenuItems").unwrap();
        assert_eq!(items[0].category.as_ref().unwrap().title, "Pizza");

        let data = parse_envelope(
            r#"{"data": {"allCategories": [{"id": 1, "title": "Pizza", "menuItems": [{"id": 1, "title": "Margherita"}]}]}}"#,
        )
        .unwrap();
        let categories: Vec<Category> = decode_field(data, "allCategories").unwrap();
        assert_eq!(categories[0].menu_items.len(), 1);
    }

    #[test]
    fn test_fun_facts_scalar_as_text_or_inline() {
        let data = parse_envelope(
            r#"{"data": {"funFacts": "[{"emoji": "🧠", "fact": "L* needs a teacher", "category": "Theory"}]"}}"#,
        )
        .unwrap();
        let facts: Vec<FunFact> = decode_json_scalar(data, "funFacts").unwrap();
        assert_eq!(facts[0].fact, "L* needs a teacher");

        let data = parse_envelope(r#"{"data": {"funFacts": [{"fact": "Inline works too"}]}}"#).unwrap();
        let facts: Vec<FunFact> = decode_json_scalar(data, "funFacts").unwrap();
        assert!(facts[0].emoji.is_empty());

        let data = parse_envelope(r#"{"data": {"funFacts": "not json"}}"#).unwrap();
        assert!(matches!(
            decode_json_scalar::<Vec<FunFact>>(data, "funFacts"),
            Err(TransportError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_config_drops_empty_token() {
        let config = ApiConfig {
            auth_token: Some(String::new()),
            ..ApiConfig::default()
        };
        let client = GraphQlClient::from_config(&config).unwrap();
        assert!(client.auth_token.is_none());
        assert_eq!(client.endpoint(), config.endpoint);
    }
}
