//! Offline scripted learner for the food-categorization demo
//!
//! Speaks the same serialized protocol as the remote learner so the driver,
//! the CLI and the tests can run without a server. It is a script, not a
//! learning algorithm: it asks about a fixed menu one item at a time, poses
//! an equivalence query every half of the membership budget, and builds its
//! hypothesis straight from the oracle's answers.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use super::{LearnerApi, TransportError};
use crate::oracle::convergence::{FinalResult, Metrics};
use crate::oracle::hypothesis::{Hypothesis, LiveDfaState, Transitions};
use crate::oracle::query::{
    AnswerReply, EquivalenceGuidance, EquivalencePayload, MembershipAnswer, MembershipPayload, Progress,
    RawQuery, StartReply, DEFAULT_MAX_EQUIVALENCE_QUERIES, DEFAULT_MAX_MEMBERSHIP_QUERIES,
};
use crate::types::{QueryId, QueryKind, SessionId};

/// Category the demo learns
pub const TARGET_CATEGORY: &str = "Pizza";

const START_STATE: &str = "q0";
const ACCEPT_STATE: &str = "q1";
const REJECT_STATE: &str = "q2";

/// (name, category, description)
const MENU: &[(&str, &str, &str)] = &[
    ("Margherita Pizza", "Pizza", "Tomato, mozzarella and basil on a thin crust"),
    ("Caesar Salad", "Salad", "Romaine, parmesan and croutons"),
    ("Pepperoni Pizza", "Pizza", "Tomato, mozzarella and pepperoni"),
    ("Spaghetti Carbonara", "Pasta", "Spaghetti with egg, pecorino and guanciale"),
    ("Hawaiian Pizza", "Pizza", "Tomato, mozzarella, ham and pineapple"),
    ("Greek Salad", "Salad", "Tomato, cucumber, olives and feta"),
    ("Tiramisu", "Dessert", "Coffee-soaked ladyfingers with mascarpone"),
    ("Four Cheese Pizza", "Pizza", "Mozzarella, gorgonzola, parmesan and fontina"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Membership(usize),
    Equivalence,
}

#[derive(Debug)]
struct Script {
    pending: Option<(QueryId, Pending)>,
    next_query_id: i64,
    next_item: usize,
    /// item index -> oracle said it belongs to the category
    answers: BTreeMap<usize, bool>,
    /// items named as counterexamples, their classification is flipped
    flipped: BTreeSet<usize>,
    membership_answered: u32,
    equivalence_answered: u32,
    max_membership: u32,
    max_equivalence: u32,
}

impl Script {
    fn new(max_membership: u32, max_equivalence: u32) -> Self {
        Self {
            pending: None,
            next_query_id: 1,
            next_item: 0,
            answers: BTreeMap::new(),
            flipped: BTreeSet::new(),
            membership_answered: 0,
            equivalence_answered: 0,
            max_membership,
            max_equivalence,
        }
    }

    fn progress(&self) -> Progress {
        Progress {
            membership_queries: self.membership_answered,
            max_membership_queries: self.max_membership,
            equivalence_queries: self.equivalence_answered,
            max_equivalence_queries: self.max_equivalence,
        }
    }

    fn believes_member(&self, item: usize) -> bool {
        let answered = self.answers.get(&item).copied().unwrap_or(false);
        answered != self.flipped.contains(&item)
    }

    fn hypothesis(&self) -> Hypothesis {
        let mut edges = BTreeMap::new();
        let mut alphabet = Vec::new();
        for &item in self.answers.keys() {
            let name = MENU[item].0.to_string();
            let to = if self.believes_member(item) { ACCEPT_STATE } else { REJECT_STATE };
            edges.insert(name.clone(), to.to_string());
            alphabet.push(name);
        }
        let mut transitions = Transitions::new();
        if !edges.is_empty() {
            transitions.insert(START_STATE.to_string(), edges);
        }

        let any_member = self.answers.keys().any(|&item| self.believes_member(item));
        Hypothesis {
            states: vec![START_STATE.into(), ACCEPT_STATE.into(), REJECT_STATE.into()],
            alphabet,
            transitions,
            start_state: START_STATE.into(),
            accept_states: if any_member { vec![ACCEPT_STATE.into()] } else { Vec::new() },
            target_category: TARGET_CATEGORY.into(),
        }
    }

    fn metrics(&self) -> Metrics {
        let correct = self
            .answers
            .keys()
            .filter(|&&item| self.believes_member(item) == (MENU[item].1 == TARGET_CATEGORY))
            .count() as u32;
        let judged = self.answers.len() as u32;
        Metrics {
            accuracy: if judged == 0 { 0.0 } else { f64::from(correct) / f64::from(judged) },
            total_queries: self.membership_answered + self.equivalence_answered,
            correct_predictions: correct,
        }
    }

    fn next_id(&mut self) -> QueryId {
        let id = QueryId(self.next_query_id);
        self.next_query_id += 1;
        id
    }

    fn membership_query(&mut self, item: usize) -> Result<RawQuery, TransportError> {
        let (name, category, description) = MENU[item];
        let payload = MembershipPayload {
            question: format!("Is a {} a {}?", name, TARGET_CATEGORY),
            category: TARGET_CATEGORY.to_string(),
            examples: BTreeMap::from([(name.to_string(), format!("{} ({})", description, category_hint(category)))]),
            progress: self.progress(),
        };
        let id = self.next_id();
        self.pending = Some((id, Pending::Membership(item)));
        self.next_item = item + 1;
        RawQuery::serialized(id, QueryKind::Membership, &payload).map_err(|e| TransportError::Other(e.to_string()))
    }

    fn equivalence_query(&mut self) -> Result<RawQuery, TransportError> {
        let payload = EquivalencePayload {
            instruction: format!(
                "Does this automaton accept exactly the {} items on the menu? Answer 'correct' or name an item it gets wrong.",
                TARGET_CATEGORY
            ),
            hypothesis: self.hypothesis(),
            examples: EquivalenceGuidance {
                correct: "correct".to_string(),
                counterexample: "Name or number (1-8) of a misclassified menu item".to_string(),
            },
            progress: self.progress(),
        };
        let id = self.next_id();
        self.pending = Some((id, Pending::Equivalence));
        RawQuery::serialized(id, QueryKind::Equivalence, &payload).map_err(|e| TransportError::Other(e.to_string()))
    }

    fn membership_exhausted(&self) -> bool {
        self.membership_answered >= self.max_membership || self.next_item >= MENU.len()
    }

    /// Half the membership budget between equivalence rounds
    fn equivalence_due(&self) -> bool {
        let round = (self.max_membership / 2).max(1);
        self.membership_answered > 0 && self.membership_answered % round == 0
    }

    fn complete(&mut self) -> AnswerReply {
        self.pending = None;
        let h = self.hypothesis();
        let result = FinalResult {
            states: h.states,
            accept_states: h.accept_states,
            start_state: h.start_state,
            metrics: Some(self.metrics()),
        };
        AnswerReply {
            next_query: None,
            is_complete: true,
            final_result: Some(result),
            error: None,
        }
    }

    fn advance(&mut self, query: RawQuery) -> AnswerReply {
        AnswerReply {
            next_query: Some(query),
            ..Default::default()
        }
    }

    fn after_membership(&mut self) -> Result<AnswerReply, TransportError> {
        let equivalence_left = self.equivalence_answered < self.max_equivalence;
        if equivalence_left && (self.equivalence_due() || self.membership_exhausted()) {
            let q = self.equivalence_query()?;
            return Ok(self.advance(q));
        }
        if !self.membership_exhausted() {
            let q = self.membership_query(self.next_item)?;
            return Ok(self.advance(q));
        }
        Ok(self.complete())
    }

    fn after_equivalence(&mut self) -> Result<AnswerReply, TransportError> {
        if self.equivalence_answered >= self.max_equivalence {
            return Ok(self.complete());
        }
        if !self.membership_exhausted() {
            let q = self.membership_query(self.next_item)?;
            return Ok(self.advance(q));
        }
        let q = self.equivalence_query()?;
        Ok(self.advance(q))
    }

    fn answer(&mut self, response: &str) -> Result<AnswerReply, TransportError> {
        let Some((_, pending)) = self.pending else {
            return Ok(AnswerReply::rejected("No pending query"));
        };

        match pending {
            Pending::Membership(item) => {
                let Some(answer) = MembershipAnswer::parse(response) else {
                    return Ok(AnswerReply::rejected(format!(
                        "Could not interpret '{}' as a yes/no answer",
                        response
                    )));
                };
                self.answers.insert(item, answer == MembershipAnswer::Yes);
                self.membership_answered += 1;
                self.after_membership()
            }
            Pending::Equivalence => {
                let normalized = response.trim().to_lowercase();
                match normalized.as_str() {
                    "correct" | "equivalent" | "true" | "yes" => {
                        self.equivalence_answered += 1;
                        Ok(self.complete())
                    }
                    "false" | "no" => {
                        self.equivalence_answered += 1;
                        self.after_equivalence()
                    }
                    "" => Ok(AnswerReply::rejected("Empty counterexample")),
                    _ => match find_item(response) {
                        Some(item) => {
                            if !self.flipped.insert(item) {
                                self.flipped.remove(&item);
                            }
                            self.answers.entry(item).or_insert(false);
                            self.equivalence_answered += 1;
                            self.after_equivalence()
                        }
                        None => Ok(AnswerReply::rejected(format!(
                            "Unknown counterexample item '{}'",
                            response.trim()
                        ))),
                    },
                }
            }
        }
    }
}

fn category_hint(category: &str) -> String {
    format!("listed under {}", category)
}

/// Find a menu item by name (case-insensitive) or 1-based number
fn find_item(input: &str) -> Option<usize> {
    let needle = input.trim();
    if let Ok(n) = needle.parse::<usize>() {
        return (1..=MENU.len()).contains(&n).then(|| n - 1);
    }
    MENU.iter().position(|(name, _, _)| name.eq_ignore_ascii_case(needle))
}

/// In-process learner with a scripted query sequence
pub struct OfflineLearner {
    sessions: Mutex<HashMap<SessionId, Script>>,
    next_session: AtomicI64,
    max_membership: u32,
    max_equivalence: u32,
}

impl OfflineLearner {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_MAX_MEMBERSHIP_QUERIES, DEFAULT_MAX_EQUIVALENCE_QUERIES)
    }

    /// Custom query budget. The membership budget is capped by the menu size.
    pub fn with_budget(max_membership: u32, max_equivalence: u32) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicI64::new(1),
            max_membership: max_membership.clamp(1, MENU.len() as u32),
            max_equivalence: max_equivalence.max(1),
        }
    }

    /// Menu item names in question order
    pub fn menu() -> Vec<&'static str> {
        MENU.iter().map(|(name, _, _)| *name).collect()
    }
}

impl Default for OfflineLearner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LearnerApi for OfflineLearner {
    async fn start_learning(&self, session_name: &str) -> Result<String, TransportError> {
        let session_id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        let mut script = Script::new(self.max_membership, self.max_equivalence);
        let first = script.membership_query(0)?;
        self.sessions.lock().await.insert(session_id, script);
        debug!("Offline learner started session {} ('{}')", session_id, session_name);

        let reply = StartReply {
            session_id,
            current_query: Some(first),
            is_complete: false,
            final_result: None,
        };
        Ok(serde_json::to_string(&reply)?)
    }

    async fn answer_query(&self, session_id: SessionId, response: &str) -> Result<String, TransportError> {
        let mut sessions = self.sessions.lock().await;
        let reply = match sessions.get_mut(&session_id) {
            Some(script) => script.answer(response)?,
            None => AnswerReply::rejected(format!("Session {} not found", session_id)),
        };
        if reply.is_complete {
            sessions.remove(&session_id);
            debug!("Offline learner finished session {}", session_id);
        }
        Ok(serde_json::to_string(&reply)?)
    }

    async fn current_dfa_state(&self, session_id: SessionId) -> Result<String, TransportError> {
        let sessions = self.sessions.lock().await;
        let live = match sessions.get(&session_id) {
            Some(script) => {
                let h = script.hypothesis();
                LiveDfaState {
                    states: h.states,
                    alphabet: h.alphabet,
                    transitions: h.transitions,
                    start_state: h.start_state,
                    accept_states: h.accept_states,
                    target_category: h.target_category,
                    error: None,
                }
            }
            None => LiveDfaState::error_marker(format!("Session {} not found", session_id)),
        };
        Ok(serde_json::to_string(&live)?)
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}
