//! Hypothesis automata and live-state reconciliation
//!
//! An equivalence query embeds the hypothesis the learner held when the
//! query was generated. The learner may have moved on since, so the live
//! DFA snapshot wins for structure while the query keeps its own target
//! category and instructional text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::OracleError;

/// state -> (symbol -> next state)
pub type Transitions = BTreeMap<String, BTreeMap<String, String>>;

/// Candidate automaton for the target concept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hypothesis {
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub alphabet: Vec<String>,
    #[serde(default)]
    pub transitions: Transitions,
    #[serde(default)]
    pub start_state: String,
    #[serde(default)]
    pub accept_states: Vec<String>,
    #[serde(default)]
    pub target_category: String,
}

impl Hypothesis {
    /// Accept states are a subset of states and the start state is known
    pub fn is_well_formed(&self) -> bool {
        let known = |s: &String| self.states.contains(s);
        (self.start_state.is_empty() || known(&self.start_state))
            && self.accept_states.iter().all(known)
    }

    /// Run the automaton over a word. Missing transitions reject.
    pub fn accepts<S: AsRef<str>>(&self, word: &[S]) -> bool {
        let mut state = self.start_state.as_str();
        for symbol in word {
            match self
                .transitions
                .get(state)
                .and_then(|edges| edges.get(symbol.as_ref()))
            {
                Some(next) => state = next.as_str(),
                None => return false,
            }
        }
        self.accept_states.iter().any(|s| s == state)
    }

    /// Transitions flattened to `(from, symbol, to)` in a stable order
    pub fn edges(&self) -> Vec<(&str, &str, &str)> {
        self.transitions
            .iter()
            .flat_map(|(from, edges)| {
                edges
                    .iter()
                    .map(move |(symbol, to)| (from.as_str(), symbol.as_str(), to.as_str()))
            })
            .collect()
    }
}

/// Snapshot of the learner's current hypothesis, fetched separately
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDfaState {
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub alphabet: Vec<String>,
    #[serde(default)]
    pub transitions: Transitions,
    #[serde(default)]
    pub start_state: String,
    #[serde(default)]
    pub accept_states: Vec<String>,
    #[serde(default)]
    pub target_category: String,
    /// Set by the learner when it could not produce a snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LiveDfaState {
    pub fn decode(text: &str) -> Result<Self, OracleError> {
        serde_json::from_str(text).map_err(|e| OracleError::Decode(format!("live DFA state: {}", e)))
    }

    /// An error marker makes the snapshot unusable
    pub fn is_usable(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_marker(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Where the structural fields of an effective hypothesis came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypothesisSource {
    Payload,
    Live,
}

/// Hypothesis to show for an equivalence query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveHypothesis {
    pub hypothesis: Hypothesis,
    pub source: HypothesisSource,
}

/// Merge the query's hypothesis with the live snapshot.
///
/// Live wins for states, alphabet, transitions, start and accept states.
/// The payload keeps its target category. A missing or errored snapshot
/// leaves the payload hypothesis untouched.
pub fn reconcile(payload: &Hypothesis, live: Option<&LiveDfaState>) -> EffectiveHypothesis {
    match live {
        Some(live) if live.is_usable() => EffectiveHypothesis {
            hypothesis: Hypothesis {
                states: live.states.clone(),
                alphabet: live.alphabet.clone(),
                transitions: live.transitions.clone(),
                start_state: live.start_state.clone(),
                accept_states: live.accept_states.clone(),
                target_category: payload.target_category.clone(),
            },
            source: HypothesisSource::Live,
        },
        _ => EffectiveHypothesis {
            hypothesis: payload.clone(),
            source: HypothesisSource::Payload,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str, &str)]) -> Transitions {
        let mut transitions = Transitions::new();
        for (from, symbol, to) in pairs {
            transitions
                .entry(from.to_string())
                .or_default()
                .insert(symbol.to_string(), to.to_string());
        }
        transitions
    }

    fn payload_hypothesis() -> Hypothesis {
        Hypothesis {
            states: vec!["q0".into(), "q1".into()],
            alphabet: vec!["pizza".into()],
            transitions: edges(&[("q0", "pizza", "q1")]),
            start_state: "q0".into(),
            accept_states: vec!["q1".into()],
            target_category: "Pizza".into(),
        }
    }

    fn live_state() -> LiveDfaState {
        LiveDfaState {
            states: vec!["q0".into(), "q1".into(), "q2".into()],
            alphabet: vec!["pizza".into(), "salad".into()],
            transitions: edges(&[("q0", "pizza", "q1"), ("q0", "salad", "q2")]),
            start_state: "q0".into(),
            accept_states: vec!["q1".into()],
            target_category: "Salad".into(),
            error: None,
        }
    }

    #[test]
    fn test_live_state_wins_for_structure() {
        let live = live_state();
        let effective = reconcile(&payload_hypothesis(), Some(&live));

        assert_eq!(effective.source, HypothesisSource::Live);
        assert_eq!(effective.hypothesis.states, live.states);
        assert_eq!(effective.hypothesis.alphabet, live.alphabet);
        assert_eq!(effective.hypothesis.transitions, live.transitions);
        assert_eq!(effective.hypothesis.start_state, live.start_state);
        assert_eq!(effective.hypothesis.accept_states, live.accept_states);
        // the query's own category is never overwritten
        assert_eq!(effective.hypothesis.target_category, "Pizza");
    }

    #[test]
    fn test_error_marker_falls_back_to_payload() {
        let payload = payload_hypothesis();
        let effective = reconcile(&payload, Some(&LiveDfaState::error_marker("Session not found")));
        assert_eq!(effective.source, HypothesisSource::Payload);
        assert_eq!(effective.hypothesis, payload);
    }

    #[test]
    fn test_missing_live_state_falls_back_to_payload() {
        let payload = payload_hypothesis();
        assert_eq!(reconcile(&payload, None).hypothesis, payload);
    }

    #[test]
    fn test_accepts_runs_the_automaton() {
        let h = live_state();
        let hypothesis = reconcile(&payload_hypothesis(), Some(&h)).hypothesis;
        assert!(hypothesis.accepts(&["pizza"]));
        assert!(!hypothesis.accepts(&["salad"]));
        assert!(!hypothesis.accepts(&["pizza", "pizza"]));
    }

    #[test]
    fn test_well_formed() {
        let mut h = payload_hypothesis();
        assert!(h.is_well_formed());
        h.accept_states.push("q9".into());
        assert!(!h.is_well_formed());
    }

    #[test]
    fn test_decode_live_state_with_error_marker() {
        let live = LiveDfaState::decode(r#"{"error": "Internal server error"}"#).unwrap();
        assert!(!live.is_usable());
        assert!(matches!(LiveDfaState::decode("<html>"), Err(OracleError::Decode(_))));
    }
}
