//! Turn raw query records into something a user can answer

use std::collections::BTreeMap;

use crate::error::OracleError;
use crate::oracle::hypothesis::{reconcile, EffectiveHypothesis, HypothesisSource, LiveDfaState};
use crate::oracle::query::{EquivalenceGuidance, Progress, QueryPayload, RawQuery};
use crate::types::{QueryId, QueryKind};

/// A decoded query, with the equivalence hypothesis already reconciled
#[derive(Debug, Clone, PartialEq)]
pub enum RenderableQuery {
    Membership {
        id: QueryId,
        question: String,
        category: String,
        examples: BTreeMap<String, String>,
        progress: Progress,
    },
    Equivalence {
        id: QueryId,
        instruction: String,
        hypothesis: EffectiveHypothesis,
        guidance: EquivalenceGuidance,
        progress: Progress,
    },
}

impl RenderableQuery {
    pub fn id(&self) -> QueryId {
        match self {
            RenderableQuery::Membership { id, .. } | RenderableQuery::Equivalence { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            RenderableQuery::Membership { .. } => QueryKind::Membership,
            RenderableQuery::Equivalence { .. } => QueryKind::Equivalence,
        }
    }

    pub fn progress(&self) -> Progress {
        match self {
            RenderableQuery::Membership { progress, .. } | RenderableQuery::Equivalence { progress, .. } => *progress,
        }
    }
}

/// Decode a query for display.
///
/// Membership payloads are shown as-is. Equivalence payloads get their
/// hypothesis structure from `live` when it is usable.
pub fn present(query: &RawQuery, live: Option<&LiveDfaState>) -> Result<RenderableQuery, OracleError> {
    let decoded = query.decode()?;

    Ok(match decoded.payload {
        QueryPayload::Membership(p) => RenderableQuery::Membership {
            id: decoded.id,
            question: p.question,
            category: p.category,
            examples: p.examples,
            progress: p.progress,
        },
        QueryPayload::Equivalence(p) => RenderableQuery::Equivalence {
            id: decoded.id,
            instruction: p.instruction,
            hypothesis: reconcile(&p.hypothesis, live),
            guidance: p.examples,
            progress: p.progress,
        },
    })
}

impl std::fmt::Display for RenderableQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} #{}  ({})", self.kind(), self.id(), self.progress())?;
        match self {
            RenderableQuery::Membership { question, category, examples, .. } => {
                write!(f, "  {}", question)?;
                if !category.is_empty() {
                    write!(f, "\n  Category: {}", category)?;
                }
                for (label, text) in examples {
                    write!(f, "\n    {}: {}", label, text)?;
                }
            }
            RenderableQuery::Equivalence { instruction, hypothesis, guidance, .. } => {
                if !instruction.is_empty() {
                    writeln!(f, "  {}", instruction)?;
                }
                let h = &hypothesis.hypothesis;
                let origin = match hypothesis.source {
                    HypothesisSource::Live => "live",
                    HypothesisSource::Payload => "from query",
                };
                writeln!(f, "  Hypothesis ({}) for '{}':", origin, h.target_category)?;
                writeln!(f, "    States:   {}", h.states.join(", "))?;
                writeln!(f, "    Alphabet: {}", h.alphabet.join(", "))?;
                writeln!(f, "    Start:    {}", h.start_state)?;
                let accept = if h.accept_states.is_empty() {
                    "None".to_string()
                } else {
                    h.accept_states.join(", ")
                };
                write!(f, "    Accept:   {}", accept)?;
                for (from, symbol, to) in h.edges() {
                    write!(f, "\n    {} --{}--> {}", from, symbol, to)?;
                }
                if !guidance.correct.is_empty() {
                    write!(f, "\n  If correct: {}", guidance.correct)?;
                }
                if !guidance.counterexample.is_empty() {
                    write!(f, "\n  Otherwise: {}", guidance.counterexample)?;
                }
            }
        }
        Ok(())
    }
}
