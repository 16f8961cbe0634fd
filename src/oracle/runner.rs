//! Drive a session to convergence with an oracle
//!
//! The oracle is whoever answers the queries: a person at the terminal or a
//! script. The runner presents each query, hands it to the oracle, submits
//! the reply and re-prompts with the error when the learner rejects it.

use std::collections::VecDeque;
use tracing::{debug, info};

use crate::api::LearnerApi;
use crate::error::OracleError;
use crate::oracle::convergence::DisplayableSummary;
use crate::oracle::presenter::RenderableQuery;
use crate::oracle::session::OracleSession;

/// What the oracle wants to do with a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleReply {
    Answer(String),
    /// Re-fetch the live state and present the query again
    Refresh,
    /// Stop driving the session
    Abandon,
}

/// The answering party for membership and equivalence queries
pub trait Oracle {
    /// Reply to a query. `last_error` is set when the previous reply to the
    /// same query was not accepted.
    fn respond(&mut self, query: &RenderableQuery, last_error: Option<&OracleError>) -> OracleReply;

    /// Called before each submission
    fn submitting(&mut self, _query: &RenderableQuery, _response: &str) {}

    /// Called once the submission returned
    fn submitted(&mut self) {}
}

/// Answers from a fixed list, in order, then abandons
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    answers: VecDeque<String>,
}

impl ScriptedOracle {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma separated answer list, e.g. `true,false,correct`
    pub fn from_csv(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        )
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Oracle for ScriptedOracle {
    fn respond(&mut self, _query: &RenderableQuery, _last_error: Option<&OracleError>) -> OracleReply {
        match self.answers.pop_front() {
            Some(answer) => OracleReply::Answer(answer),
            None => OracleReply::Abandon,
        }
    }
}

/// How a drive ended
#[derive(Debug, Clone, PartialEq)]
pub enum DriveOutcome {
    Converged(Option<DisplayableSummary>),
    Abandoned,
}

/// Summary of a drive
#[derive(Debug, Clone, PartialEq)]
pub struct DriveReport {
    pub outcome: DriveOutcome,
    /// Answers the learner accepted
    pub accepted: usize,
    /// Answers the learner or the transport rejected
    pub rejected: usize,
}

/// Run the query loop until convergence or until the oracle gives up.
///
/// The session must already be started. Rejected answers are handed back
/// to the oracle with the error; a payload that cannot be decoded ends the
/// drive with `OracleError::Decode` since no answer can fix it.
pub async fn drive<A, O>(session: &OracleSession<A>, oracle: &mut O) -> Result<DriveReport, OracleError>
where
    A: LearnerApi + ?Sized,
    O: Oracle + ?Sized,
{
    let mut accepted = 0;
    let mut rejected = 0;
    let mut last_error: Option<OracleError> = None;

    loop {
        let ctx = session.context().await;
        if ctx.is_complete() {
            info!("Session converged after {} accepted answers", accepted);
            return Ok(DriveReport {
                outcome: DriveOutcome::Converged(ctx.summary),
                accepted,
                rejected,
            });
        }

        let Some(query) = session.render_current().await? else {
            return Err(OracleError::NoOutstandingQuery);
        };

        let response = match oracle.respond(&query, last_error.as_ref()) {
            OracleReply::Answer(response) => response,
            OracleReply::Refresh => continue,
            OracleReply::Abandon => {
                debug!("Oracle abandoned the session at query {}", query.id());
                return Ok(DriveReport {
                    outcome: DriveOutcome::Abandoned,
                    accepted,
                    rejected,
                });
            }
        };

        oracle.submitting(&query, &response);
        let result = session.answer(&response).await;
        oracle.submitted();

        match result {
            Ok(_) => {
                accepted += 1;
                last_error = None;
            }
            Err(e) if e.keeps_query() => {
                rejected += 1;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_csv_skips_blanks() {
        let oracle = ScriptedOracle::from_csv("true, false,,correct ");
        assert_eq!(oracle.remaining(), 3);
    }

    #[test]
    fn test_scripted_oracle_abandons_when_empty() {
        let mut oracle = ScriptedOracle::new(["true"]);
        let query = RenderableQuery::Membership {
            id: crate::types::QueryId(1),
            question: "Is a Margherita Pizza a Pizza?".into(),
            category: "Pizza".into(),
            examples: Default::default(),
            progress: Default::default(),
        };
        assert_eq!(oracle.respond(&query, None), OracleReply::Answer("true".into()));
        assert_eq!(oracle.respond(&query, None), OracleReply::Abandon);
    }
}
