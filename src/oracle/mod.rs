//! Oracle session driver
//!
//! Client half of an Angluin-style learning protocol:
//! - `session`: start a session, submit answers, track state
//! - `presenter`: decode query records for display
//! - `hypothesis`: live-state reconciliation for equivalence queries
//! - `convergence`: detect completion and summarise the learned model
//! - `runner`: loop a session against an oracle until it converges

pub mod convergence;
pub mod hypothesis;
pub mod presenter;
pub mod query;
pub mod runner;
pub mod session;

pub use convergence::{ConvergenceDetector, DisplayableSummary, FinalResult, Metrics};
pub use hypothesis::{reconcile, EffectiveHypothesis, Hypothesis, HypothesisSource, LiveDfaState};
pub use presenter::{present, RenderableQuery};
pub use query::{
    AnswerReply, EquivalenceAnswer, MembershipAnswer, OracleQuery, Progress, QueryPayload, RawQuery,
    StartReply,
};
pub use runner::{drive, DriveOutcome, DriveReport, Oracle, OracleReply, ScriptedOracle};
pub use session::{AnswerOutcome, OracleSession, SessionContext, SessionState, StartOutcome};
