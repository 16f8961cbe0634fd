//! Oracle session driver
//!
//! Owns one learning session on the remote learner and walks it through
//! the protocol: start, present the outstanding query, submit the oracle's
//! answer, repeat until the learner reports convergence.
//!
//! ```text
//! NotStarted --start--> AwaitingAnswer | Complete | Errored
//! AwaitingAnswer --answer--> Submitting --> AwaitingAnswer | Complete
//! ```
//!
//! At most one query is outstanding. `start`, `answer` and `reset` share an
//! in-flight flag so overlapping calls are rejected, never interleaved. The
//! context lock is never held across a remote call, which keeps live-state
//! polling free to run alongside a submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::LearnerApi;
use crate::error::OracleError;
use crate::oracle::convergence::{ConvergenceDetector, ConvergenceHook, DisplayableSummary, FinalResult};
use crate::oracle::hypothesis::LiveDfaState;
use crate::oracle::presenter::{present, RenderableQuery};
use crate::oracle::query::{AnswerReply, MembershipAnswer, Progress, RawQuery, StartReply};
use crate::types::{QueryId, QueryKind, SessionId, SessionStatus};

/// Where a session is in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    AwaitingAnswer,
    Submitting,
    Complete,
    Errored,
}

/// A query that was answered and accepted by the learner
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredQuery {
    pub query_id: QueryId,
    pub query_type: String,
    pub response: String,
}

/// Everything the client knows about its session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Option<SessionId>,
    pub name: String,
    pub state: SessionState,
    pub current_query: Option<RawQuery>,
    pub final_result: Option<FinalResult>,
    pub summary: Option<DisplayableSummary>,
    pub last_error: Option<OracleError>,
    /// Last progress counters decoded from a query
    pub progress: Option<Progress>,
    pub answered: Vec<AnsweredQuery>,
}

impl SessionContext {
    fn new() -> Self {
        Self {
            session_id: None,
            name: String::new(),
            state: SessionState::NotStarted,
            current_query: None,
            final_result: None,
            summary: None,
            last_error: None,
            progress: None,
            answered: Vec::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.state == SessionState::Complete {
            SessionStatus::Complete
        } else {
            SessionStatus::Active
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }

    /// Count of outstanding queries, zero or one
    pub fn outstanding_queries(&self) -> usize {
        usize::from(self.current_query.is_some())
    }

    fn adopt_query(&mut self, query: RawQuery) {
        if let Ok(decoded) = query.decode() {
            self.progress = Some(decoded.progress());
        }
        self.current_query = Some(query);
        self.state = SessionState::AwaitingAnswer;
    }
}

/// Result of a successful `start`
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    pub session_id: SessionId,
    pub current_query: Option<RawQuery>,
    pub is_complete: bool,
    pub final_result: Option<FinalResult>,
}

/// Result of an accepted answer
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub next_query: Option<RawQuery>,
    pub is_complete: bool,
    pub final_result: Option<FinalResult>,
    /// Set only on the answer that completed the session
    pub summary: Option<DisplayableSummary>,
}

/// Clears the in-flight flag however `answer` returns
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Client-side driver for one learning session
pub struct OracleSession<A: LearnerApi + ?Sized> {
    api: Arc<A>,
    context: Mutex<SessionContext>,
    detector: Mutex<ConvergenceDetector>,
    in_flight: AtomicBool,
    live_refresh: AtomicBool,
}

impl<A: LearnerApi + ?Sized> OracleSession<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            context: Mutex::new(SessionContext::new()),
            detector: Mutex::new(ConvergenceDetector::new()),
            in_flight: AtomicBool::new(false),
            live_refresh: AtomicBool::new(true),
        }
    }

    /// Register a callback invoked once when the session converges
    pub fn with_convergence_hook(api: Arc<A>, hook: ConvergenceHook) -> Self {
        Self {
            api,
            context: Mutex::new(SessionContext::new()),
            detector: Mutex::new(ConvergenceDetector::with_hook(hook)),
            in_flight: AtomicBool::new(false),
            live_refresh: AtomicBool::new(true),
        }
    }

    /// Turn the live hypothesis fetch for equivalence queries on or off
    pub fn set_live_refresh(&self, enabled: bool) {
        self.live_refresh.store(enabled, Ordering::Relaxed);
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Snapshot of the session context
    pub async fn context(&self) -> SessionContext {
        self.context.lock().await.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.context.lock().await.state
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.context.lock().await.session_id
    }

    pub async fn current_query(&self) -> Option<RawQuery> {
        self.context.lock().await.current_query.clone()
    }

    /// Start a new session on the learner. Every call creates a new remote session.
    pub async fn start(&self, session_name: &str) -> Result<StartOutcome, OracleError> {
        let _guard = self.claim()?;
        {
            let mut ctx = self.context.lock().await;
            if ctx.state != SessionState::NotStarted {
                return Err(OracleError::AlreadyStarted);
            }
            ctx.name = session_name.to_string();
        }
        if session_name.trim().is_empty() {
            warn!("Starting a learning session with an empty name");
        }

        info!("Starting learning session '{}' via {}", session_name, self.api.name());
        let reply = match self.api.start_learning(session_name).await {
            Ok(text) => serde_json::from_str::<StartReply>(&text)
                .map_err(|e| OracleError::StartFailed(format!("malformed start payload: {}", e))),
            Err(e) => Err(OracleError::StartFailed(e.to_string())),
        };

        let mut ctx = self.context.lock().await;
        let reply = match reply {
            Ok(reply) if !reply.is_complete && reply.current_query.is_none() => Err(OracleError::StartFailed(
                "learner returned neither a query nor a final result".to_string(),
            )),
            other => other,
        };
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Learning session failed to start: {}", e);
                ctx.state = SessionState::Errored;
                ctx.last_error = Some(e.clone());
                return Err(e);
            }
        };

        ctx.session_id = Some(reply.session_id);
        ctx.last_error = None;
        if reply.is_complete {
            ctx.state = SessionState::Complete;
            ctx.current_query = None;
            ctx.final_result = reply.final_result.clone();
            ctx.summary = self
                .detector
                .lock()
                .await
                .observe(true, reply.final_result.as_ref());
        } else if let Some(query) = reply.current_query.clone() {
            ctx.adopt_query(query);
        }
        info!("Learning session {} started ({:?})", reply.session_id, ctx.state);

        Ok(StartOutcome {
            session_id: reply.session_id,
            current_query: reply.current_query,
            is_complete: reply.is_complete,
            final_result: reply.final_result,
        })
    }

    /// Submit the oracle's answer to the outstanding query.
    ///
    /// The response is passed through verbatim. On any error the outstanding
    /// query stays as it was and can be answered again.
    pub async fn answer(&self, response: &str) -> Result<AnswerOutcome, OracleError> {
        let _guard = self.claim()?;

        let (session_id, query) = {
            let mut ctx = self.context.lock().await;
            match (ctx.state, ctx.session_id, ctx.current_query.clone()) {
                (SessionState::AwaitingAnswer, Some(id), Some(query)) => {
                    ctx.state = SessionState::Submitting;
                    (id, query)
                }
                _ => return Err(OracleError::NoOutstandingQuery),
            }
        };

        if query.kind() == Some(QueryKind::Membership) && !MembershipAnswer::is_canonical(response) {
            debug!("Passing non-canonical membership answer '{}' through to the learner", response);
        }
        debug!("Answering query {} of session {} with '{}'", query.id, session_id, response);

        let result = match self.api.answer_query(session_id, response).await {
            Ok(text) => serde_json::from_str::<AnswerReply>(&text)
                .map_err(|e| OracleError::Decode(format!("answer reply: {}", e))),
            Err(e) => Err(OracleError::SubmitFailed(e.to_string())),
        };

        let mut ctx = self.context.lock().await;
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => return Err(Self::restore(&mut ctx, e)),
        };
        if let Some(message) = reply.error {
            return Err(Self::restore(&mut ctx, OracleError::Logical(message)));
        }
        if !reply.is_complete && reply.next_query.is_none() {
            return Err(Self::restore(
                &mut ctx,
                OracleError::Decode("learner returned neither a next query nor completion".to_string()),
            ));
        }

        ctx.answered.push(AnsweredQuery {
            query_id: query.id,
            query_type: query.query_type.clone(),
            response: response.to_string(),
        });
        ctx.last_error = None;

        let mut summary = None;
        if reply.is_complete {
            ctx.state = SessionState::Complete;
            ctx.current_query = None;
            ctx.final_result = reply.final_result.clone();
            summary = self
                .detector
                .lock()
                .await
                .observe(true, reply.final_result.as_ref());
            if summary.is_none() {
                warn!("Session {} completed without a final result", session_id);
            }
            ctx.summary = summary.clone();
            info!("Learning session {} converged after {} answers", session_id, ctx.answered.len());
        } else if let Some(next) = reply.next_query.clone() {
            ctx.adopt_query(next);
            if let Some(progress) = ctx.progress {
                if progress.is_exhausted() {
                    debug!("Query budget spent ({}), waiting on the learner to converge", progress);
                }
            }
        }

        Ok(AnswerOutcome {
            next_query: reply.next_query,
            is_complete: reply.is_complete,
            final_result: reply.final_result,
            summary,
        })
    }

    /// Take the in-flight flag for the duration of a remote exchange
    fn claim(&self) -> Result<InFlight<'_>, OracleError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rejected call while another is in flight");
            return Err(OracleError::Busy);
        }
        Ok(InFlight(&self.in_flight))
    }

    /// Put the session back to awaiting the same query and record the error
    fn restore(ctx: &mut SessionContext, error: OracleError) -> OracleError {
        warn!("Answer not accepted: {}", error);
        ctx.state = SessionState::AwaitingAnswer;
        ctx.last_error = Some(error.clone());
        error
    }

    /// Fetch the learner's live hypothesis.
    ///
    /// Read-only and safe to poll. Transport and decode failures degrade to
    /// `None` so presentation falls back to the query's own hypothesis.
    pub async fn live_state(&self) -> Option<LiveDfaState> {
        let session_id = self.session_id().await?;
        match self.api.current_dfa_state(session_id).await {
            Ok(text) => match LiveDfaState::decode(&text) {
                Ok(live) => {
                    if let Some(marker) = &live.error {
                        debug!("Live DFA state for session {} reports: {}", session_id, marker);
                    }
                    Some(live)
                }
                Err(e) => {
                    warn!("Ignoring live DFA state: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Could not fetch live DFA state: {}", e);
                None
            }
        }
    }

    /// Present the outstanding query, reconciling equivalence hypotheses
    /// against a fresh live snapshot. `Ok(None)` when nothing is outstanding.
    pub async fn render_current(&self) -> Result<Option<RenderableQuery>, OracleError> {
        let Some(query) = self.current_query().await else {
            return Ok(None);
        };
        let live = match query.kind() {
            Some(QueryKind::Equivalence) if self.live_refresh.load(Ordering::Relaxed) => {
                self.live_state().await
            }
            _ => None,
        };
        match present(&query, live.as_ref()) {
            Ok(rendered) => Ok(Some(rendered)),
            Err(e) => {
                self.context.lock().await.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Abandon the session client-side so `start` can be called again.
    ///
    /// Refused with `Busy` while a start or a submission is in flight.
    pub async fn reset(&self) -> Result<(), OracleError> {
        let _guard = self.claim()?;
        let mut ctx = self.context.lock().await;
        if let Some(id) = ctx.session_id {
            info!("Abandoning learning session {}", id);
        }
        *ctx = SessionContext::new();
        self.detector.lock().await.reset();
        Ok(())
    }
}
