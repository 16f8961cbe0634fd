//! Oracle session driven against the offline learner

use angluin_lab::api::offline::OfflineLearner;
use angluin_lab::api::{LearnerApi, TransportError};
use angluin_lab::oracle::{
    drive, DriveOutcome, Hypothesis, HypothesisSource, OracleSession, QueryPayload, RawQuery, RenderableQuery,
    ScriptedOracle, SessionState,
};
use angluin_lab::{OracleError, QueryKind, SessionId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

const PIZZAS: &[&str] = &["Margherita Pizza", "Pepperoni Pizza", "Hawaiian Pizza", "Four Cheese Pizza"];

/// Truthful membership answer for a decoded query
fn truthful(query: &RawQuery) -> String {
    match query.decode().unwrap().payload {
        QueryPayload::Membership(p) => {
            let is_pizza = PIZZAS.iter().any(|name| p.question.contains(name));
            is_pizza.to_string()
        }
        QueryPayload::Equivalence(_) => "correct".to_string(),
    }
}

#[tokio::test]
async fn test_food_categorization_end_to_end() {
    let session = OracleSession::new(Arc::new(OfflineLearner::new()));

    let started = session.start("Food Categorization").await.unwrap();
    assert_eq!(started.session_id, SessionId(1));
    let first = started.current_query.unwrap();
    assert_eq!(first.kind(), Some(QueryKind::Membership));
    match first.decode().unwrap().payload {
        QueryPayload::Membership(p) => assert_eq!(p.question, "Is a Margherita Pizza a Pizza?"),
        other => panic!("expected a membership query, got {other:?}"),
    }

    let outcome = session.answer("true").await.unwrap();
    let next = outcome.next_query.unwrap().decode().unwrap();
    assert_eq!(next.progress().membership_queries, 1);

    let mut steps = 0;
    while session.state().await != SessionState::Complete {
        let query = session.current_query().await.unwrap();
        session.answer(&truthful(&query)).await.unwrap();
        steps += 1;
        assert!(steps < 20, "session did not converge");
    }

    let ctx = session.context().await;
    let result = ctx.final_result.unwrap();
    assert!(!result.states.is_empty());
    let learned = Hypothesis {
        states: result.states.clone(),
        start_state: result.start_state.clone(),
        accept_states: result.accept_states.clone(),
        ..Default::default()
    };
    assert!(learned.is_well_formed());
    assert_eq!(result.accept_states, vec!["q1".to_string()]);
    assert_eq!(result.metrics.unwrap().accuracy, 1.0);
    assert!(ctx.current_query.is_none());
}

#[tokio::test]
async fn test_progress_stays_within_budget() {
    let session = OracleSession::new(Arc::new(OfflineLearner::new()));
    session.start("Food Categorization").await.unwrap();

    let mut answers = 0;
    while session.state().await != SessionState::Complete {
        let ctx = session.context().await;
        assert_eq!(ctx.outstanding_queries(), 1);
        let progress = ctx.progress.unwrap();
        assert!(progress.within_limits(), "progress exceeded budget: {progress}");

        session.answer("false").await.unwrap();
        answers += 1;
        assert!(answers <= 11, "more answers than the 8 + 3 budget allows");
    }

    assert_eq!(answers, 11);
    let ctx = session.context().await;
    assert_eq!(ctx.outstanding_queries(), 0);
    assert!(ctx.final_result.unwrap().accept_states.is_empty());
    assert_eq!(ctx.summary.unwrap().accept_states_label(), "None");
}

#[tokio::test]
async fn test_convergence_fires_exactly_once() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let session = OracleSession::with_convergence_hook(
        Arc::new(OfflineLearner::new()),
        Box::new(move |_summary| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    session.start("Food Categorization").await.unwrap();

    let mut completing_calls = 0;
    for answer in ["true", "false", "true", "false", "correct"] {
        let outcome = session.answer(answer).await.unwrap();
        if outcome.summary.is_some() {
            completing_calls += 1;
            assert!(outcome.is_complete);
        }
    }
    assert_eq!(completing_calls, 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    assert_eq!(session.answer("true").await.unwrap_err(), OracleError::NoOutstandingQuery);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_answer_keeps_the_query() {
    let session = OracleSession::new(Arc::new(OfflineLearner::new()));
    session.start("Food Categorization").await.unwrap();
    for answer in ["true", "false", "true", "false"] {
        session.answer(answer).await.unwrap();
    }

    let before = session.current_query().await.unwrap();
    assert_eq!(before.kind(), Some(QueryKind::Equivalence));

    let err = session.answer("Hot Dog").await.unwrap_err();
    assert!(matches!(err, OracleError::Logical(_)));
    assert_eq!(session.current_query().await.unwrap(), before);
    assert_eq!(session.state().await, SessionState::AwaitingAnswer);
    assert_eq!(session.context().await.last_error, Some(err));

    let outcome = session.answer("Caesar Salad").await.unwrap();
    assert!(!outcome.is_complete);
    assert!(session.context().await.last_error.is_none());
}

#[tokio::test]
async fn test_equivalence_query_uses_live_structure() {
    let session = OracleSession::new(Arc::new(OfflineLearner::new()));
    session.start("Food Categorization").await.unwrap();
    for answer in ["true", "false", "true", "false"] {
        session.answer(answer).await.unwrap();
    }

    match session.render_current().await.unwrap().unwrap() {
        RenderableQuery::Equivalence { hypothesis, progress, .. } => {
            assert_eq!(hypothesis.source, HypothesisSource::Live);
            assert_eq!(hypothesis.hypothesis.target_category, "Pizza");
            assert_eq!(hypothesis.hypothesis.alphabet.len(), 4);
            assert_eq!(progress.membership_queries, 4);
            assert!(hypothesis.hypothesis.is_well_formed());
            assert!(hypothesis.hypothesis.accepts(&["Margherita Pizza"]));
            assert!(!hypothesis.hypothesis.accepts(&["Caesar Salad"]));
        }
        other => panic!("expected an equivalence query, got {other:?}"),
    }

    session.set_live_refresh(false);
    match session.render_current().await.unwrap().unwrap() {
        RenderableQuery::Equivalence { hypothesis, .. } => {
            assert_eq!(hypothesis.source, HypothesisSource::Payload);
        }
        other => panic!("expected an equivalence query, got {other:?}"),
    }
}

#[tokio::test]
async fn test_drive_with_scripted_oracle() {
    let session = OracleSession::new(Arc::new(OfflineLearner::new()));
    session.start("Food Categorization").await.unwrap();

    let mut oracle = ScriptedOracle::from_csv("true, maybe, false, true, false, correct");
    let report = drive(&session, &mut oracle).await.unwrap();

    assert_eq!(report.accepted, 5);
    assert_eq!(report.rejected, 1);
    match report.outcome {
        DriveOutcome::Converged(Some(summary)) => {
            assert_eq!(summary.accept_states_label(), "q1");
            assert_eq!(summary.start_state, "q0");
        }
        other => panic!("expected convergence, got {other:?}"),
    }
}

#[tokio::test]
async fn test_drive_abandons_when_answers_run_out() {
    let session = OracleSession::new(Arc::new(OfflineLearner::new()));
    session.start("Food Categorization").await.unwrap();

    let report = drive(&session, &mut ScriptedOracle::from_csv("true,false")).await.unwrap();
    assert_eq!(report.outcome, DriveOutcome::Abandoned);
    assert_eq!(report.accepted, 2);
    assert_eq!(session.state().await, SessionState::AwaitingAnswer);
}

/// Holds every answer, and optionally every start, until the test releases it
struct GatedLearner {
    inner: OfflineLearner,
    gate_starts: bool,
    started: AtomicUsize,
    entered: Notify,
    release: Notify,
}

impl GatedLearner {
    fn new(gate_starts: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: OfflineLearner::new(),
            gate_starts,
            started: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    async fn hold(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[async_trait]
impl LearnerApi for GatedLearner {
    async fn start_learning(&self, session_name: &str) -> Result<String, TransportError> {
        if self.gate_starts {
            self.hold().await;
        }
        self.started.fetch_add(1, Ordering::SeqCst);
        self.inner.start_learning(session_name).await
    }

    async fn answer_query(&self, session_id: SessionId, response: &str) -> Result<String, TransportError> {
        self.hold().await;
        self.inner.answer_query(session_id, response).await
    }

    async fn current_dfa_state(&self, session_id: SessionId) -> Result<String, TransportError> {
        self.inner.current_dfa_state(session_id).await
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[tokio::test]
async fn test_concurrent_answer_is_busy() {
    let learner = GatedLearner::new(false);
    let session = Arc::new(OracleSession::new(learner.clone()));
    session.start("Food Categorization").await.unwrap();
    let before = session.current_query().await.unwrap();

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.answer("true").await }
    });
    learner.entered.notified().await;

    assert_eq!(session.answer("false").await.unwrap_err(), OracleError::Busy);
    assert_eq!(session.state().await, SessionState::Submitting);

    learner.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_ne!(outcome.next_query.unwrap(), before);
    assert_eq!(session.context().await.answered.len(), 1);
}

#[tokio::test]
async fn test_reset_allows_a_new_session() {
    let session = OracleSession::new(Arc::new(OfflineLearner::new()));
    session.start("Food Categorization").await.unwrap();
    assert_eq!(
        session.start("Food Categorization").await.unwrap_err(),
        OracleError::AlreadyStarted
    );

    session.reset().await.unwrap();
    let again = session.start("Food Categorization").await.unwrap();
    assert_eq!(again.session_id, SessionId(2));
}

#[tokio::test]
async fn test_reset_during_answer_is_busy() {
    let learner = GatedLearner::new(false);
    let session = Arc::new(OracleSession::new(learner.clone()));
    session.start("Food Categorization").await.unwrap();

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.answer("true").await }
    });
    learner.entered.notified().await;

    assert_eq!(session.reset().await.unwrap_err(), OracleError::Busy);
    assert_eq!(session.session_id().await, Some(SessionId(1)));

    learner.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(outcome.next_query.is_some());

    // the answer landed in the original session, which is still usable
    let ctx = session.context().await;
    assert_eq!(ctx.state, SessionState::AwaitingAnswer);
    assert_eq!(ctx.answered.len(), 1);
    assert_eq!(ctx.outstanding_queries(), 1);

    session.reset().await.unwrap();
    assert_eq!(session.state().await, SessionState::NotStarted);
    let again = session.start("Food Categorization").await.unwrap();
    assert_eq!(again.session_id, SessionId(2));
}

#[tokio::test]
async fn test_concurrent_start_is_busy() {
    let learner = GatedLearner::new(true);
    let session = Arc::new(OracleSession::new(learner.clone()));

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.start("Food Categorization").await }
    });
    learner.entered.notified().await;

    assert_eq!(
        session.start("Food Categorization").await.unwrap_err(),
        OracleError::Busy
    );
    assert_eq!(session.reset().await.unwrap_err(), OracleError::Busy);

    learner.release.notify_one();
    let started = first.await.unwrap().unwrap();
    assert_eq!(started.session_id, SessionId(1));
    assert_eq!(learner.started.load(Ordering::SeqCst), 1);
    assert_eq!(session.session_id().await, Some(SessionId(1)));
    assert_eq!(
        session.start("Food Categorization").await.unwrap_err(),
        OracleError::AlreadyStarted
    );
}
