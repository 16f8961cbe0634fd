//! Convergence detection and the final learned-model summary

use serde::{Deserialize, Serialize};

/// Final learned model, produced once when the session completes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub accept_states: Vec<String>,
    #[serde(default)]
    pub start_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Fraction of items classified correctly, 0.0 to 1.0
    pub accuracy: f64,
    pub total_queries: u32,
    pub correct_predictions: u32,
}

/// What gets shown to the user once learning converges
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayableSummary {
    pub states: Vec<String>,
    pub accept_states: Vec<String>,
    pub start_state: String,
    pub metrics: Option<Metrics>,
}

impl DisplayableSummary {
    /// Accept states joined for display, "None" when there are none
    pub fn accept_states_label(&self) -> String {
        if self.accept_states.is_empty() {
            "None".to_string()
        } else {
            self.accept_states.join(", ")
        }
    }
}

impl std::fmt::Display for DisplayableSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Learning converged")?;
        writeln!(f, "  States:        {}", self.states.join(", "))?;
        writeln!(f, "  Start state:   {}", self.start_state)?;
        write!(f, "  Accept states: {}", self.accept_states_label())?;
        if let Some(m) = &self.metrics {
            writeln!(f)?;
            writeln!(f, "  Accuracy:            {:.1}%", m.accuracy * 100.0)?;
            writeln!(f, "  Total queries:       {}", m.total_queries)?;
            write!(f, "  Correct predictions: {}", m.correct_predictions)?;
        }
        Ok(())
    }
}

/// Build the summary for a final result
pub fn on_complete(result: &FinalResult) -> DisplayableSummary {
    DisplayableSummary {
        states: result.states.clone(),
        accept_states: result.accept_states.clone(),
        start_state: result.start_state.clone(),
        metrics: result.metrics,
    }
}

/// Callback invoked once when a session converges
pub type ConvergenceHook = Box<dyn Fn(&DisplayableSummary) + Send + Sync>;

/// Fires once per session, on the first complete observation
#[derive(Default)]
pub struct ConvergenceDetector {
    fired: bool,
    hook: Option<ConvergenceHook>,
}

impl ConvergenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: ConvergenceHook) -> Self {
        Self {
            fired: false,
            hook: Some(hook),
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Observe the completion flag after a learner reply.
    ///
    /// Returns the summary only on the false -> true transition, and only
    /// when the learner supplied a final result.
    pub fn observe(&mut self, is_complete: bool, result: Option<&FinalResult>) -> Option<DisplayableSummary> {
        if self.fired || !is_complete {
            return None;
        }
        let result = result?;
        self.fired = true;

        let summary = on_complete(result);
        if let Some(hook) = &self.hook {
            hook(&summary);
        }
        Some(summary)
    }

    /// Forget that the detector fired, for a restarted session
    pub fn reset(&mut self) {
        self.fired = false;
    }
}

impl std::fmt::Debug for ConvergenceDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvergenceDetector")
            .field("fired", &self.fired)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
