use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use handsight_contracts::results::{parse_result, AnalysisResult};
use handsight_contracts::uploads::SelectedFile;
use serde_json::json;

use crate::controller::AnalysisOutcome;
use crate::errors::RequestError;
use crate::transport::AnalysisTransport;

/// Transport whose calls block until the test resolves them by call index
/// (0-based, in the order `analyze` was entered).
pub(crate) struct ScriptedTransport {
    calls: AtomicUsize,
    outcomes: Mutex<HashMap<usize, AnalysisOutcome>>,
    ready: Condvar,
    digests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcomes: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
            digests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn resolve(&self, call: usize, outcome: AnalysisOutcome) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.insert(call, outcome);
        }
        self.ready.notify_all();
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn digests(&self) -> Vec<String> {
        self.digests
            .lock()
            .map(|digests| digests.clone())
            .unwrap_or_default()
    }
}

impl AnalysisTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn analyze(&self, file: &SelectedFile) -> Result<AnalysisResult, RequestError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut digests) = self.digests.lock() {
            digests.push(file.digest());
        }
        let Ok(mut outcomes) = self.outcomes.lock() else {
            return Err(RequestError::network("scripted transport poisoned"));
        };
        loop {
            if let Some(outcome) = outcomes.remove(&call) {
                return outcome;
            }
            outcomes = match self.ready.wait(outcomes) {
                Ok(guard) => guard,
                Err(_) => return Err(RequestError::network("scripted transport poisoned")),
            };
        }
    }
}

pub(crate) fn sample_file(seed: u8) -> anyhow::Result<SelectedFile> {
    Ok(SelectedFile::new(
        vec![seed; 16],
        "image/png",
        Some(format!("sample-{seed}.png")),
    )?)
}

pub(crate) fn sample_result(openness: f64) -> anyhow::Result<AnalysisResult> {
    Ok(parse_result(&json!({
        "traits": {"Openness": openness, "Conscientiousness": 0.3},
        "analysis_reasoning": {"slant_score": 0.5, "pressure_score": 0.6},
    }))?)
}
