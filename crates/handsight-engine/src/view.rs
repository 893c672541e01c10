use std::fmt::Write as _;

use handsight_contracts::results::AnalysisResult;
use serde::Serialize;
use serde_json::Value;

use crate::errors::RequestErrorKind;
use crate::workflow::WorkflowState;

pub const ANALYZE_LABEL: &str = "ANALYZE HANDWRITING";
pub const PROCESSING_LABEL: &str = "PROCESSING...";
pub const RESULTS_PLACEHOLDER: &str = "Results will appear here";

/// Everything a front end needs to draw one frame. Built fresh from the
/// current state; holds no references back into the workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
    pub state: &'static str,
    pub can_analyze: bool,
    pub busy: bool,
    pub action_label: &'static str,
    pub file: Option<FileView>,
    pub preview: Option<PreviewView>,
    pub request_id: Option<String>,
    pub result: Option<ResultView>,
    pub error: Option<ErrorView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileView {
    pub name: Option<String>,
    pub mime_type: String,
    pub byte_len: usize,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewView {
    pub id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub traits: Vec<TraitView>,
    pub slant_degrees: u8,
    pub pressure_percent: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clamped_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitView {
    pub name: String,
    pub score: f64,
    pub percent: u8,
    pub band: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorView {
    pub message: &'static str,
    pub kind: RequestErrorKind,
    pub status: Option<u16>,
    pub detail: String,
}

impl ResultView {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let reasoning = result.reasoning();
        Self {
            traits: result
                .trait_rows()
                .map(|row| TraitView {
                    name: row.name.to_string(),
                    score: row.score,
                    percent: row.percent(),
                    band: row.band().as_str(),
                })
                .collect(),
            slant_degrees: reasoning.slant_degrees(),
            pressure_percent: reasoning.pressure_percent(),
            clamped_fields: result
                .adjustments()
                .iter()
                .map(|adjustment| adjustment.field.clone())
                .collect(),
        }
    }

    /// Trait bars in response order, then the two reasoning readouts.
    pub fn render_text(&self) -> String {
        let mut out = String::from("Personality Profile\n");
        let width = self
            .traits
            .iter()
            .map(|row| row.name.chars().count())
            .max()
            .unwrap_or(0);
        for row in &self.traits {
            let filled = usize::from(row.percent.min(100)) / 5;
            let _ = writeln!(
                out,
                "  {:<width$}  {:>3}%  {}{}  {}",
                row.name,
                row.percent,
                "#".repeat(filled),
                ".".repeat(20 - filled),
                row.band,
            );
        }
        let _ = writeln!(out, "Slant Angle: {}°", self.slant_degrees);
        let _ = writeln!(out, "Pen Pressure: {}%", self.pressure_percent);
        if !self.clamped_fields.is_empty() {
            let _ = writeln!(
                out,
                "(clamped to [0, 1]: {})",
                self.clamped_fields.join(", ")
            );
        }
        out
    }
}

impl WorkflowView {
    pub fn from_state(state: &WorkflowState) -> Self {
        let busy = state.is_busy();
        let file = state.file().map(|file| FileView {
            name: file.name().map(str::to_string),
            mime_type: file.mime_type().to_string(),
            byte_len: file.byte_len(),
            digest: file.digest(),
        });
        let preview = state.preview().map(|preview| {
            let dimensions = preview.dimensions();
            PreviewView {
                id: preview.id().to_string(),
                width: dimensions.map(|(width, _)| width),
                height: dimensions.map(|(_, height)| height),
            }
        });
        let result = state.result().map(ResultView::from_result);
        let error = state.error().map(|error| ErrorView {
            message: error.user_message(),
            kind: error.kind(),
            status: error.status(),
            detail: error.message().to_string(),
        });

        Self {
            state: state.name(),
            can_analyze: state.can_analyze(),
            busy,
            action_label: if busy { PROCESSING_LABEL } else { ANALYZE_LABEL },
            file,
            preview,
            request_id: state.request_id().map(|id| id.to_string()),
            result,
            error,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        match &self.file {
            Some(file) => {
                let name = file.name.as_deref().unwrap_or("(unnamed)");
                let _ = write!(out, "File: {name} ({}, {} bytes)", file.mime_type, file.byte_len);
                if let Some(PreviewView {
                    width: Some(width),
                    height: Some(height),
                    ..
                }) = &self.preview
                {
                    let _ = write!(out, " {width}x{height}");
                }
                out.push('\n');
            }
            None => out.push_str("No file selected.\n"),
        }

        let availability = if self.can_analyze { "" } else { " (unavailable)" };
        let _ = writeln!(out, "[{}]{availability}", self.action_label);

        if let Some(error) = &self.error {
            let _ = writeln!(out, "! {}", error.message);
            let _ = writeln!(out, "  {}", error.detail);
        }

        match &self.result {
            Some(result) => out.push_str(&result.render_text()),
            None if self.error.is_none() => {
                let _ = writeln!(out, "{RESULTS_PLACEHOLDER}");
            }
            None => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use handsight_contracts::results::parse_result;
    use handsight_contracts::uploads::UploadSession;
    use serde_json::json;

    use super::{WorkflowView, ANALYZE_LABEL, PROCESSING_LABEL, RESULTS_PLACEHOLDER};
    use crate::controller::AnalysisController;
    use crate::errors::RequestError;
    use crate::testing::ScriptedTransport;
    use crate::workflow::WorkflowState;

    fn selection(session: &mut UploadSession) -> anyhow::Result<handsight_contracts::uploads::Selection> {
        Ok(session.select_file(vec![7u8; 4], "image/png", Some("note.png".to_string()))?)
    }

    #[test]
    fn idle_view_disables_analysis() {
        let view = WorkflowView::from_state(&WorkflowState::Idle);
        assert!(!view.can_analyze);
        assert!(!view.busy);
        assert_eq!(view.action_label, ANALYZE_LABEL);
        let text = view.render_text();
        assert!(text.contains("No file selected."));
        assert!(text.contains("(unavailable)"));
        assert!(text.contains(RESULTS_PLACEHOLDER));
    }

    #[test]
    fn in_flight_view_is_busy() -> anyhow::Result<()> {
        let mut session = UploadSession::new();
        let selection = selection(&mut session)?;
        let mut controller = AnalysisController::new(std::sync::Arc::new(ScriptedTransport::new()));
        let request_id = controller.submit(selection.file.clone());

        let view = WorkflowView::from_state(&WorkflowState::InFlight {
            selection,
            request_id,
        });
        assert!(view.busy);
        assert!(!view.can_analyze);
        assert_eq!(view.action_label, PROCESSING_LABEL);
        assert_eq!(view.request_id.as_deref(), Some("req-1"));
        assert_eq!(view.to_json()?["state"], "in_flight");
        Ok(())
    }

    #[test]
    fn succeeded_view_renders_profile_in_response_order() -> anyhow::Result<()> {
        let mut session = UploadSession::new();
        let selection = selection(&mut session)?;
        let result = parse_result(&json!({
            "traits": {"Openness": 0.82, "Neuroticism": 1.3, "Agreeableness": 0.1},
            "analysis_reasoning": {"slant_score": 0.45, "pressure_score": 0.6},
        }))?;

        let view = WorkflowView::from_state(&WorkflowState::Succeeded { selection, result });
        assert!(view.can_analyze);
        let result = view
            .result
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("expected result view"))?;
        let names: Vec<&str> = result.traits.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["Openness", "Neuroticism", "Agreeableness"]);
        assert_eq!(result.traits[0].percent, 82);
        assert_eq!(result.traits[0].band, "high");
        assert_eq!(result.traits[1].percent, 100);
        assert_eq!(result.traits[2].band, "low");
        assert_eq!(result.clamped_fields, vec!["traits.Neuroticism".to_string()]);

        let text = view.render_text();
        assert!(text.contains("Personality Profile"));
        assert!(text.contains("Slant Angle: 45°"));
        assert!(text.contains("Pen Pressure: 60%"));
        assert!(!text.contains(RESULTS_PLACEHOLDER));
        Ok(())
    }

    #[test]
    fn failed_view_shows_retry_banner() -> anyhow::Result<()> {
        let mut session = UploadSession::new();
        let selection = selection(&mut session)?;
        let view = WorkflowView::from_state(&WorkflowState::Failed {
            selection,
            error: RequestError::from_status(503, "asleep"),
        });
        assert!(view.can_analyze);
        assert!(view.result.is_none());
        let json = view.to_json()?;
        assert_eq!(json["error"]["kind"], "server_error");
        assert_eq!(json["error"]["status"], 503);
        assert!(view.render_text().contains("try again"));
        Ok(())
    }
}
