use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Everything the session log can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    FileSelected,
    SelectionRejected,
    PreviewReleased,
    AnalysisStarted,
    AnalysisRejected,
    AnalysisSuperseded,
    AnalysisSucceeded,
    AnalysisFailed,
    AnalysisStaleIgnored,
    ScoresClamped,
    SessionClosed,
}

impl SessionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileSelected => "file_selected",
            Self::SelectionRejected => "selection_rejected",
            Self::PreviewReleased => "preview_released",
            Self::AnalysisStarted => "analysis_started",
            Self::AnalysisRejected => "analysis_rejected",
            Self::AnalysisSuperseded => "analysis_superseded",
            Self::AnalysisSucceeded => "analysis_succeeded",
            Self::AnalysisFailed => "analysis_failed",
            Self::AnalysisStaleIgnored => "analysis_stale_ignored",
            Self::ScoresClamped => "scores_clamped",
            Self::SessionClosed => "session_closed",
        }
    }
}

/// JSONL session log. Each line carries `type`, `session_id`, `seq` and
/// `ts`; payload keys never replace those four.
///
/// Clones share one file handle and one sequence counter.
#[derive(Debug, Clone)]
pub struct EventWriter {
    shared: Arc<SharedLog>,
}

#[derive(Debug)]
struct SharedLog {
    path: PathBuf,
    session_id: String,
    sink: Mutex<LogSink>,
}

#[derive(Debug, Default)]
struct LogSink {
    file: Option<File>,
    seq: u64,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(SharedLog {
                path: path.into(),
                session_id: session_id.into(),
                sink: Mutex::new(LogSink::default()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn emit(&self, event: SessionEvent, payload: EventPayload) -> anyhow::Result<Value> {
        let mut sink = self
            .shared
            .sink
            .lock()
            .map_err(|_| anyhow::anyhow!("session log lock poisoned"))?;
        if sink.file.is_none() {
            sink.file = Some(self.open_log()?);
        }
        sink.seq += 1;

        let mut record = payload;
        record.insert("type".into(), event.as_str().into());
        record.insert("session_id".into(), self.shared.session_id.as_str().into());
        record.insert("seq".into(), sink.seq.into());
        record.insert(
            "ts".into(),
            Utc::now()
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .into(),
        );

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        if let Some(file) = sink.file.as_mut() {
            file.write_all(&line)
                .with_context(|| format!("failed to append to {}", self.shared.path.display()))?;
        }
        Ok(Value::Object(record))
    }

    fn open_log(&self) -> anyhow::Result<File> {
        let path = &self.shared.path;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open session log {}", path.display()))
    }
}

/// Converts a `json!({...})` literal into an event payload.
pub fn payload(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        _ => EventPayload::new(),
    }
}

/// Reads a session log back, skipping blank lines.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Value>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut events = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line)
            .with_context(|| format!("{}:{} is not JSON", path.display(), index + 1))?;
        events.push(event);
    }
    Ok(events)
}
