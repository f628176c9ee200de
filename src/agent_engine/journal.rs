use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::GridPilotResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: i64,
    pub step: u64,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JournalEntry {
    pub fn new(step: u64, event: &str) -> Self {
        Self {
            ts: chrono::Utc::now().timestamp_millis(),
            step,
            event: event.to_string(),
            tool_call: None,
            detail: None,
        }
    }

    pub fn with_tool_call(mut self, tool_call: impl Into<String>) -> Self {
        self.tool_call = Some(tool_call.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// One JSONL file per run, one line per step outcome.
pub struct StepJournal {
    pub session_id: String,
    file_path: PathBuf,
}

impl StepJournal {
    pub fn new(dir: Option<&Path>) -> GridPilotResult<Self> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let dir = match dir {
            Some(d) => d.to_path_buf(),
            None => data_dir_or_cwd(),
        };
        std::fs::create_dir_all(&dir)?;
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        tracing::info!(session = %session_id, path = %file_path.display(), "step journal opened");
        Ok(Self {
            session_id,
            file_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn append(&self, entry: &JournalEntry) -> GridPilotResult<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// `<data_local_dir>/GridPilot/sessions`, falling back to the working directory.
fn data_dir_or_cwd() -> PathBuf {
    match dirs::data_local_dir() {
        Some(base) => base.join("GridPilot").join("sessions"),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
