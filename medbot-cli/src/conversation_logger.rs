use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub entry_type: EntryType,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryType {
    UserMessage { content: String },
    AssistantMessage { content: String },
    Error { content: String },
}

/// Appends one JSON line per exchange to a per-session transcript.
pub struct ConversationLogger {
    current_log_file: Option<PathBuf>,
}

impl ConversationLogger {
    pub fn new() -> Result<Self> {
        Self::in_dir(Path::new("conversation_logs"))
    }

    pub fn in_dir(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir)?;

        let filename = format!("conversation_{}.jsonl", Local::now().format("%Y%m%d_%H%M%S"));
        let log_file = log_dir.join(filename);

        debug!("Starting conversation logger: {:?}", log_file);

        Ok(Self {
            current_log_file: Some(log_file),
        })
    }

    /// A logger that records nothing.
    pub fn disabled() -> Self {
        Self {
            current_log_file: None,
        }
    }

    pub fn log_entry(&self, entry_type: EntryType) -> Result<()> {
        let Some(ref log_file) = self.current_log_file else {
            return Ok(());
        };

        let entry = ConversationEntry {
            timestamp: Local::now(),
            entry_type,
        };
        let json = serde_json::to_string(&entry)?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        writeln!(file, "{}", json)?;
        file.flush()?;
        Ok(())
    }

    /// Logging failures must not interrupt the chat.
    pub fn record(&self, entry_type: EntryType) {
        if let Err(e) = self.log_entry(entry_type) {
            error!("Failed to write conversation log: {}", e);
        }
    }

    pub fn get_current_log_path(&self) -> Option<&Path> {
        self.current_log_file.as_deref()
    }
}

impl Default for ConversationLogger {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            error!("Failed to create conversation logger: {}", e);
            Self::disabled()
        })
    }
}
