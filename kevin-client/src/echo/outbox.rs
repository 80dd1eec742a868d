use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use kevin_types::PostId;

/// A mutation that was sent optimistically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    ToggleLike {
        post_id: PostId,
        username: String,
    },
    AddComment {
        post_id: PostId,
        username: String,
        text: String,
    },
}

impl OperationKind {
    pub fn post_id(&self) -> PostId {
        match self {
            OperationKind::ToggleLike { post_id, .. } | OperationKind::AddComment { post_id, .. } => {
                *post_id
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    /// Sent, no answer recorded yet
    Pending,
    /// The server rejected it or could not be reached
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOp {
    /// Idempotency token sent with every attempt
    pub token: Uuid,
    pub op: OperationKind,
    pub status: OpStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Durable log of optimistic mutations that have not been confirmed.
///
/// Entries are written before the request goes out and removed once the
/// server confirms, so anything left over can be replayed with the same
/// token. The file lives at `~/.kevin/outbox.json`.
#[derive(Debug)]
pub struct Outbox {
    file_path: Option<PathBuf>,
    entries: Vec<PendingOp>,
}

impl Outbox {
    /// Open the outbox stored at `file_path`, starting empty if it is missing
    /// or unreadable.
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();

        let entries = if file_path.exists() {
            let content = fs::read_to_string(&file_path).context("Failed to read outbox file")?;
            match serde_json::from_str::<Vec<PendingOp>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Outbox file is corrupted ({}), starting with an empty outbox", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        log::debug!("Loaded {} pending operations from {}", entries.len(), file_path.display());
        Ok(Self {
            file_path: Some(file_path),
            entries,
        })
    }

    /// Outbox that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            file_path: None,
            entries: Vec::new(),
        }
    }

    /// Record a new operation and return its token
    pub fn record(&mut self, op: OperationKind) -> Result<Uuid> {
        let token = Uuid::new_v4();
        self.entries.push(PendingOp {
            token,
            op,
            status: OpStatus::Pending,
            created_at: Utc::now(),
            attempts: 1,
            last_error: None,
        });

        if let Err(e) = self.persist() {
            self.entries.retain(|entry| entry.token != token);
            return Err(e);
        }
        Ok(token)
    }

    /// Mark a replay attempt
    pub fn retry(&mut self, token: Uuid) -> Result<()> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.token == token) {
            entry.status = OpStatus::Pending;
            entry.attempts += 1;
        }
        self.persist()
    }

    /// The server confirmed the operation
    pub fn complete(&mut self, token: Uuid) -> Result<()> {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.token != token);
        if self.entries.len() == before {
            return Ok(());
        }
        self.persist()
    }

    pub fn fail(&mut self, token: Uuid, error: impl Into<String>) -> Result<()> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.token == token) {
            entry.status = OpStatus::Failed;
            entry.last_error = Some(error.into());
        }
        self.persist()
    }

    /// Drop an entry without replaying it
    pub fn discard(&mut self, token: Uuid) -> Result<bool> {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.token != token);
        let removed = self.entries.len() != before;
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn get(&self, token: Uuid) -> Option<&PendingOp> {
        self.entries.iter().find(|e| e.token == token)
    }

    /// Entries in the order they were recorded
    pub fn entries(&self) -> &[PendingOp] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Write with a temp file and rename so a crash never leaves half a log
    fn persist(&self) -> Result<()> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).context("Failed to create outbox directory")?;
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialize outbox")?;

        let temp_path = file_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).context("Failed to create temporary outbox file")?;
        file.write_all(json.as_bytes())
            .context("Failed to write outbox")?;
        file.sync_all().context("Failed to sync outbox file to disk")?;
        drop(file);

        fs::rename(&temp_path, file_path).context("Failed to rename temporary outbox file")?;
        Ok(())
    }
}
