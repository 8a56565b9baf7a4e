//! Message delivery backends.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use vigil_common::error::VigilResult;

/// Template variables of one invitation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub name: String,
    pub email: String,
    /// The student's one-time password.
    pub otp: String,
    pub company_name: String,
    pub test_link: String,
}

/// Sends invitation messages.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, invitation: &Invitation) -> VigilResult<()>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Logs each message instead of sending it. The password is never logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, invitation: &Invitation) -> VigilResult<()> {
        tracing::info!(
            to = %invitation.email,
            name = %invitation.name,
            link = %invitation.test_link,
            "Invitation (not delivered)"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Appends each message as one JSON line to an outbox file, for a relay
/// to pick up.
pub struct OutboxMailer {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl OutboxMailer {
    /// Open (or create) the outbox in append mode.
    pub fn open(path: impl Into<PathBuf>) -> VigilResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, invitation: &Invitation) -> VigilResult<()> {
        let line = serde_json::to_string(invitation)?;
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(writer, "{line}")?;
        // Flushed per message so an accepted invitation survives a crash.
        writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "outbox"
    }
}
