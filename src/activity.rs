//! Append-only JSONL log of what a dashboard session did.
//! Tokens are never written here.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ActivityLog {
    pub path: PathBuf,
    session_id: String,
    api_url: String,
    file: File,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    api_url: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl ActivityLog {
    pub fn new(path: &Path, session_id: &str, api_url: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open activity log {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            session_id: session_id.to_string(),
            api_url: api_url.to_string(),
            file,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            api_url: &self.api_url,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn login(&mut self, accepted: bool, remembered: bool, silent: bool) -> Result<()> {
        self.log(
            "login",
            serde_json::json!({
                "accepted": accepted,
                "remembered": remembered,
                "silent": silent,
            }),
        )
    }

    pub fn logout(&mut self) -> Result<()> {
        self.log("logout", serde_json::json!({}))
    }

    pub fn refresh(&mut self, count: usize) -> Result<()> {
        self.log("refresh", serde_json::json!({ "containers": count }))
    }

    pub fn check_result(&mut self, checked: usize, with_updates: usize, failed: &[String]) -> Result<()> {
        self.log(
            "check",
            serde_json::json!({
                "checked": checked,
                "with_updates": with_updates,
                "failed": failed,
            }),
        )
    }

    pub fn update_requested(&mut self, containers: &[String], failed: &[String]) -> Result<()> {
        self.log(
            "update",
            serde_json::json!({
                "containers": containers,
                "failed": failed,
            }),
        )
    }

    pub fn selection(&mut self, pattern: &str, toggled: &[String]) -> Result<()> {
        self.log(
            "select",
            serde_json::json!({ "pattern": pattern, "toggled": toggled }),
        )
    }

    pub fn error(&mut self, operation: &str, message: &str) -> Result<()> {
        self.log(
            "error",
            serde_json::json!({ "operation": operation, "message": message }),
        )
    }
}
