use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{RecipeError, Result};

const UNKNOWN_ENTRY_NAME: &str = "unknown_recipe";

/// One generation as filed in the history log. `output` is kept as raw JSON
/// so entries written by other producers are read back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryLogEntry {
    pub id: String,
    pub timestamp: String,
    pub user_input: String,
    pub image_count: u64,
    pub model: String,
    pub output: Value,
}

impl HistoryLogEntry {
    pub fn new(
        user_input: &str,
        image_count: usize,
        model: &str,
        output: Value,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Micros, false),
            user_input: user_input.to_string(),
            image_count: image_count as u64,
            model: model.to_string(),
            output,
        }
    }
}

/// File stem for a history entry: alphanumerics, space, `-`, `_` and `.` are
/// kept, the rest dropped, then spaces become underscores.
pub fn safe_entry_name(vibe_match: &str) -> String {
    let kept = vibe_match
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, ' ' | '-' | '_' | '.'))
        .collect::<String>();
    let name = kept.trim().replace(' ', "_");
    if name.is_empty() {
        UNKNOWN_ENTRY_NAME.to_string()
    } else {
        name
    }
}

/// `result/` style directory: one subdirectory per day, one JSON file per
/// generation.
#[derive(Debug, Clone)]
pub struct HistoryLogDir {
    root: PathBuf,
}

impl HistoryLogDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File `entry` under its day directory and return the written path.
    /// An entry with the same name on the same day is overwritten.
    pub fn record(&self, entry: &HistoryLogEntry, now: DateTime<Local>) -> Result<PathBuf> {
        let vibe_match = entry
            .output
            .get("vibe_match")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ENTRY_NAME);
        let date_dir = self.root.join(now.format("%Y-%m-%d").to_string());
        std::fs::create_dir_all(&date_dir)?;
        let path = date_dir.join(format!("{}.json", safe_entry_name(vibe_match)));
        std::fs::write(&path, serde_json::to_string_pretty(entry)?)?;
        Ok(path)
    }

    /// Day directories, newest first.
    pub fn list_dates(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut dates = Vec::new();
        for item in std::fs::read_dir(&self.root)? {
            let item = item?;
            if item.file_type()?.is_dir() {
                dates.push(item.file_name().to_string_lossy().to_string());
            }
        }
        dates.sort_by(|left, right| right.cmp(left));
        Ok(dates)
    }

    /// JSON file names recorded on `date`, ascending.
    pub fn list_entries(&self, date: &str) -> Result<Vec<String>> {
        let date_dir = self.root.join(date);
        if !date_dir.is_dir() {
            return Err(RecipeError::HistoryNotFound(date.to_string()));
        }
        let mut entries = Vec::new();
        for item in std::fs::read_dir(&date_dir)? {
            let item = item?;
            let path = item.path();
            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext == "json");
            if is_json && item.file_type()?.is_file() {
                entries.push(item.file_name().to_string_lossy().to_string());
            }
        }
        entries.sort();
        Ok(entries)
    }

    pub fn read_entry(&self, date: &str, entry: &str) -> Result<Value> {
        let path = self.root.join(date).join(entry);
        if !path.is_file() {
            return Err(RecipeError::HistoryNotFound(format!("{date}/{entry}")));
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
