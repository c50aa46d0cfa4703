use std::time::Duration;

use gr_recipe_contracts::history_log::HistoryLogDir;
use gr_recipe_contracts::{Recipe, RecipeError, Result};
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;
use tracing::warn;

use crate::http::{endpoint, get_json};

/// Read side of the generation log, remote or on disk.
pub trait HistorySource: Send + Sync {
    fn name(&self) -> &str;
    fn list_dates(&self) -> Result<Vec<String>>;
    fn list_entries(&self, date: &str) -> Result<Vec<String>>;
    /// The stored record for one entry; the recipe sits under `output`.
    fn fetch_entry(&self, date: &str, entry: &str) -> Result<Value>;
}

pub struct HttpHistory {
    api_base: String,
    timeout: Duration,
    http: HttpClient,
}

impl HttpHistory {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            timeout,
            http: HttpClient::new(),
        }
    }

    fn get(&self, what: &str, segments: &[&str]) -> Result<Value> {
        let url = endpoint(&self.api_base, segments)?;
        get_json(&self.http, what, url, self.timeout)
    }
}

fn string_list(what: &str, payload: Value) -> Result<Vec<String>> {
    let Value::Array(rows) = payload else {
        return Err(RecipeError::Transport(format!("{what} returned a non-array payload")));
    };
    Ok(rows
        .into_iter()
        .filter_map(|row| match row {
            Value::String(text) => Some(text),
            _ => None,
        })
        .collect())
}

impl HistorySource for HttpHistory {
    fn name(&self) -> &str {
        "http"
    }

    fn list_dates(&self) -> Result<Vec<String>> {
        let payload = self.get("history date listing", &["api", "history", "dates"])?;
        string_list("history date listing", payload)
    }

    fn list_entries(&self, date: &str) -> Result<Vec<String>> {
        let payload = self.get("history entry listing", &["api", "history", "recipes", date])?;
        string_list("history entry listing", payload)
    }

    fn fetch_entry(&self, date: &str, entry: &str) -> Result<Value> {
        self.get("history detail", &["api", "history", "recipe", date, entry])
    }
}

impl HistorySource for HistoryLogDir {
    fn name(&self) -> &str {
        "local"
    }

    fn list_dates(&self) -> Result<Vec<String>> {
        HistoryLogDir::list_dates(self)
    }

    fn list_entries(&self, date: &str) -> Result<Vec<String>> {
        HistoryLogDir::list_entries(self, date)
    }

    fn fetch_entry(&self, date: &str, entry: &str) -> Result<Value> {
        self.read_entry(date, entry)
    }
}

/// Pull the recipe out of a stored history record.
pub fn unwrap_history_output(date: &str, entry: &str, record: Value) -> Result<Recipe> {
    let Value::Object(mut object) = record else {
        return Err(RecipeError::history_fetch(date, entry, "record is not an object"));
    };
    let output = match object.remove("output") {
        None | Some(Value::Null) => {
            return Err(RecipeError::history_fetch(date, entry, "record has no output"));
        }
        Some(output) => output,
    };
    serde_json::from_value(output).map_err(|err| {
        RecipeError::history_fetch(date, entry, format!("output is not a recipe: {err}"))
    })
}

/// History adapter used by the session. Keeps the last good date list so a
/// failed refresh degrades to stale data instead of an error.
pub struct HistoryAdapter {
    source: Box<dyn HistorySource>,
    cached_dates: Vec<String>,
}

impl HistoryAdapter {
    pub fn new(source: Box<dyn HistorySource>) -> Self {
        Self {
            source,
            cached_dates: Vec::new(),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn cached_dates(&self) -> &[String] {
        &self.cached_dates
    }

    pub fn list_dates(&mut self) -> Vec<String> {
        match self.source.list_dates() {
            Ok(dates) => {
                self.cached_dates = dates;
            }
            Err(err) => {
                warn!(error = %err, cached = self.cached_dates.len(), "history dates unavailable, keeping cached list");
            }
        }
        self.cached_dates.clone()
    }

    pub fn list_entries(&self, date: &str) -> Result<Vec<String>> {
        self.source.list_entries(date)
    }

    pub fn fetch_detail(&self, date: &str, entry: &str) -> Result<Recipe> {
        let record = self.source.fetch_entry(date, entry)?;
        unwrap_history_output(date, entry, record)
    }
}
