use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

pub type EventPayload = Map<String, Value>;

/// Session trail writer. Every user-visible action becomes one JSON line in
/// `events.jsonl`, stamped with the session id and an RFC 3339 time.
///
/// Object payloads are merged over the stamp, so a payload may replace
/// `session_id` (imported recipes keep the id of the session that made
/// them). Scalars land under `value`; `null` adds nothing.
#[derive(Debug, Clone)]
pub struct EventWriter {
    session_id: Arc<str>,
    sink: Option<Arc<TrailFile>>,
}

#[derive(Debug)]
struct TrailFile {
    path: PathBuf,
    handle: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            session_id: Arc::from(session_id.into()),
            sink: Some(Arc::new(TrailFile {
                path: path.into(),
                handle: Mutex::new(None),
            })),
        }
    }

    /// Stamps events without persisting them.
    pub fn disabled(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Arc::from(session_id.into()),
            sink: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_deref().map(|sink| sink.path.as_path())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn emit(&self, event_type: &str, payload: Value) -> anyhow::Result<Value> {
        let mut event = match json!({
            "type": event_type,
            "session_id": &*self.session_id,
            "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        }) {
            Value::Object(stamp) => stamp,
            _ => EventPayload::new(),
        };
        match payload {
            Value::Null => {}
            Value::Object(fields) => event.extend(fields),
            other => {
                event.insert("value".to_string(), other);
            }
        }
        let event = Value::Object(event);

        if let Some(sink) = self.sink.as_deref() {
            sink.append(&event)?;
        }
        Ok(event)
    }
}

impl TrailFile {
    fn append(&self, event: &Value) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut handle = self
            .handle
            .lock()
            .map_err(|_| anyhow::anyhow!("session trail lock poisoned"))?;
        if handle.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            *handle = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }
        if let Some(file) = handle.as_mut() {
            file.write_all(&line)?;
        }
        Ok(())
    }
}
