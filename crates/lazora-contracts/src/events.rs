use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Everything the enhancer records about a session. Serialized with the
/// variant name as `type`, so `EditDiscarded` lands as `"edit_discarded"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted,
    EditStarted {
        operation: &'static str,
        product: String,
        reuses_background: bool,
    },
    NormalizeFallback {
        role: &'static str,
        file: String,
        reason: String,
    },
    EditAttempt {
        operation: &'static str,
        attempt: u32,
        max_attempts: u32,
    },
    EditFailed {
        operation: &'static str,
        failure: Option<&'static str>,
        retrying: bool,
    },
    EditSucceeded {
        operation: &'static str,
        mime_type: String,
        fingerprint: String,
        bytes: usize,
    },
    /// A result arrived for a generation the session already left.
    EditDiscarded {
        operation: &'static str,
        started_generation: u64,
    },
    UpscaleStarted {
        fingerprint: String,
    },
    UpscaleFinished {
        failure: Option<&'static str>,
        fingerprint: Option<String>,
    },
    SessionReset,
    BackgroundReused {
        fingerprint: String,
    },
    ConversionFinished {
        format: &'static str,
        files: Vec<ConvertedEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedEntry {
    pub name: String,
    pub original_size: usize,
    pub new_size: usize,
}

/// Append-only `events.jsonl` for one enhancer session.
///
/// Every line starts from `session_id`, `generation` and `ts`, then the
/// event's own fields. The file opens on the first record and stays open;
/// the handle sits behind a mutex so a worker thread can record while the
/// caller holds a shared reference.
#[derive(Debug)]
pub struct SessionLog {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            file: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record(&self, generation: u64, event: &SessionEvent) -> Result<Value> {
        let mut line = Map::new();
        line.insert(
            "session_id".to_string(),
            Value::String(self.session_id.clone()),
        );
        line.insert("generation".to_string(), Value::from(generation));
        line.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        match serde_json::to_value(event)? {
            Value::Object(fields) => line.extend(fields),
            other => bail!("session event serialized to a non-object: {other}"),
        }

        let mut text = serde_json::to_string(&line)?;
        text.push('\n');
        let mut guard = self
            .file
            .lock()
            .map_err(|_| anyhow!("session log lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(text.as_bytes())?;
        }
        Ok(Value::Object(line))
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed opening {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{ConvertedEntry, SessionEvent, SessionLog};

    #[test]
    fn record_writes_defaults_then_typed_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = SessionLog::new(&path, "session-123");

        let written = log.record(
            4,
            &SessionEvent::EditStarted {
                operation: "enhance",
                product: "mug.png".to_string(),
                reuses_background: false,
            },
        )?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.trim_end())?;
        assert_eq!(parsed, written);
        assert_eq!(parsed["type"], json!("edit_started"));
        assert_eq!(parsed["session_id"], json!("session-123"));
        assert_eq!(parsed["generation"], json!(4));
        assert_eq!(parsed["operation"], json!("enhance"));
        assert_eq!(parsed["product"], json!("mug.png"));
        assert_eq!(parsed["reuses_background"], json!(false));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn unit_and_nested_variants_serialize_by_name() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = SessionLog::new(temp.path().join("events.jsonl"), "session-123");

        let reset = log.record(2, &SessionEvent::SessionReset)?;
        assert_eq!(reset["type"], json!("session_reset"));
        assert_eq!(reset.as_object().map(|fields| fields.len()), Some(4));

        let discarded = log.record(
            3,
            &SessionEvent::EditDiscarded {
                operation: "style_transfer",
                started_generation: 2,
            },
        )?;
        assert_eq!(discarded["type"], json!("edit_discarded"));
        assert_eq!(discarded["generation"], json!(3));
        assert_eq!(discarded["started_generation"], json!(2));

        let converted = log.record(
            0,
            &SessionEvent::ConversionFinished {
                format: "webp",
                files: vec![ConvertedEntry {
                    name: "a.webp".to_string(),
                    original_size: 10,
                    new_size: 4,
                }],
            },
        )?;
        assert_eq!(converted["files"][0]["new_size"], json!(4));
        Ok(())
    }

    #[test]
    fn workers_append_through_one_handle() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let log = SessionLog::new(&path, "session-123");

        log.record(0, &SessionEvent::SessionStarted)?;
        std::thread::scope(|scope| {
            scope
                .spawn(|| log.record(1, &SessionEvent::SessionReset))
                .join()
                .map_err(|_| anyhow::anyhow!("worker panicked"))?
        })?;

        let content = fs::read_to_string(&path)?;
        let rows: Vec<Value> = content
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<_, _>>()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["type"], json!("session_started"));
        assert_eq!(rows[1]["type"], json!("session_reset"));
        assert_eq!(rows[1]["generation"], json!(1));
        Ok(())
    }
}
