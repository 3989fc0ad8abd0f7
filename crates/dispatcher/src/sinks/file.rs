//! FileSink - appends events to a JSON lines file

use contracts::{ContractError, EventSink, TaskEvent};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, created (with parent directories) if missing
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map (`path`, default `./task_events.jsonl`)
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./task_events.jsonl"));

        Self { path }
    }
}

/// Sink that appends one JSON object per event
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
    lines_written: u64,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            writer: Some(BufWriter::new(file)),
            lines_written: 0,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    /// Lines written since the sink was opened
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    fn append_line(&mut self, event: &TaskEvent) -> Result<(), ContractError> {
        let line = serde_json::to_vec(event).map_err(|e| ContractError::EventEncode {
            task_id: event.task_id.clone(),
            message: e.to_string(),
        })?;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_write(&self.name, "file closed"))?;

        writer
            .write_all(&line)
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| {
                error!(
                    sink = %self.name,
                    path = %self.config.path.display(),
                    error = %e,
                    "Write failed"
                );
                ContractError::sink_write(&self.name, e.to_string())
            })?;

        self.lines_written += 1;
        Ok(())
    }
}

impl EventSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, event),
        fields(sink = %self.name, task_id = %event.task_id)
    )]
    async fn write(&mut self, event: &TaskEvent) -> Result<(), ContractError> {
        self.append_line(event)
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        debug!(
            sink = %self.name,
            lines = self.lines_written,
            "FileSink closed"
        );
        Ok(())
    }
}
