// Pipeline progress tracing
// Append-only JSONL trace file, one line per stage transition or written artifact

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Design,
    Condition,
    Spectrum,
    Comparison,
    QTransform,
    Audio,
    Complete,
    Failed,
}

impl Stage {
    /// Fraction of the run finished once this stage starts
    pub fn progress(&self) -> f32 {
        match self {
            Stage::Fetch => 0.0,
            Stage::Design => 0.15,
            Stage::Condition => 0.2,
            Stage::Spectrum => 0.35,
            Stage::Comparison => 0.5,
            Stage::QTransform => 0.7,
            Stage::Audio => 0.9,
            Stage::Complete | Stage::Failed => 1.0,
        }
    }
}

/// A single trace entry in the pipeline execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// ISO 8601 timestamp of when this entry was created
    pub timestamp: String,

    /// Identifies all entries of one analysis run
    pub run_id: Uuid,

    /// Event name (e.g., "GW150914")
    pub event: String,

    pub stage: Stage,

    /// Progress percentage [0.0, 1.0]
    pub progress: f32,

    /// Human-readable message describing current operation
    pub message: String,

    /// Optional structured data (sample counts, artifact paths and digests)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Create a new trace entry with current timestamp
    pub fn new(run_id: Uuid, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id,
            event: event.into(),
            stage,
            progress: stage.progress().clamp(0.0, 1.0),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Trace writer for one run of one event
pub struct TraceWriter {
    file_path: PathBuf,
    run_id: Uuid,
    event: String,
}

impl TraceWriter {
    /// Start a new run with a fresh UUID v4
    pub fn new(file_path: PathBuf, event: impl Into<String>) -> Self {
        TraceWriter {
            file_path,
            run_id: Uuid::new_v4(),
            event: event.into(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Get the trace file path
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append an entry; creates the file and its directory if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        let json_line = entry.to_json_line()?;
        file.write_all(json_line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn record(&self, stage: Stage, message: impl Into<String>) -> Result<(), TraceError> {
        self.write(&self.entry(stage, message))
    }

    pub fn record_with(
        &self,
        stage: Stage,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<(), TraceError> {
        self.write(&self.entry(stage, message).with_data(data))
    }

    fn entry(&self, stage: Stage, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.run_id, self.event.clone(), stage, message)
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_trace_entry_creation() {
        let run_id = Uuid::new_v4();
        let entry = TraceEntry::new(run_id, "GW150914", Stage::Condition, "Filtering");

        assert_eq!(entry.run_id, run_id);
        assert_eq!(entry.event, "GW150914");
        assert_eq!(entry.stage, Stage::Condition);
        assert_eq!(entry.progress, Stage::Condition.progress());
        assert!(entry.data.is_none());
    }

    #[test]
    fn test_stage_progress_is_monotonic() {
        let order = [
            Stage::Fetch,
            Stage::Design,
            Stage::Condition,
            Stage::Spectrum,
            Stage::Comparison,
            Stage::QTransform,
            Stage::Audio,
            Stage::Complete,
        ];
        assert!(order.windows(2).all(|w| w[0].progress() < w[1].progress()));
    }

    #[test]
    fn test_json_line_format() {
        let entry = TraceEntry::new(Uuid::new_v4(), "GW170817", Stage::QTransform, "Q scan")
            .with_data(serde_json::json!({ "rows": 96 }));
        let json_line = entry.to_json_line().unwrap();

        assert!(json_line.ends_with('\n'));
        assert!(json_line.contains("\"stage\":\"q_transform\""));

        let parsed: TraceEntry = serde_json::from_str(json_line.trim()).unwrap();
        assert_eq!(parsed.data.unwrap()["rows"], 96);
    }

    #[test]
    fn test_trace_writer() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("results/trace.jsonl");

        let writer = TraceWriter::new(trace_path.clone(), "GW150914");
        writer.record(Stage::Fetch, "Start").unwrap();
        writer
            .record_with(Stage::Complete, "Done", serde_json::json!({ "artifacts": 0 }))
            .unwrap();

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.run_id == writer.run_id()));
        assert_eq!(entries[0].progress, 0.0);
        assert_eq!(entries[1].progress, 1.0);
    }

    #[test]
    fn test_runs_append_to_same_file() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("trace.jsonl");

        let first = TraceWriter::new(trace_path.clone(), "GW150914");
        let second = TraceWriter::new(trace_path.clone(), "GW150914");
        first.record(Stage::Fetch, "a").unwrap();
        second.record(Stage::Fetch, "b").unwrap();

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_ne!(entries[0].run_id, entries[1].run_id);
    }
}
