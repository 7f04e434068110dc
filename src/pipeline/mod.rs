// Pipeline execution and monitoring module
// Orchestrates the analysis of one event and traces its progress

pub mod analysis;
pub mod trace;

pub use analysis::{analyze_event, AnalysisError, AnalysisReport, Artifact, LIVINGSTON_SHIFT};
pub use trace::{read_trace_file, Stage, TraceEntry, TraceError, TraceWriter};
