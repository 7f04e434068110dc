// Event analysis
// Runs one event end to end: fetch, filter, plot, compare detectors, Q scan, audio

use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{Detector, EventDescriptor, EventError};
use crate::config::{AnalysisConfig, ConfigError};
use crate::filtering::{self, FilterError};
use crate::pipeline::trace::{Stage, TraceError, TraceWriter};
use crate::plots::{self, Figure, PlotError};
use crate::sonify::{self, AudioBuffer, SonifyError};
use crate::spectral::{self, SpectralError};
use crate::strain::cache::calculate_sha256;
use crate::strain::{FetchError, StrainSource, TimeSeries};

/// Light-travel delay applied to the Livingston trace before comparison
pub const LIVINGSTON_SHIFT: f64 = 0.0069;

/// Welch segment length (seconds) and overlap fraction for ASD estimates
const ASD_FFT_LENGTH: f64 = 4.0;
const ASD_OVERLAP: f64 = 0.5;

/// Any failure that aborts the analysis of an event; module errors pass
/// through unchanged
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sonify(#[from] SonifyError),

    #[error(transparent)]
    Spectral(#[from] SpectralError),

    #[error(transparent)]
    Plot(#[from] PlotError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file written by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    /// Plot kind ("ASD", "q_transform", ...) or "audio"
    pub kind: String,
    pub path: PathBuf,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub event: String,

    /// Hanford strain as fetched
    pub raw: TimeSeries,

    /// Hanford strain after zero-phase filtering, edges cropped
    pub filtered: TimeSeries,

    pub artifacts: Vec<Artifact>,
    pub audio: Option<AudioBuffer>,
}

/// Analyse one event. Stages run in order and the first failure aborts the
/// run; files from completed stages stay on disk.
pub fn analyze_event(
    event: &EventDescriptor,
    source: &dyn StrainSource,
    config: &AnalysisConfig,
    generate_audio: bool,
) -> Result<AnalysisReport, AnalysisError> {
    let trace = TraceWriter::new(config.trace_path(), event.name);
    log::info!("Analyzing {} (run {})", event.name, trace.run_id());

    let mut run = Run {
        event,
        config,
        trace: &trace,
        artifacts: Vec::new(),
    };

    match run.execute(source, generate_audio) {
        Ok((raw, filtered, audio)) => {
            trace.record_with(
                Stage::Complete,
                format!("Analysis of {} complete", event.name),
                json!({ "artifacts": run.artifacts }),
            )?;
            log::info!(
                "Analysis complete: {} files written under {}",
                run.artifacts.len(),
                config.output_dir.display()
            );
            Ok(AnalysisReport {
                run_id: trace.run_id(),
                event: event.name.to_string(),
                raw,
                filtered,
                artifacts: run.artifacts,
                audio,
            })
        }
        Err(e) => {
            if let Err(trace_err) = trace.record(Stage::Failed, e.to_string()) {
                log::warn!("Could not record failure in trace: {}", trace_err);
            }
            Err(e)
        }
    }
}

struct Run<'a> {
    event: &'a EventDescriptor,
    config: &'a AnalysisConfig,
    trace: &'a TraceWriter,
    artifacts: Vec<Artifact>,
}

impl Run<'_> {
    fn execute(
        &mut self,
        source: &dyn StrainSource,
        generate_audio: bool,
    ) -> Result<(TimeSeries, TimeSeries, Option<AudioBuffer>), AnalysisError> {
        let event = self.event;
        let use_cache = self.config.use_cache;

        self.trace.record(Stage::Fetch, format!("Fetching {} strain", Detector::H1))?;
        let raw = source.fetch(Detector::H1, event.start_time, event.end_time, use_cache)?;
        self.trace.record_with(
            Stage::Fetch,
            format!("Fetched {} strain", Detector::H1),
            json!({ "samples": raw.len(), "sample_rate": raw.sample_rate() }),
        )?;

        self.trace.record(Stage::Design, "Designing band-pass and notch filters")?;
        let filter = filtering::design(raw.sample_rate())?;

        self.trace.record(Stage::Condition, "Applying zero-phase filter")?;
        let conditioned = filtering::condition(&raw, &filter, true)?;
        let filtered = conditioned.filtered;

        self.trace.record(Stage::Spectrum, "Estimating amplitude spectral density")?;
        let raw_asd = spectral::asd(&raw, ASD_FFT_LENGTH, ASD_OVERLAP)?;
        let cropped_asd = spectral::asd(&conditioned.raw, ASD_FFT_LENGTH, ASD_OVERLAP)?;
        let filtered_asd = spectral::asd(&filtered, ASD_FFT_LENGTH, ASD_OVERLAP)?;

        let plots_dir = self.config.plots_dir();
        self.save(
            "ASD",
            &plots::spectral_density(
                &raw_asd,
                &format!("{} Amplitude Spectral Density ({})", Detector::H1.display_name(), event.name),
            ),
            &plots_dir,
        )?;
        self.save(
            "filter_comparison",
            &plots::filter_comparison(
                &conditioned.raw,
                &filtered,
                &format!("{} Strain Data ({})", Detector::H1.display_name(), event.name),
            ),
            &plots_dir,
        )?;
        self.save(
            "ASD_comparison",
            &plots::asd_comparison(
                &cropped_asd,
                &filtered_asd,
                &format!("ASD Before and After Filtering ({})", event.name),
            ),
            &plots_dir,
        )?;
        self.save(
            "filtered_strain",
            &plots::filtered_strain(
                &filtered,
                event.zoom,
                event.zoom.0,
                &format!("{} Strain Data ({})", Detector::H1.display_name(), event.name),
            ),
            &plots_dir,
        )?;

        self.trace.record(
            Stage::Comparison,
            format!("Fetching {} strain for comparison", Detector::L1),
        )?;
        let livingston_raw = source.fetch(Detector::L1, event.start_time, event.end_time, use_cache)?;
        let livingston_filter = filtering::design(livingston_raw.sample_rate())?;
        let livingston = filtering::apply(&livingston_raw, &livingston_filter, true)?
            .shifted(LIVINGSTON_SHIFT)
            .inverted();
        let comparisons_dir = self.config.comparisons_dir();
        self.save(
            "detector_comparison",
            &plots::detector_comparison(
                &filtered,
                &livingston,
                event.zoom,
                event.zoom.0,
                &format!("LIGO Strain Data ({})", event.name),
            ),
            &comparisons_dir,
        )?;

        self.trace.record(Stage::QTransform, "Computing Q-transform")?;
        let gram = spectral::q_transform(&filtered, &self.config.qtransform, event.qscan_segment())?;
        if let Some((time, frequency)) = gram.loudest_tile() {
            log::info!(
                "Loudest Q tile at {:.3} s, {:.1} Hz (energy {:.1})",
                time - event.event_time,
                frequency,
                gram.peak()
            );
        }
        self.save(
            "q_transform",
            &plots::q_transform(&gram, event.event_time, &format!("Q-transform ({})", event.name)),
            &plots_dir,
        )?;

        let audio = if generate_audio {
            self.trace.record(Stage::Audio, "Generating audio")?;
            let path = self.config.audio_dir.join(sonify::audio_filename(event.name));
            let audio = sonify::generate_audio(&filtered, event.event_time, self.config.audio_window, &path)?;
            self.record_artifact("audio", &path, Stage::Audio)?;
            Some(audio)
        } else {
            None
        };

        Ok((raw, filtered, audio))
    }

    /// Write `figure` as `<dir>/<event>_<kind>.svg`
    fn save(&mut self, kind: &str, figure: &Figure, dir: &Path) -> Result<(), AnalysisError> {
        let path = dir.join(format!("{}_{}.svg", self.event.name, kind));
        figure.save(&path)?;
        let stage = if kind == "detector_comparison" {
            Stage::Comparison
        } else if kind == "q_transform" {
            Stage::QTransform
        } else {
            Stage::Spectrum
        };
        self.record_artifact(kind, &path, stage)
    }

    fn record_artifact(&mut self, kind: &str, path: &Path, stage: Stage) -> Result<(), AnalysisError> {
        let bytes = fs::read(path).map_err(PlotError::from)?;
        let artifact = Artifact {
            kind: kind.to_string(),
            path: path.to_path_buf(),
            sha256: calculate_sha256(&bytes),
        };
        self.trace.record_with(
            stage,
            format!("Wrote {}", path.display()),
            json!({ "kind": artifact.kind, "path": artifact.path, "sha256": artifact.sha256 }),
        )?;
        self.artifacts.push(artifact);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::lookup;
    use crate::pipeline::trace::read_trace_file;
    use crate::spectral::QTransformSettings;
    use crate::strain::FetchCause;
    use std::cell::RefCell;
    use tempfile::TempDir;

    const RATE: f64 = 2048.0;

    /// White noise plus a short burst at the event time
    struct SyntheticSource {
        event_time: f64,
        fail_on: Option<Detector>,
        requests: RefCell<Vec<Detector>>,
    }

    impl SyntheticSource {
        fn new(event_time: f64) -> Self {
            SyntheticSource {
                event_time,
                fail_on: None,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl StrainSource for SyntheticSource {
        fn fetch(
            &self,
            detector: Detector,
            start_time: f64,
            end_time: f64,
            _use_cache: bool,
        ) -> Result<TimeSeries, FetchError> {
            self.requests.borrow_mut().push(detector);
            if self.fail_on == Some(detector) {
                return Err(FetchError::DataUnavailable {
                    detector,
                    start: start_time,
                    end: end_time,
                    source: FetchCause::NoFiles,
                });
            }

            let n = ((end_time - start_time) * RATE) as usize;
            let mut state: u64 = 0x2545_f491_4f6c_dd1d;
            let samples = (0..n)
                .map(|i| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    let noise = ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 1e-21;
                    let t = start_time + i as f64 / RATE - self.event_time;
                    let burst = 5e-21 * (-(t / 0.05).powi(2)).exp() * (2.0 * std::f64::consts::PI * 120.0 * t).sin();
                    noise + burst
                })
                .collect();
            Ok(TimeSeries::new(
                format!("{}:GWOSC-STRAIN", detector.code()),
                start_time,
                RATE,
                samples,
            ))
        }
    }

    fn test_config(root: &Path) -> AnalysisConfig {
        AnalysisConfig {
            output_dir: root.join("results"),
            audio_dir: root.join("audio"),
            qtransform: QTransformSettings {
                frequency_rows: 24,
                time_columns: 64,
                ..QTransformSettings::default()
            },
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_analyze_event_writes_all_artifacts() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        let event = lookup("GW150914").unwrap();
        let source = SyntheticSource::new(event.event_time);

        let report = analyze_event(event, &source, &config, true).unwrap();

        let kinds: Vec<&str> = report.artifacts.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "ASD",
                "filter_comparison",
                "ASD_comparison",
                "filtered_strain",
                "detector_comparison",
                "q_transform",
                "audio"
            ]
        );
        for artifact in &report.artifacts {
            assert!(artifact.path.exists(), "missing {}", artifact.path.display());
            assert_eq!(artifact.sha256.len(), 64);
        }
        assert!(temp
            .path()
            .join("results/comparisons/GW150914_detector_comparison.svg")
            .exists());
        assert!(temp.path().join("audio/gravitational_wave_GW150914.wav").exists());

        // Filtered series loses one second at each end
        assert!((report.filtered.duration() - (event.duration() - 2.0)).abs() < 1e-6);
        assert_eq!(report.raw.len(), (event.duration() * RATE) as usize);
        assert_eq!(report.audio.unwrap().sample_rate, RATE as u32);
        assert_eq!(*source.requests.borrow(), vec![Detector::H1, Detector::L1]);

        let entries = read_trace_file(&config.trace_path()).unwrap();
        assert!(entries.iter().all(|e| e.run_id == report.run_id));
        assert_eq!(entries.last().unwrap().stage, Stage::Complete);
    }

    #[test]
    fn test_analyze_event_without_audio() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        let event = lookup("GW150914").unwrap();

        let report = analyze_event(event, &SyntheticSource::new(event.event_time), &config, false).unwrap();

        assert!(report.audio.is_none());
        assert!(report.artifacts.iter().all(|a| a.kind != "audio"));
        assert!(!temp.path().join("audio").exists());
    }

    #[test]
    fn test_fetch_failure_aborts_later_stages() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        let event = lookup("GW150914").unwrap();
        let mut source = SyntheticSource::new(event.event_time);
        source.fail_on = Some(Detector::L1);

        let err = analyze_event(event, &source, &config, true).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Fetch(FetchError::DataUnavailable { detector: Detector::L1, .. })
        ));

        // Earlier plots remain; nothing from the comparison stage onwards
        assert!(config.plots_dir().join("GW150914_ASD.svg").exists());
        assert!(!config.comparisons_dir().exists());
        assert!(!config.plots_dir().join("GW150914_q_transform.svg").exists());
        assert!(!temp.path().join("audio").exists());

        let entries = read_trace_file(&config.trace_path()).unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last.stage, Stage::Failed);
        assert!(last.message.contains("L1"));
    }

    #[test]
    fn test_low_sample_rate_is_rejected() {
        struct SlowSource;
        impl StrainSource for SlowSource {
            fn fetch(&self, _: Detector, start: f64, end: f64, _: bool) -> Result<TimeSeries, FetchError> {
                let n = ((end - start) * 256.0) as usize;
                Ok(TimeSeries::new("H1:GWOSC-STRAIN", start, 256.0, vec![1e-21; n]))
            }
        }

        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        let event = lookup("GW150914").unwrap();

        let err = analyze_event(event, &SlowSource, &config, true).unwrap_err();
        assert!(matches!(err, AnalysisError::Filter(FilterError::InvalidSampleRate(r)) if r == 256.0));
        assert!(!config.plots_dir().exists());
    }
}
