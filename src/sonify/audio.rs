// Strain to audio conversion
// Select a window around the event, normalise to the peak, infer the sample
// rate from the timestamps and quantise to signed 16-bit

use thiserror::Error;

use crate::strain::TimeSeries;

/// Full-scale value of a signed 16-bit sample
pub const AMPLITUDE: f64 = i16::MAX as f64;

#[derive(Debug, Error)]
pub enum SonifyError {
    #[error("No samples within {window} s of GPS {center}")]
    EmptySelection { center: f64, window: f64 },

    #[error("Selected signal is all zeros; cannot normalise")]
    DegenerateSignal,

    #[error("Need at least two samples to infer a sample rate, got {0}")]
    TooFewSamples(usize),

    #[error("Timestamps do not give a usable sample rate (median spacing {0} s)")]
    InvalidTimestamps(f64),

    #[error("Failed to write WAV file: {0}")]
    WavWrite(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mono 16-bit PCM samples at an integer rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Quantised samples in [-32768, 32767]
    pub samples: Vec<i16>,
}

impl AudioBuffer {
    /// Playback length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Median of a non-empty slice (mean of the middle pair for even lengths)
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample rate implied by timestamps: `round(1 / median(diff(times)))`.
/// The median keeps the estimate stable under isolated jitter or dropouts.
pub fn infer_sample_rate(times: &[f64]) -> Result<u32, SonifyError> {
    if times.len() < 2 {
        return Err(SonifyError::TooFewSamples(times.len()));
    }

    let spacings: Vec<f64> = times.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let spacing = median(&spacings);
    let rate = (1.0 / spacing).round();

    if !spacing.is_finite() || spacing <= 0.0 || rate < 1.0 || rate > u32::MAX as f64 {
        return Err(SonifyError::InvalidTimestamps(spacing));
    }

    Ok(rate as u32)
}

/// Convert the samples with `center_time - time_window < t < center_time + time_window`
/// into 16-bit audio.
///
/// `times` and `amplitudes` are paired element-wise; `times` must be increasing.
pub fn signal_to_audio(
    times: &[f64],
    amplitudes: &[f64],
    center_time: f64,
    time_window: f64,
) -> Result<AudioBuffer, SonifyError> {
    let lower = center_time - time_window;
    let upper = center_time + time_window;

    let (selected_times, selected): (Vec<f64>, Vec<f64>) = times
        .iter()
        .zip(amplitudes)
        .filter(|&(&t, _)| t > lower && t < upper)
        .map(|(&t, &y)| (t, y))
        .unzip();

    if selected.is_empty() {
        return Err(SonifyError::EmptySelection {
            center: center_time,
            window: time_window,
        });
    }

    let peak = selected.iter().fold(0.0_f64, |acc, y| acc.max(y.abs()));
    if peak == 0.0 {
        return Err(SonifyError::DegenerateSignal);
    }

    let sample_rate = infer_sample_rate(&selected_times)?;

    let samples = selected
        .iter()
        .map(|y| {
            (y / peak * AMPLITUDE)
                .round()
                .clamp(i16::MIN as f64, i16::MAX as f64) as i16
        })
        .collect();

    Ok(AudioBuffer {
        sample_rate,
        samples,
    })
}

/// Convert the part of `series` within `time_window` seconds of `center_time` to audio
pub fn to_audio(series: &TimeSeries, center_time: f64, time_window: f64) -> Result<AudioBuffer, SonifyError> {
    let audio = signal_to_audio(&series.times(), series.samples(), center_time, time_window)?;

    log::info!(
        "Audio sample rate: {} Hz, length: {:.2} s",
        audio.sample_rate,
        audio.duration_secs()
    );

    Ok(audio)
}
