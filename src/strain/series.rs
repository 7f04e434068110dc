// Uniformly sampled strain time series
// Plain value type: start time, sample rate and samples, nothing hidden

use serde::{Deserialize, Serialize};

/// Real-valued series sampled uniformly from `start_time` at `sample_rate`.
///
/// Sample `i` sits at `start_time + i / sample_rate`. The sample rate is
/// always positive; every producer in this crate guarantees it. Series are
/// never mutated after construction: transformations return new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    name: String,
    start_time: f64,
    sample_rate: f64,
    samples: Vec<f64>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>, start_time: f64, sample_rate: f64, samples: Vec<f64>) -> Self {
        debug_assert!(sample_rate > 0.0, "sample rate must be positive");
        TimeSeries {
            name: name.into(),
            start_time,
            sample_rate,
            samples,
        }
    }

    /// Channel label (e.g., "H1:GWOSC-STRAIN")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// GPS time of the first sample
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Samples per second
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample spacing in seconds
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Span covered in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// GPS time just past the last sample
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration()
    }

    /// Timestamp of sample `index`
    pub fn time_at(&self, index: usize) -> f64 {
        self.start_time + index as f64 / self.sample_rate
    }

    /// Timestamps of every sample
    pub fn times(&self) -> Vec<f64> {
        (0..self.samples.len()).map(|i| self.time_at(i)).collect()
    }

    /// Same metadata, different samples
    pub fn with_samples(&self, samples: Vec<f64>) -> TimeSeries {
        TimeSeries::new(self.name.clone(), self.start_time, self.sample_rate, samples)
    }

    /// Drop `head` samples from the start and `tail` samples from the end
    pub fn trimmed(&self, head: usize, tail: usize) -> TimeSeries {
        let end = self.samples.len().saturating_sub(tail);
        let start = head.min(end);
        TimeSeries::new(
            self.name.clone(),
            self.time_at(start),
            self.sample_rate,
            self.samples[start..end].to_vec(),
        )
    }

    /// Samples with timestamps in `[start, end)`
    pub fn cropped(&self, start: f64, end: f64) -> TimeSeries {
        let first = self.index_at_or_after(start);
        let last = self.index_at_or_after(end).max(first);
        self.trimmed(first, self.samples.len() - last)
    }

    /// Copy of the series moved later in time by `seconds`
    pub fn shifted(&self, seconds: f64) -> TimeSeries {
        TimeSeries::new(
            self.name.clone(),
            self.start_time + seconds,
            self.sample_rate,
            self.samples.clone(),
        )
    }

    /// Copy of the series with every sample negated
    pub fn inverted(&self) -> TimeSeries {
        self.with_samples(self.samples.iter().map(|s| -s).collect())
    }

    /// Largest absolute sample value (0.0 for an empty series)
    pub fn peak(&self) -> f64 {
        self.samples.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()))
    }

    fn index_at_or_after(&self, t: f64) -> usize {
        // Tolerate float noise when `t` lands on a sample
        let offset = ((t - self.start_time) * self.sample_rate - 1e-6).ceil();
        if offset <= 0.0 {
            0
        } else {
            (offset as usize).min(self.samples.len())
        }
    }
}
