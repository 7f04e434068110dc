// Amplitude spectral density
// Welch estimate: Hann-windowed, mean-removed segments averaged into a
// one-sided power density, reported as its square root (strain/sqrt(Hz))

use realfft::RealFftPlanner;
use serde::Serialize;
use std::f64::consts::PI;
use thiserror::Error;

use crate::strain::TimeSeries;

#[derive(Debug, Error, PartialEq)]
pub enum SpectralError {
    #[error("Not enough data: {samples} samples, need {required}")]
    TooShort { samples: usize, required: usize },

    #[error("Invalid spectral settings: {0}")]
    InvalidSettings(String),

    #[error("FFT failed: {0}")]
    Fft(String),
}

/// Values on a uniform frequency grid starting at 0 Hz
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencySeries {
    /// Bin spacing in Hz
    pub df: f64,
    pub values: Vec<f64>,
}

impl FrequencySeries {
    /// Frequency of every bin
    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.values.len()).map(|i| i as f64 * self.df).collect()
    }

    /// Value of the bin nearest to `frequency`
    pub fn value_at(&self, frequency: f64) -> Option<f64> {
        if frequency < 0.0 || self.df <= 0.0 {
            return None;
        }
        let bin = (frequency / self.df).round() as usize;
        self.values.get(bin).copied()
    }

    /// (frequency, value) pairs restricted to `[fmin, fmax]`
    pub fn band(&self, fmin: f64, fmax: f64) -> Vec<(f64, f64)> {
        self.frequencies()
            .into_iter()
            .zip(self.values.iter().copied())
            .filter(|(f, _)| *f >= fmin && *f <= fmax)
            .collect()
    }
}

/// Periodic Hann window of length `n`
fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / n as f64).cos()))
        .collect()
}

/// Welch amplitude spectral density of `series`.
///
/// `fft_length` is the segment length in seconds (clamped to the series
/// length); `overlap` is the fraction of each segment shared with the next.
pub fn asd(series: &TimeSeries, fft_length: f64, overlap: f64) -> Result<FrequencySeries, SpectralError> {
    if !(fft_length > 0.0) || !(0.0..1.0).contains(&overlap) {
        return Err(SpectralError::InvalidSettings(format!(
            "fft length {} s, overlap {}",
            fft_length, overlap
        )));
    }

    let sample_rate = series.sample_rate();
    let segment = ((fft_length * sample_rate).round() as usize).min(series.len());
    if segment < 2 {
        return Err(SpectralError::TooShort {
            samples: series.len(),
            required: 2,
        });
    }
    let step = (segment - (overlap * segment as f64).round() as usize).max(1);

    let window = hann_window(segment);
    let scale = 1.0 / (sample_rate * window.iter().map(|w| w * w).sum::<f64>());

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(segment);
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();
    let mut power = vec![0.0; spectrum.len()];

    let samples = series.samples();
    let mut segments = 0usize;
    let mut start = 0usize;
    while start + segment <= samples.len() {
        let chunk = &samples[start..start + segment];
        let mean = chunk.iter().sum::<f64>() / segment as f64;
        for ((slot, &x), &w) in input.iter_mut().zip(chunk).zip(&window) {
            *slot = (x - mean) * w;
        }

        fft.process(&mut input, &mut spectrum)
            .map_err(|e| SpectralError::Fft(e.to_string()))?;

        for (acc, bin) in power.iter_mut().zip(&spectrum) {
            *acc += bin.norm_sqr();
        }

        segments += 1;
        start += step;
    }

    // One-sided: fold negative frequencies into every bin but DC (and Nyquist)
    let last = power.len() - 1;
    let values = power
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let fold = if i == 0 || (segment % 2 == 0 && i == last) { 1.0 } else { 2.0 };
            (p * scale * fold / segments as f64).sqrt()
        })
        .collect();

    Ok(FrequencySeries {
        df: sample_rate / segment as f64,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = hann_window(100);
        // Window should taper at edges
        assert!(window[0] < 0.1);
        assert!(window[99] < 0.1);
        assert!(window[50] > 0.9);
    }

    #[test]
    fn test_asd_peak_at_tone() {
        let rate = 1024.0;
        let samples: Vec<f64> = (0..8192)
            .map(|i| (2.0 * PI * 100.0 * i as f64 / rate).sin())
            .collect();
        let series = TimeSeries::new("X1:TEST", 0.0, rate, samples);

        let density = asd(&series, 1.0, 0.5).unwrap();
        assert_eq!(density.df, 1.0);
        assert_eq!(density.values.len(), 513);

        let (peak_bin, _) = density
            .values
            .iter()
            .enumerate()
            .fold((0, 0.0), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(peak_bin, 100);
    }

    #[test]
    fn test_white_noise_level() {
        // Deterministic pseudo-random noise with unit variance
        let rate = 256.0;
        let mut state: u64 = 12345;
        let samples: Vec<f64> = (0..256 * 64)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 12f64.sqrt()
            })
            .collect();
        let series = TimeSeries::new("X1:TEST", 0.0, rate, samples);

        let density = asd(&series, 4.0, 0.5).unwrap();
        // One-sided white noise: PSD = 2 * variance / fs
        let expected = (2.0 / rate).sqrt();
        let mid: Vec<f64> = density.band(20.0, 100.0).into_iter().map(|(_, v)| v).collect();
        let mean = mid.iter().sum::<f64>() / mid.len() as f64;
        assert!((mean - expected).abs() / expected < 0.1, "mean {} expected {}", mean, expected);
    }

    #[test]
    fn test_asd_rejects_bad_settings() {
        let series = TimeSeries::new("X1:TEST", 0.0, 16.0, vec![0.0; 64]);
        assert!(matches!(asd(&series, 0.0, 0.5), Err(SpectralError::InvalidSettings(_))));
        assert!(matches!(asd(&series, 1.0, 1.0), Err(SpectralError::InvalidSettings(_))));

        let tiny = TimeSeries::new("X1:TEST", 0.0, 16.0, vec![0.0; 1]);
        assert!(matches!(asd(&tiny, 1.0, 0.5), Err(SpectralError::TooShort { .. })));
    }

    #[test]
    fn test_value_at_and_band() {
        let fs = FrequencySeries {
            df: 0.5,
            values: vec![1.0, 2.0, 3.0, 4.0],
        };
        assert_eq!(fs.value_at(1.0), Some(3.0));
        assert_eq!(fs.value_at(10.0), None);
        assert_eq!(fs.band(0.5, 1.0), vec![(0.5, 2.0), (1.0, 3.0)]);
    }
}
