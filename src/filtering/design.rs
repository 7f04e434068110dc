// Filter design
// Builds the fixed conditioning cascade as second-order sections:
// 50-250 Hz Butterworth band-pass followed by notches at the 60 Hz mains
// harmonics. Sections come from the bilinear transform with pre-warping.

use rustfft::num_complex::Complex64;
use std::f64::consts::PI;
use thiserror::Error;

/// Band-pass corner frequencies (Hz)
pub const BANDPASS_RANGE: (f64, f64) = (50.0, 250.0);

/// Mains interference harmonics removed by the notch sections (Hz)
pub const NOTCH_FREQUENCIES: [f64; 3] = [60.0, 120.0, 180.0];

/// -3 dB width of each notch (Hz)
pub const NOTCH_BANDWIDTH: f64 = 2.0;

/// Order of each Butterworth edge of the band-pass
pub const BUTTERWORTH_ORDER: usize = 4;

/// The band-pass upper edge needs the sample rate strictly above this (Hz)
pub const MIN_SAMPLE_RATE: f64 = 2.0 * BANDPASS_RANGE.1;

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("Invalid sample rate {0} Hz: must exceed 500 Hz")]
    InvalidSampleRate(f64),

    #[error("Invalid filter band: {0}")]
    InvalidBand(String),

    #[error("Filter designed for {filter} Hz applied to {series} Hz data")]
    RateMismatch { filter: f64, series: f64 },

    #[error("Insufficient data: {samples} samples, need more than {required}")]
    InsufficientData { samples: usize, required: usize },
}

/// One second-order IIR section, normalised so that a0 = 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    fn normalized(b: [f64; 3], a: [f64; 3]) -> Self {
        Biquad {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
        }
    }

    /// Second-order low-pass with quality factor `q`
    pub fn lowpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let (cos_w0, alpha) = prewarp(sample_rate, cutoff, q);
        let b1 = 1.0 - cos_w0;
        Biquad::normalized(
            [b1 / 2.0, b1, b1 / 2.0],
            [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
        )
    }

    /// Second-order high-pass with quality factor `q`
    pub fn highpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let (cos_w0, alpha) = prewarp(sample_rate, cutoff, q);
        let b0 = (1.0 + cos_w0) / 2.0;
        Biquad::normalized(
            [b0, -(1.0 + cos_w0), b0],
            [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
        )
    }

    /// Band-reject section with zeros on the unit circle at `center`
    pub fn notch(sample_rate: f64, center: f64, q: f64) -> Self {
        let (cos_w0, alpha) = prewarp(sample_rate, center, q);
        Biquad::normalized(
            [1.0, -2.0 * cos_w0, 1.0],
            [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
        )
    }

    /// Gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Transposed direct-form II state after a unit step has settled
    pub fn step_state(&self) -> [f64; 2] {
        let gain = self.dc_gain();
        let z2 = self.b2 - self.a2 * gain;
        let z1 = self.b1 - self.a1 * gain + z2;
        [z1, z2]
    }

    /// Complex response at normalised angular frequency `w` (rad/sample)
    pub fn response(&self, w: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = self.b0 + z1 * self.b1 + z2 * self.b2;
        let den = 1.0 + z1 * self.a1 + z2 * self.a2;
        num / den
    }

    /// Filter `input` in place starting from state `state`
    pub fn run(&self, input: &mut [f64], state: [f64; 2]) {
        let [mut z1, mut z2] = state;
        for x in input.iter_mut() {
            let y = self.b0 * *x + z1;
            z1 = self.b1 * *x - self.a1 * y + z2;
            z2 = self.b2 * *x - self.a2 * y;
            *x = y;
        }
    }
}

fn prewarp(sample_rate: f64, frequency: f64, q: f64) -> (f64, f64) {
    let w0 = 2.0 * PI * frequency / sample_rate;
    (w0.cos(), w0.sin() / (2.0 * q))
}

/// Quality factors of the biquads making up an even-order Butterworth filter
fn butterworth_qs(order: usize) -> Vec<f64> {
    (0..order / 2)
        .map(|k| 1.0 / (2.0 * ((2 * k + 1) as f64 * PI / (2 * order) as f64).sin()))
        .collect()
}

/// Cascade of second-order sections designed for one sample rate.
/// Immutable once built; reusable for any number of series at that rate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    sample_rate: f64,
    sections: Vec<Biquad>,
}

impl FilterSpec {
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude of the cascade response at `frequency` Hz (single pass)
    pub fn response_magnitude(&self, frequency: f64) -> f64 {
        let w = 2.0 * PI * frequency / self.sample_rate;
        self.sections
            .iter()
            .map(|section| section.response(w).norm())
            .product()
    }
}

fn check_sample_rate(sample_rate: f64) -> Result<(), FilterError> {
    if !sample_rate.is_finite() || sample_rate <= MIN_SAMPLE_RATE {
        return Err(FilterError::InvalidSampleRate(sample_rate));
    }
    Ok(())
}

/// Butterworth band-pass from `flow` to `fhigh` Hz
pub fn bandpass(flow: f64, fhigh: f64, sample_rate: f64) -> Result<FilterSpec, FilterError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(FilterError::InvalidSampleRate(sample_rate));
    }
    let nyquist = sample_rate / 2.0;
    if !(0.0 < flow && flow < fhigh && fhigh < nyquist) {
        return Err(FilterError::InvalidBand(format!(
            "{} - {} Hz at Nyquist {} Hz",
            flow, fhigh, nyquist
        )));
    }

    let qs = butterworth_qs(BUTTERWORTH_ORDER);
    let mut sections: Vec<Biquad> = qs
        .iter()
        .map(|&q| Biquad::highpass(sample_rate, flow, q))
        .collect();
    sections.extend(qs.iter().map(|&q| Biquad::lowpass(sample_rate, fhigh, q)));

    Ok(FilterSpec {
        sample_rate,
        sections,
    })
}

/// Notch at `frequency` Hz with the standard mains-line width
pub fn notch(frequency: f64, sample_rate: f64) -> Result<FilterSpec, FilterError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(FilterError::InvalidSampleRate(sample_rate));
    }
    if !(0.0 < frequency && frequency < sample_rate / 2.0) {
        return Err(FilterError::InvalidBand(format!(
            "notch at {} Hz for {} Hz sampling",
            frequency, sample_rate
        )));
    }

    Ok(FilterSpec {
        sample_rate,
        sections: vec![Biquad::notch(sample_rate, frequency, frequency / NOTCH_BANDWIDTH)],
    })
}

/// Chain several filters designed for the same sample rate
pub fn concatenate(filters: &[FilterSpec]) -> Result<FilterSpec, FilterError> {
    let first = filters
        .first()
        .ok_or_else(|| FilterError::InvalidBand("nothing to concatenate".to_string()))?;

    let mut sections = Vec::new();
    for filter in filters {
        if filter.sample_rate != first.sample_rate {
            return Err(FilterError::RateMismatch {
                filter: first.sample_rate,
                series: filter.sample_rate,
            });
        }
        sections.extend_from_slice(&filter.sections);
    }

    Ok(FilterSpec {
        sample_rate: first.sample_rate,
        sections,
    })
}

/// Design the conditioning cascade (band-pass then three notches) for `sample_rate`
pub fn design(sample_rate: f64) -> Result<FilterSpec, FilterError> {
    check_sample_rate(sample_rate)?;

    let mut parts = vec![bandpass(BANDPASS_RANGE.0, BANDPASS_RANGE.1, sample_rate)?];
    for &line in NOTCH_FREQUENCIES.iter() {
        parts.push(notch(line, sample_rate)?);
    }
    let cascade = concatenate(&parts)?;

    log::debug!(
        "Designed {}-{} Hz band-pass with notches at {:?} Hz: {} sections @ {} Hz",
        BANDPASS_RANGE.0,
        BANDPASS_RANGE.1,
        NOTCH_FREQUENCIES,
        cascade.sections.len(),
        sample_rate
    );

    Ok(cascade)
}
