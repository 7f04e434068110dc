// Q-transform
// Single-Q time-frequency decomposition: the data spectrum is tiled with
// bi-square windows whose bandwidth scales with frequency, each tile is
// inverse-transformed to an energy time series and normalised by its median

use realfft::RealFftPlanner;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use crate::spectral::asd::SpectralError;
use crate::strain::TimeSeries;

/// Configuration for the Q-transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QTransformSettings {
    /// Quality factor (centre frequency / bandwidth scale)
    pub q: f64,

    /// Lowest and highest frequency rows in Hz
    pub frange: (f64, f64),

    /// Number of logarithmically spaced frequency rows
    pub frequency_rows: usize,

    /// Number of uniformly spaced output time columns
    pub time_columns: usize,
}

impl Default for QTransformSettings {
    fn default() -> Self {
        QTransformSettings {
            q: 8.0,
            frange: (30.0, 500.0),
            frequency_rows: 96,
            time_columns: 400,
        }
    }
}

/// Normalised energy on a time x frequency grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QGram {
    /// Column times (GPS seconds)
    pub times: Vec<f64>,

    /// Row centre frequencies (Hz), ascending
    pub frequencies: Vec<f64>,

    /// `energy[row][column]`, median-normalised per row
    pub energy: Vec<Vec<f64>>,

    pub q: f64,
}

impl QGram {
    /// Largest normalised energy on the grid
    pub fn peak(&self) -> f64 {
        self.energy
            .iter()
            .flatten()
            .fold(0.0_f64, |acc, &e| acc.max(e))
    }

    /// (time, frequency) of the loudest tile
    pub fn loudest_tile(&self) -> Option<(f64, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for (row, values) in self.energy.iter().enumerate() {
            for (column, &e) in values.iter().enumerate() {
                if best.map_or(true, |(_, _, b)| e > b) {
                    best = Some((row, column, e));
                }
            }
        }
        best.map(|(row, column, _)| (self.times[column], self.frequencies[row]))
    }
}

fn log_spaced(low: f64, high: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![low];
    }
    let ratio = (high / low).ln() / (count - 1) as f64;
    (0..count).map(|i| low * (ratio * i as f64).exp()).collect()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn validate(series: &TimeSeries, settings: &QTransformSettings, outseg: (f64, f64)) -> Result<(), SpectralError> {
    let (fmin, fmax) = settings.frange;
    let nyquist = series.sample_rate() / 2.0;

    if !(settings.q > 0.0) {
        return Err(SpectralError::InvalidSettings(format!("q must be positive, got {}", settings.q)));
    }
    if !(0.0 < fmin && fmin < fmax && fmax < nyquist) {
        return Err(SpectralError::InvalidSettings(format!(
            "frequency range {} - {} Hz with Nyquist {} Hz",
            fmin, fmax, nyquist
        )));
    }
    if settings.frequency_rows == 0 || settings.time_columns == 0 {
        return Err(SpectralError::InvalidSettings("empty output grid".to_string()));
    }
    if !(outseg.0 < outseg.1) || outseg.0 < series.start_time() || outseg.1 > series.end_time() {
        return Err(SpectralError::InvalidSettings(format!(
            "output segment [{}, {}] outside data [{}, {}]",
            outseg.0,
            outseg.1,
            series.start_time(),
            series.end_time()
        )));
    }
    if series.len() < 4 {
        return Err(SpectralError::TooShort {
            samples: series.len(),
            required: 4,
        });
    }
    Ok(())
}

/// Q-transform of `series`, reported over `outseg` (GPS start, end)
pub fn q_transform(
    series: &TimeSeries,
    settings: &QTransformSettings,
    outseg: (f64, f64),
) -> Result<QGram, SpectralError> {
    validate(series, settings, outseg)?;

    let n = series.len();
    let duration = series.duration();

    let mut real_planner = RealFftPlanner::<f64>::new();
    let forward = real_planner.plan_fft_forward(n);
    let mut input = series.samples().to_vec();
    let mut spectrum = forward.make_output_vec();
    forward
        .process(&mut input, &mut spectrum)
        .map_err(|e| SpectralError::Fft(e.to_string()))?;

    // Bandwidth scale of the bi-square window
    let q_prime = settings.q / 11f64.sqrt();
    let frequencies = log_spaced(settings.frange.0, settings.frange.1, settings.frequency_rows);

    let column_step = (outseg.1 - outseg.0) / settings.time_columns as f64;
    let times: Vec<f64> = (0..settings.time_columns)
        .map(|i| outseg.0 + (i as f64 + 0.5) * column_step)
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let mut energy = Vec::with_capacity(frequencies.len());

    for &frequency in &frequencies {
        let center = frequency * duration;
        let half_width = (frequency / q_prime * duration).max(1.0);
        let lowest = (center - half_width).ceil().max(0.0) as usize;
        let highest = ((center + half_width).floor() as usize).min(spectrum.len() - 1);
        let width = highest + 1 - lowest;

        // Baseband the tile: bin `center` lands on index 0
        let mut tile = vec![Complex64::new(0.0, 0.0); width];
        let offset = center.round() as i64;
        for k in lowest..=highest {
            let x = (k as f64 - center) / half_width;
            let weight = (1.0 - x * x).powi(2);
            let slot = (k as i64 - offset).rem_euclid(width as i64) as usize;
            tile[slot] += spectrum[k] * weight;
        }

        planner.plan_fft_inverse(width).process(&mut tile);

        let row: Vec<f64> = tile.iter().map(|c| c.norm_sqr()).collect();
        let level = median(&row);
        let row_dt = duration / width as f64;

        let normalised = times
            .iter()
            .map(|&t| {
                let value = interpolate(&row, (t - series.start_time()) / row_dt);
                if level > 0.0 {
                    value / level
                } else {
                    value
                }
            })
            .collect();
        energy.push(normalised);
    }

    Ok(QGram {
        times,
        frequencies,
        energy,
        q: settings.q,
    })
}

/// Linear interpolation of `values` at fractional index `position`
fn interpolate(values: &[f64], position: f64) -> f64 {
    let last = values.len() - 1;
    if position <= 0.0 {
        return values[0];
    }
    let lower = position.floor() as usize;
    if lower >= last {
        return values[last];
    }
    let frac = position - lower as f64;
    values[lower] * (1.0 - frac) + values[lower + 1] * frac
}
