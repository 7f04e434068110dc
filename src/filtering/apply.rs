// Filter application
// Zero-phase (forward-backward) filtering of a strain series with a designed
// cascade, plus cropping of the edge transients

use crate::filtering::design::{FilterError, FilterSpec};
use crate::strain::TimeSeries;

/// Raw and filtered strain over the same (cropped) span
#[derive(Debug, Clone)]
pub struct Conditioned {
    pub raw: TimeSeries,
    pub filtered: TimeSeries,
}

/// Number of samples trimmed from each end when cropping edges (one second)
fn edge_samples(sample_rate: f64) -> usize {
    sample_rate.round() as usize
}

/// Odd-extension length used on each side before forward-backward filtering
fn pad_length(filter: &FilterSpec) -> usize {
    let sections = filter.sections();
    let zero_b2 = sections.iter().filter(|s| s.b2 == 0.0).count();
    let zero_a2 = sections.iter().filter(|s| s.a2 == 0.0).count();
    let taps = 2 * sections.len() + 1 - zero_b2.min(zero_a2);
    3 * taps
}

/// Forward-backward filter `samples` through the cascade.
///
/// The signal is extended at both ends by odd reflection, each section starts
/// from its steady state scaled to the first sample, and the padding is
/// removed afterwards, so the output has the same length as the input and no
/// phase lag.
pub fn filtfilt(samples: &[f64], filter: &FilterSpec) -> Result<Vec<f64>, FilterError> {
    let pad = pad_length(filter);
    if samples.len() <= pad {
        return Err(FilterError::InsufficientData {
            samples: samples.len(),
            required: pad,
        });
    }

    let n = samples.len();
    let first = samples[0];
    let last = samples[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - samples[i]));
    extended.extend_from_slice(samples);
    extended.extend((1..=pad).map(|i| 2.0 * last - samples[n - 1 - i]));

    run_cascade(filter, &mut extended);
    extended.reverse();
    run_cascade(filter, &mut extended);
    extended.reverse();

    Ok(extended[pad..pad + n].to_vec())
}

/// One pass through every section, each initialised to the steady state
/// for a constant input equal to the leading sample
fn run_cascade(filter: &FilterSpec, signal: &mut [f64]) {
    if signal.is_empty() {
        return;
    }

    // Input level seen by the current section
    let mut level = signal[0];
    for section in filter.sections() {
        let [z1, z2] = section.step_state();
        section.run(signal, [z1 * level, z2 * level]);
        level *= section.dc_gain();
    }
}

/// Apply `filter` to `series` with zero phase.
///
/// With `crop_edges`, one second is removed from each end of the result to
/// discard the filter's edge transients; the series must then be longer than
/// two seconds.
pub fn apply(series: &TimeSeries, filter: &FilterSpec, crop_edges: bool) -> Result<TimeSeries, FilterError> {
    Ok(condition(series, filter, crop_edges)?.filtered)
}

/// Filter `series` and return it alongside the raw data cropped to the same span
pub fn condition(series: &TimeSeries, filter: &FilterSpec, crop_edges: bool) -> Result<Conditioned, FilterError> {
    if series.sample_rate() != filter.sample_rate() {
        return Err(FilterError::RateMismatch {
            filter: filter.sample_rate(),
            series: series.sample_rate(),
        });
    }

    let edge = if crop_edges {
        edge_samples(series.sample_rate())
    } else {
        0
    };
    if crop_edges && series.len() <= 2 * edge {
        return Err(FilterError::InsufficientData {
            samples: series.len(),
            required: 2 * edge,
        });
    }

    let filtered = series.with_samples(filtfilt(series.samples(), filter)?);

    Ok(Conditioned {
        raw: series.trimmed(edge, edge),
        filtered: filtered.trimmed(edge, edge),
    })
}
