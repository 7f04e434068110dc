// Visualization adapters
// Each adapter turns already-computed series into a Figure; nothing is
// filtered or transformed here beyond choosing what falls inside the view

use crate::catalog::Detector;
use crate::filtering::{BANDPASS_RANGE, NOTCH_FREQUENCIES};
use crate::plots::figure::{Axis, Figure, Heatmap, Line, Marker, Panel};
use crate::spectral::{FrequencySeries, QGram};
use crate::strain::TimeSeries;

const WIDE: (u32, u32) = (1200, 600);
const TALL: (u32, u32) = (1200, 900);

/// Frequency view shared by the ASD plots
const ASD_XLIM: (f64, f64) = (10.0, 2000.0);
const ASD_YLIM: (f64, f64) = (1e-24, 1e-19);

const COMPARISON_YLIM: f64 = 1e-21;

/// Detector colour inferred from the channel prefix ("H1:...")
fn trace_color(series: &TimeSeries) -> &'static str {
    series
        .name()
        .split(':')
        .next()
        .and_then(|code| code.parse::<Detector>().ok())
        .map(|detector| detector.color())
        .unwrap_or("black")
}

fn detector_label(series: &TimeSeries) -> String {
    series
        .name()
        .split(':')
        .next()
        .and_then(|code| code.parse::<Detector>().ok())
        .map(|detector| detector.display_name().to_string())
        .unwrap_or_else(|| series.name().to_string())
}

/// (time, strain) pairs, restricted to `window` when given
fn time_points(series: &TimeSeries, window: Option<(f64, f64)>) -> Vec<(f64, f64)> {
    let view = match window {
        Some((start, end)) => series.cropped(start, end),
        None => series.clone(),
    };
    view.times().into_iter().zip(view.samples().iter().copied()).collect()
}

fn frequency_points(asd: &FrequencySeries) -> Vec<(f64, f64)> {
    asd.band(ASD_XLIM.0, ASD_XLIM.1)
}

fn notch_markers(color: &str) -> Vec<Marker> {
    NOTCH_FREQUENCIES
        .iter()
        .map(|&f| Marker::VLine {
            x: f,
            color: color.to_string(),
            opacity: 0.5,
        })
        .collect()
}

fn asd_panel() -> Panel {
    Panel::new(
        Axis::log("Frequency [Hz]").with_limits(ASD_XLIM.0, ASD_XLIM.1),
        Axis::log("ASD [strain/\u{221a}Hz]").with_limits(ASD_YLIM.0, ASD_YLIM.1),
    )
}

/// Amplitude spectral density of one detector with the notch frequencies marked
pub fn spectral_density(asd: &FrequencySeries, title: &str) -> Figure {
    let mut panel = asd_panel();
    panel.title = Some(title.to_string());
    panel.lines.push(Line::new(frequency_points(asd), "blue"));
    panel.markers = notch_markers("red");

    Figure::new(WIDE.0, WIDE.1).with_panel(panel)
}

/// Raw and filtered strain stacked in two panels
pub fn filter_comparison(raw: &TimeSeries, filtered: &TimeSeries, title: &str) -> Figure {
    let panel = |series: &TimeSeries, note: &str| {
        let mut panel = Panel::new(
            Axis::linear("Time [s]").with_epoch(series.start_time()),
            Axis::linear("Strain Amplitude"),
        );
        panel.note = Some(note.to_string());
        panel.lines.push(Line::new(time_points(series, None), "black"));
        panel
    };

    let mut top = panel(raw, "Raw Data");
    top.title = Some(title.to_string());
    let bottom = panel(
        filtered,
        "50-250 Hz Bandpass, 60/120/180 Hz Notch Filters",
    );

    Figure::new(TALL.0, TALL.1).with_panel(top).with_panel(bottom)
}

/// Raw and filtered ASD overlaid, with the pass band shaded
pub fn asd_comparison(raw: &FrequencySeries, filtered: &FrequencySeries, title: &str) -> Figure {
    let mut panel = asd_panel();
    panel.title = Some(title.to_string());
    panel.legend = true;

    panel.markers.push(Marker::Span {
        x0: BANDPASS_RANGE.0,
        x1: BANDPASS_RANGE.1,
        color: "green".to_string(),
        opacity: 0.1,
        label: Some(format!(
            "Bandpass Region ({}-{} Hz)",
            BANDPASS_RANGE.0, BANDPASS_RANGE.1
        )),
    });
    panel.markers.extend(notch_markers("orange"));

    panel.lines.push(
        Line::new(frequency_points(raw), "red")
            .styled(1.5, 0.7)
            .labelled("Raw Data"),
    );
    panel.lines.push(
        Line::new(frequency_points(filtered), "blue")
            .styled(1.5, 0.7)
            .labelled("Filtered Data"),
    );

    Figure::new(WIDE.0, WIDE.1).with_panel(panel)
}

/// Filtered strain inside the event's zoom window
pub fn filtered_strain(filtered: &TimeSeries, zoom: (f64, f64), epoch: f64, title: &str) -> Figure {
    let mut panel = Panel::new(
        Axis::linear("Time [s]")
            .with_limits(zoom.0, zoom.1)
            .with_epoch(epoch),
        Axis::linear("Strain Amplitude"),
    );
    panel.title = Some(title.to_string());
    panel
        .lines
        .push(Line::new(time_points(filtered, Some(zoom)), trace_color(filtered)));

    Figure::new(WIDE.0, WIDE.1).with_panel(panel)
}

/// Both detectors overlaid; `livingston` is expected to be aligned already
pub fn detector_comparison(
    hanford: &TimeSeries,
    livingston: &TimeSeries,
    xlim: (f64, f64),
    epoch: f64,
    title: &str,
) -> Figure {
    let mut panel = Panel::new(
        Axis::linear("Time [s]")
            .with_limits(xlim.0, xlim.1)
            .with_epoch(epoch),
        Axis::linear("Strain Amplitude").with_limits(-COMPARISON_YLIM, COMPARISON_YLIM),
    );
    panel.title = Some(title.to_string());
    panel.legend = true;

    for series in [hanford, livingston] {
        panel.lines.push(
            Line::new(time_points(series, Some(xlim)), trace_color(series))
                .labelled(detector_label(series)),
        );
    }

    Figure::new(WIDE.0, WIDE.1).with_panel(panel)
}

/// Normalised Q-transform energy as a time-frequency heat map
pub fn q_transform(gram: &QGram, event_time: f64, title: &str) -> Figure {
    let mut y_axis = Axis::log("Frequency [Hz]");
    if let (Some(&low), Some(&high)) = (gram.frequencies.first(), gram.frequencies.last()) {
        y_axis = y_axis.with_limits(low, high);
    }
    let mut x_axis = Axis::linear("Time [s]").with_epoch(event_time);
    if let (Some(&start), Some(&end)) = (gram.times.first(), gram.times.last()) {
        x_axis = x_axis.with_limits(start, end);
    }

    let mut panel = Panel::new(x_axis, y_axis);
    panel.title = Some(title.to_string());
    panel.heatmap = Some(Heatmap {
        x: gram.times.clone(),
        y: gram.frequencies.clone(),
        values: gram.energy.clone(),
        label: "Normalized Energy".to_string(),
    });

    Figure::new(WIDE.0, WIDE.1).with_panel(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn series(name: &str, start: f64, rate: f64, len: usize) -> TimeSeries {
        let samples = (0..len).map(|i| (i as f64 * 0.3).sin() * 1e-21).collect();
        TimeSeries::new(name, start, rate, samples)
    }

    #[test]
    fn test_trace_color_from_channel() {
        assert_eq!(trace_color(&series("L1:GWOSC-STRAIN", 0.0, 10.0, 4)), "gray");
        assert_eq!(trace_color(&series("H1:GWOSC-STRAIN", 0.0, 10.0, 4)), "black");
        assert_eq!(trace_color(&series("synthetic", 0.0, 10.0, 4)), "black");
        assert_eq!(detector_label(&series("L1:GWOSC-STRAIN", 0.0, 10.0, 4)), "LIGO-Livingston");
    }

    #[test]
    fn test_spectral_density_limits_and_notches() {
        let asd = FrequencySeries {
            df: 1.0,
            values: vec![1e-22; 4097],
        };
        let figure = spectral_density(&asd, "GW150914 H1 ASD");
        let panel = &figure.panels[0];

        assert_eq!(panel.x_axis.limits, Some(ASD_XLIM));
        assert_eq!(panel.markers.len(), NOTCH_FREQUENCIES.len());
        let first = panel.lines[0].points.first().unwrap().0;
        assert!(first >= 10.0);
    }

    #[test]
    fn test_filter_comparison_has_two_panels() {
        let raw = series("H1:GWOSC-STRAIN", 100.0, 64.0, 256);
        let figure = filter_comparison(&raw, &raw, "comparison");

        assert_eq!(figure.panels.len(), 2);
        assert_eq!(figure.panels[0].note.as_deref(), Some("Raw Data"));
        assert_eq!(figure.panels[1].lines[0].points.len(), 256);
    }

    #[test]
    fn test_asd_comparison_legend() {
        let asd = FrequencySeries {
            df: 0.5,
            values: vec![1e-22; 2000],
        };
        let figure = asd_comparison(&asd, &asd, "asd");
        let panel = &figure.panels[0];

        assert!(panel.legend);
        assert_eq!(panel.lines.len(), 2);
        assert!(matches!(
            &panel.markers[0],
            Marker::Span { label: Some(label), .. } if label == "Bandpass Region (50-250 Hz)"
        ));
    }

    #[test]
    fn test_detector_comparison_crops_to_view() {
        let h1 = series("H1:GWOSC-STRAIN", 0.0, 100.0, 1000);
        let l1 = h1.shifted(0.0069).inverted();
        let l1 = TimeSeries::new("L1:GWOSC-STRAIN", l1.start_time(), l1.sample_rate(), l1.samples().to_vec());

        let figure = detector_comparison(&h1, &l1, (2.0, 3.0), 2.5, "H1 vs L1");
        let panel = &figure.panels[0];

        assert_eq!(panel.y_axis.limits, Some((-1e-21, 1e-21)));
        assert_eq!(panel.lines[0].points.len(), 100);
        assert_eq!(panel.lines[1].color, "gray");
        assert!(panel.lines.iter().all(|line| line.points.iter().all(|p| p.0 >= 2.0 && p.0 < 3.0)));
    }

    #[test]
    fn test_q_transform_figure_saves() {
        let gram = QGram {
            times: vec![0.0, 0.5, 1.0],
            frequencies: vec![30.0, 100.0, 500.0],
            energy: vec![vec![1.0; 3], vec![2.0; 3], vec![20.0; 3]],
            q: 8.0,
        };
        let figure = q_transform(&gram, 0.5, "q");
        assert_eq!(figure.panels[0].y_axis.limits, Some((30.0, 500.0)));

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plots/q.svg");
        figure.save(&path).unwrap();
        assert!(path.exists());
    }
}
