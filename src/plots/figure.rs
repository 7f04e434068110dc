// Figure model
// Plain data describing what to draw; no computation happens here

use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Nothing to plot: {0}")]
    Empty(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scale {
    Linear,
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub label: String,
    pub scale: Scale,

    /// Fixed (min, max); derived from the data when absent
    pub limits: Option<(f64, f64)>,

    /// Tick labels are shown relative to this value (e.g., a GPS epoch)
    pub epoch: Option<f64>,
}

impl Axis {
    pub fn linear(label: impl Into<String>) -> Self {
        Axis {
            label: label.into(),
            scale: Scale::Linear,
            limits: None,
            epoch: None,
        }
    }

    pub fn log(label: impl Into<String>) -> Self {
        Axis {
            label: label.into(),
            scale: Scale::Log,
            limits: None,
            epoch: None,
        }
    }

    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.limits = Some((min, max));
        self
    }

    pub fn with_epoch(mut self, epoch: f64) -> Self {
        self.epoch = Some(epoch);
        self
    }
}

/// Poly-line trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub points: Vec<(f64, f64)>,
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    /// Legend entry
    pub label: Option<String>,
}

impl Line {
    pub fn new(points: Vec<(f64, f64)>, color: impl Into<String>) -> Self {
        Line {
            points,
            color: color.into(),
            width: 1.0,
            opacity: 1.0,
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn styled(mut self, width: f64, opacity: f64) -> Self {
        self.width = width;
        self.opacity = opacity;
        self
    }
}

/// Annotations drawn behind the traces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Marker {
    /// Vertical dashed line at `x`
    VLine { x: f64, color: String, opacity: f64 },

    /// Shaded band between `x0` and `x1`
    Span {
        x0: f64,
        x1: f64,
        color: String,
        opacity: f64,
        label: Option<String>,
    },
}

/// Colour-mapped grid: `values[row][column]` at (`x[column]`, `y[row]`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub values: Vec<Vec<f64>>,
    /// Colour bar caption
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub title: Option<String>,

    /// Right-aligned caption above the plot area
    pub note: Option<String>,

    pub x_axis: Axis,
    pub y_axis: Axis,
    pub lines: Vec<Line>,
    pub markers: Vec<Marker>,
    pub heatmap: Option<Heatmap>,
    pub legend: bool,
}

impl Panel {
    pub fn new(x_axis: Axis, y_axis: Axis) -> Self {
        Panel {
            title: None,
            note: None,
            x_axis,
            y_axis,
            lines: Vec::new(),
            markers: Vec::new(),
            heatmap: None,
            legend: false,
        }
    }

    /// Data extent along x over lines and heat-map
    pub fn x_extent(&self) -> Option<(f64, f64)> {
        let mut xs: Vec<f64> = self
            .lines
            .iter()
            .flat_map(|line| line.points.iter().map(|p| p.0))
            .collect();
        if let Some(map) = &self.heatmap {
            xs.extend_from_slice(&map.x);
        }
        extent(xs, self.x_axis.scale)
    }

    /// Data extent along y over lines and heat-map
    pub fn y_extent(&self) -> Option<(f64, f64)> {
        let mut ys: Vec<f64> = self
            .lines
            .iter()
            .flat_map(|line| line.points.iter().map(|p| p.1))
            .collect();
        if let Some(map) = &self.heatmap {
            ys.extend_from_slice(&map.y);
        }
        extent(ys, self.y_axis.scale)
    }

    fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.points.is_empty()) && self.heatmap.is_none()
    }
}

fn extent(values: Vec<f64>, scale: Scale) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite() && (scale == Scale::Linear || *v > 0.0))
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub title: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Stacked top to bottom, sharing the figure width
    pub panels: Vec<Panel>,
}

impl Figure {
    pub fn new(width: u32, height: u32) -> Self {
        Figure {
            title: None,
            width,
            height,
            panels: Vec::new(),
        }
    }

    pub fn with_panel(mut self, panel: Panel) -> Self {
        self.panels.push(panel);
        self
    }

    /// Render to SVG and write to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), PlotError> {
        if self.panels.is_empty() || self.panels.iter().all(Panel::is_empty) {
            return Err(PlotError::Empty(path.display().to_string()));
        }

        let document = crate::plots::svg::render(self);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, document)?;

        log::info!("Saved figure {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extent_skips_non_positive_on_log() {
        let mut panel = Panel::new(Axis::log("f"), Axis::log("asd"));
        panel.lines.push(Line::new(vec![(0.0, 1e-22), (10.0, 0.0), (100.0, 1e-20)], "blue"));

        assert_eq!(panel.x_extent(), Some((10.0, 100.0)));
        assert_eq!(panel.y_extent(), Some((1e-22, 1e-20)));
    }

    #[test]
    fn test_axis_builders() {
        let axis = Axis::linear("t").with_limits(1.0, 2.0).with_epoch(1.0);
        assert_eq!(axis.limits, Some((1.0, 2.0)));
        assert_eq!(axis.epoch, Some(1.0));
        assert_eq!(axis.scale, Scale::Linear);
    }

    #[test]
    fn test_save_rejects_empty_figure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.svg");
        let figure = Figure::new(100, 100).with_panel(Panel::new(Axis::linear("x"), Axis::linear("y")));

        assert!(matches!(figure.save(&path), Err(PlotError::Empty(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_save_writes_svg() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plots").join("line.svg");
        let mut panel = Panel::new(Axis::linear("x"), Axis::linear("y"));
        panel.lines.push(Line::new(vec![(0.0, 0.0), (1.0, 1.0)], "black"));

        Figure::new(400, 300).with_panel(panel).save(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("<?xml"));
        assert!(contents.contains("<polyline"));
    }
}
