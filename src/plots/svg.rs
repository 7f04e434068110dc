// SVG rendering of figures
// Panels are stacked vertically; long traces are reduced to per-pixel
// min/max pairs so multi-second strain series stay small on disk

use std::fmt::Write;

use crate::plots::figure::{Axis, Figure, Heatmap, Line, Marker, Panel, Scale};

const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 55.0;
const FIGURE_TITLE_HEIGHT: f64 = 30.0;
const COLORBAR_SPACE: f64 = 90.0;

/// Colour map stops (perceptually ordered, dark to bright)
const COLORMAP: [(f64, (u8, u8, u8)); 5] = [
    (0.00, (68, 1, 84)),
    (0.25, (59, 82, 139)),
    (0.50, (33, 145, 140)),
    (0.75, (94, 201, 98)),
    (1.00, (253, 231, 37)),
];

/// Data-to-pixel transform along one axis
#[derive(Debug, Clone, Copy)]
struct Mapping {
    scale: Scale,
    lo: f64,
    hi: f64,
    pixel_lo: f64,
    pixel_hi: f64,
}

impl Mapping {
    fn new(axis: &Axis, extent: Option<(f64, f64)>, pixel_lo: f64, pixel_hi: f64) -> Self {
        let (mut lo, mut hi) = axis.limits.or(extent).unwrap_or(match axis.scale {
            Scale::Linear => (0.0, 1.0),
            Scale::Log => (1.0, 10.0),
        });
        if axis.scale == Scale::Log {
            lo = lo.max(f64::MIN_POSITIVE);
            hi = hi.max(lo * 10.0_f64.powf(1e-3));
        }
        if hi <= lo {
            let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
            lo -= pad;
            hi += pad;
        }
        Mapping {
            scale: axis.scale,
            lo,
            hi,
            pixel_lo,
            pixel_hi,
        }
    }

    fn transform(&self, v: f64) -> Option<f64> {
        match self.scale {
            Scale::Linear => Some(v),
            Scale::Log if v > 0.0 => Some(v.log10()),
            Scale::Log => None,
        }
    }

    fn map(&self, v: f64) -> Option<f64> {
        let t = self.transform(v)?;
        let lo = self.transform(self.lo)?;
        let hi = self.transform(self.hi)?;
        Some(self.pixel_lo + (t - lo) / (hi - lo) * (self.pixel_hi - self.pixel_lo))
    }

    fn contains(&self, v: f64) -> bool {
        v >= self.lo && v <= self.hi
    }

    fn ticks(&self) -> Vec<f64> {
        match self.scale {
            Scale::Log => {
                let first = (self.lo.log10() - 1e-9).ceil() as i32;
                let last = (self.hi.log10() + 1e-9).floor() as i32;
                (first..=last).map(|k| 10f64.powi(k)).collect()
            }
            Scale::Linear => {
                let step = nice_step((self.hi - self.lo) / 5.0);
                let first = (self.lo / step - 1e-9).ceil() as i64;
                let last = (self.hi / step + 1e-9).floor() as i64;
                (first..=last).map(|k| k as f64 * step).collect()
            }
        }
    }
}

fn nice_step(raw: f64) -> f64 {
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let factor = if normalized < 1.5 {
        1.0
    } else if normalized < 3.5 {
        2.0
    } else if normalized < 7.5 {
        5.0
    } else {
        10.0
    };
    factor * magnitude
}

fn format_tick(value: f64, scale: Scale, span: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if scale == Scale::Log {
        let exponent = value.log10().round() as i32;
        if (-2..=4).contains(&exponent) {
            return format!("{}", value);
        }
        return format!("1e{}", exponent);
    }
    let step = nice_step(span / 5.0);
    if step < 1e-3 || step >= 1e5 {
        return format!("{:.1e}", value);
    }
    let decimals = (-step.log10().floor()).max(0.0) as usize;
    format!("{:.*}", decimals, value)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn color_at(fraction: f64) -> String {
    let f = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    for pair in COLORMAP.windows(2) {
        let (p0, c0) = pair[0];
        let (p1, c1) = pair[1];
        if f <= p1 {
            let t = (f - p0) / (p1 - p0);
            let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
            return format!("#{:02x}{:02x}{:02x}", lerp(c0.0, c1.0), lerp(c0.1, c1.1), lerp(c0.2, c1.2));
        }
    }
    let (_, c) = COLORMAP[COLORMAP.len() - 1];
    format!("#{:02x}{:02x}{:02x}", c.0, c.1, c.2)
}

/// Pixel coordinates of `line`, keeping the extreme values of every pixel column
fn decimate(line: &Line, x: &Mapping, y: &Mapping) -> Vec<(f64, f64)> {
    let mapped: Vec<(f64, f64)> = line
        .points
        .iter()
        .filter(|(px, _)| x.contains(*px))
        .filter_map(|&(px, py)| Some((x.map(px)?, y.map(py)?)))
        .collect();

    let columns = (x.pixel_hi - x.pixel_lo).abs().max(1.0);
    if mapped.len() as f64 <= 4.0 * columns {
        return mapped;
    }

    let mut reduced = Vec::new();
    let mut start = 0;
    while start < mapped.len() {
        let column = mapped[start].0.floor();
        let mut end = start;
        let (mut min_i, mut max_i) = (start, start);
        while end < mapped.len() && mapped[end].0.floor() == column {
            if mapped[end].1 < mapped[min_i].1 {
                min_i = end;
            }
            if mapped[end].1 > mapped[max_i].1 {
                max_i = end;
            }
            end += 1;
        }
        let (a, b) = if min_i <= max_i { (min_i, max_i) } else { (max_i, min_i) };
        reduced.push(mapped[a]);
        if b != a {
            reduced.push(mapped[b]);
        }
        start = end;
    }
    reduced
}

/// Render `figure` as a standalone SVG document
pub fn render(figure: &Figure) -> String {
    let mut svg = String::new();
    let width = figure.width as f64;
    let height = figure.height as f64;

    writeln!(
        svg,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}" font-family="sans-serif">
<rect x="0" y="0" width="{w}" height="{h}" fill="white" />"#,
        w = figure.width,
        h = figure.height
    )
    .ok();

    let mut top = 0.0;
    if let Some(title) = &figure.title {
        writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="16">{}</text>"#,
            width / 2.0,
            FIGURE_TITLE_HEIGHT * 0.7,
            escape(title)
        )
        .ok();
        top = FIGURE_TITLE_HEIGHT;
    }

    let count = figure.panels.len().max(1) as f64;
    let panel_height = (height - top) / count;
    for (index, panel) in figure.panels.iter().enumerate() {
        let panel_top = top + index as f64 * panel_height;
        render_panel(&mut svg, panel, index, panel_top, width, panel_height);
    }

    writeln!(svg, "</svg>").ok();
    svg
}

fn render_panel(svg: &mut String, panel: &Panel, index: usize, top: f64, width: f64, height: f64) {
    let right_space = if panel.heatmap.is_some() { COLORBAR_SPACE } else { MARGIN_RIGHT };
    let left = MARGIN_LEFT;
    let right = (width - right_space).max(left + 1.0);
    let plot_top = top + MARGIN_TOP;
    let bottom = (top + height - MARGIN_BOTTOM).max(plot_top + 1.0);

    let x = Mapping::new(&panel.x_axis, panel.x_extent(), left, right);
    let y = Mapping::new(&panel.y_axis, panel.y_extent(), bottom, plot_top);

    writeln!(
        svg,
        r#"<clipPath id="panel{i}"><rect x="{}" y="{}" width="{}" height="{}" /></clipPath>"#,
        left,
        plot_top,
        right - left,
        bottom - plot_top,
        i = index
    )
    .ok();

    if let Some(title) = &panel.title {
        writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="14">{}</text>"#,
            (left + right) / 2.0,
            plot_top - 18.0,
            escape(title)
        )
        .ok();
    }
    if let Some(note) = &panel.note {
        writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-size="11">{}</text>"#,
            right,
            plot_top - 4.0,
            escape(note)
        )
        .ok();
    }

    if let Some(map) = &panel.heatmap {
        render_heatmap(svg, map, &x, &y, index, right);
    }

    for marker in &panel.markers {
        render_marker(svg, marker, &x, plot_top, bottom, index);
    }

    for line in &panel.lines {
        let points = decimate(line, &x, &y);
        if points.is_empty() {
            continue;
        }
        let mut coords = String::with_capacity(points.len() * 16);
        for (px, py) in points {
            write!(coords, "{:.2},{:.2} ", px, py).ok();
        }
        writeln!(
            svg,
            r#"<polyline clip-path="url(#panel{})" fill="none" stroke="{}" stroke-width="{}" stroke-opacity="{}" points="{}" />"#,
            index,
            escape(&line.color),
            line.width,
            line.opacity,
            coords.trim_end()
        )
        .ok();
    }

    // Frame, ticks and labels
    writeln!(
        svg,
        r#"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="black" />"#,
        left,
        plot_top,
        right - left,
        bottom - plot_top
    )
    .ok();
    render_ticks(svg, &panel.x_axis, &x, bottom, true);
    render_ticks(svg, &panel.y_axis, &y, left, false);

    let x_label = match panel.x_axis.epoch {
        Some(epoch) => format!("{} from {}", panel.x_axis.label, epoch),
        None => panel.x_axis.label.clone(),
    };
    writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="12">{}</text>"#,
        (left + right) / 2.0,
        bottom + 40.0,
        escape(&x_label)
    )
    .ok();
    writeln!(
        svg,
        r#"<text x="{cx}" y="{cy}" text-anchor="middle" font-size="12" transform="rotate(-90 {cx} {cy})">{}</text>"#,
        escape(&panel.y_axis.label),
        cx = 18.0,
        cy = (plot_top + bottom) / 2.0
    )
    .ok();

    if panel.legend {
        render_legend(svg, panel, right, plot_top);
    }
}

fn render_ticks(svg: &mut String, axis: &Axis, mapping: &Mapping, edge: f64, horizontal: bool) {
    let epoch = axis.epoch.unwrap_or(0.0);
    let span = mapping.hi - mapping.lo;

    for tick in mapping.ticks() {
        let Some(pos) = mapping.map(tick) else { continue };
        let label = format_tick(tick - epoch, mapping.scale, span);
        if horizontal {
            writeln!(
                svg,
                r#"<line x1="{p:.2}" y1="{e}" x2="{p:.2}" y2="{}" stroke="black" /><text x="{p:.2}" y="{}" text-anchor="middle" font-size="10">{}</text>"#,
                edge + 5.0,
                edge + 18.0,
                escape(&label),
                p = pos,
                e = edge
            )
            .ok();
        } else {
            writeln!(
                svg,
                r#"<line x1="{}" y1="{p:.2}" x2="{e}" y2="{p:.2}" stroke="black" /><text x="{}" y="{:.2}" text-anchor="end" font-size="10">{}</text>"#,
                edge - 5.0,
                edge - 8.0,
                pos + 3.0,
                escape(&label),
                p = pos,
                e = edge
            )
            .ok();
        }
    }
}

fn render_marker(svg: &mut String, marker: &Marker, x: &Mapping, top: f64, bottom: f64, index: usize) {
    match marker {
        Marker::VLine { x: at, color, opacity } => {
            if let Some(px) = x.map(*at).filter(|_| x.contains(*at)) {
                writeln!(
                    svg,
                    r#"<line clip-path="url(#panel{})" x1="{px:.2}" y1="{}" x2="{px:.2}" y2="{}" stroke="{}" stroke-opacity="{}" stroke-dasharray="6,4" />"#,
                    index,
                    top,
                    bottom,
                    escape(color),
                    opacity,
                    px = px
                )
                .ok();
            }
        }
        Marker::Span { x0, x1, color, opacity, .. } => {
            if let (Some(a), Some(b)) = (x.map(*x0), x.map(*x1)) {
                writeln!(
                    svg,
                    r#"<rect clip-path="url(#panel{})" x="{:.2}" y="{}" width="{:.2}" height="{}" fill="{}" fill-opacity="{}" />"#,
                    index,
                    a.min(b),
                    top,
                    (b - a).abs(),
                    bottom - top,
                    escape(color),
                    opacity
                )
                .ok();
            }
        }
    }
}

fn render_heatmap(svg: &mut String, map: &Heatmap, x: &Mapping, y: &Mapping, index: usize, right: f64) {
    let vmax = map
        .values
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, &v| if v.is_finite() { acc.max(v) } else { acc });
    let scale = if vmax > 0.0 { vmax } else { 1.0 };

    let xs: Vec<f64> = map.x.iter().filter_map(|&v| x.map(v)).collect();
    let ys: Vec<f64> = map.y.iter().filter_map(|&v| y.map(v)).collect();
    if xs.len() != map.x.len() || ys.len() != map.y.len() || xs.is_empty() || ys.is_empty() {
        return;
    }
    let x_edges = cell_edges(&xs);
    let y_edges = cell_edges(&ys);

    for (row, values) in map.values.iter().enumerate().take(ys.len()) {
        for (column, &value) in values.iter().enumerate().take(xs.len()) {
            let (x0, x1) = (x_edges[column], x_edges[column + 1]);
            let (y0, y1) = (y_edges[row], y_edges[row + 1]);
            writeln!(
                svg,
                r#"<rect clip-path="url(#panel{})" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" />"#,
                index,
                x0.min(x1),
                y0.min(y1),
                (x1 - x0).abs() + 0.3,
                (y1 - y0).abs() + 0.3,
                color_at(value / scale)
            )
            .ok();
        }
    }

    // Colour bar
    let top = y.pixel_hi.min(y.pixel_lo);
    let bottom = y.pixel_hi.max(y.pixel_lo);
    let bar_left = right + 15.0;
    let steps = 32;
    let step_height = (bottom - top) / steps as f64;
    for i in 0..steps {
        writeln!(
            svg,
            r#"<rect x="{}" y="{:.2}" width="14" height="{:.2}" fill="{}" />"#,
            bar_left,
            bottom - (i + 1) as f64 * step_height,
            step_height + 0.3,
            color_at((i as f64 + 0.5) / steps as f64)
        )
        .ok();
    }
    writeln!(
        svg,
        r#"<text x="{}" y="{:.2}" font-size="10">0</text><text x="{}" y="{:.2}" font-size="10">{:.1}</text>"#,
        bar_left + 18.0,
        bottom,
        bar_left + 18.0,
        top + 8.0,
        vmax
    )
    .ok();
    writeln!(
        svg,
        r#"<text x="{cx}" y="{cy:.2}" text-anchor="middle" font-size="11" transform="rotate(90 {cx} {cy:.2})">{}</text>"#,
        escape(&map.label),
        cx = bar_left + 50.0,
        cy = (top + bottom) / 2.0
    )
    .ok();
}

/// Boundaries between pixel centres, extended half a cell at both ends
fn cell_edges(centres: &[f64]) -> Vec<f64> {
    if centres.len() == 1 {
        return vec![centres[0] - 1.0, centres[0] + 1.0];
    }
    let mut edges = Vec::with_capacity(centres.len() + 1);
    edges.push(centres[0] - (centres[1] - centres[0]) / 2.0);
    for pair in centres.windows(2) {
        edges.push((pair[0] + pair[1]) / 2.0);
    }
    let n = centres.len();
    edges.push(centres[n - 1] + (centres[n - 1] - centres[n - 2]) / 2.0);
    edges
}

fn render_legend(svg: &mut String, panel: &Panel, right: f64, top: f64) {
    let mut entries: Vec<(String, String)> = panel
        .lines
        .iter()
        .filter_map(|line| line.label.clone().map(|label| (label, line.color.clone())))
        .collect();
    for marker in &panel.markers {
        if let Marker::Span { label: Some(label), color, .. } = marker {
            entries.push((label.clone(), color.clone()));
        }
    }
    if entries.is_empty() {
        return;
    }

    let box_width = 12.0 + 7.0 * entries.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0) as f64 + 30.0;
    let box_left = right - box_width - 8.0;
    writeln!(
        svg,
        r##"<rect x="{:.2}" y="{}" width="{:.2}" height="{}" fill="white" fill-opacity="0.8" stroke="#999" />"##,
        box_left,
        top + 8.0,
        box_width,
        8.0 + 16.0 * entries.len() as f64
    )
    .ok();
    for (i, (label, color)) in entries.iter().enumerate() {
        let row = top + 22.0 + 16.0 * i as f64;
        writeln!(
            svg,
            r#"<line x1="{:.2}" y1="{row:.2}" x2="{:.2}" y2="{row:.2}" stroke="{}" stroke-width="2" /><text x="{:.2}" y="{:.2}" font-size="10">{}</text>"#,
            box_left + 6.0,
            box_left + 26.0,
            escape(color),
            box_left + 32.0,
            row + 3.5,
            escape(label),
            row = row
        )
        .ok();
    }
}
