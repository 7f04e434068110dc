// Visualization module
// Figure descriptions built from already-computed series, rendered to SVG

pub mod adapters;
pub mod figure;
pub mod svg;

pub use adapters::{
    asd_comparison, detector_comparison, filter_comparison, filtered_strain, q_transform,
    spectral_density,
};
pub use figure::{Axis, Figure, Heatmap, Line, Marker, Panel, PlotError, Scale};
