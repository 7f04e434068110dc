// Spectral analysis module
// Amplitude spectral density and Q-transform time-frequency maps

pub mod asd;
pub mod qtransform;

pub use asd::{asd, FrequencySeries, SpectralError};
pub use qtransform::{q_transform, QGram, QTransformSettings};
