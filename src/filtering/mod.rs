// Signal conditioning module
// Band-pass + mains-notch filter design and zero-phase application

pub mod apply;
pub mod design;

pub use apply::{apply, condition, filtfilt, Conditioned};
pub use design::{
    bandpass, concatenate, design, notch, Biquad, FilterError, FilterSpec, BANDPASS_RANGE,
    MIN_SAMPLE_RATE, NOTCH_FREQUENCIES,
};
