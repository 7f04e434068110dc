// Event catalog module
// Static registry of gravitational-wave events and detector identifiers

pub mod detector;
pub mod registry;

pub use detector::Detector;
pub use registry::{list_event_names, list_events, lookup, lookup_by_choice, EventDescriptor, EventError};
