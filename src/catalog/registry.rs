// Event registry
// Immutable table of the supported events: GPS reference time, fetch window
// and the plotting windows used around the merger

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EventError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}

/// Everything the pipeline needs to know about one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDescriptor {
    /// Catalog name (e.g., "GW150914")
    pub name: &'static str,

    /// Short description for logs and prompts
    pub description: &'static str,

    /// Merger reference time (GPS seconds)
    pub event_time: f64,

    /// Start of the strain fetch window (GPS seconds)
    pub start_time: f64,

    /// End of the strain fetch window (GPS seconds)
    pub end_time: f64,

    /// Observing-run dataset the archive files the data under
    pub dataset: &'static str,

    /// Time window (GPS seconds) shown in the zoomed strain and comparison plots
    pub zoom: (f64, f64),

    /// Q-transform output segment as (seconds before, seconds after) event_time
    pub qscan_offsets: (f64, f64),
}

impl EventDescriptor {
    /// Fetch window length in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Q-transform output segment in absolute GPS seconds
    pub fn qscan_segment(&self) -> (f64, f64) {
        (
            self.event_time - self.qscan_offsets.0,
            self.event_time + self.qscan_offsets.1,
        )
    }
}

const GW150914: EventDescriptor = EventDescriptor {
    name: "GW150914",
    description: "First binary black hole merger",
    event_time: 1126259462.4,
    start_time: 1126259446.0,
    end_time: 1126259478.0,
    dataset: "O1",
    zoom: (1126259462.0, 1126259462.6),
    qscan_offsets: (0.2, 0.1),
};

const GW170817: EventDescriptor = EventDescriptor {
    name: "GW170817",
    description: "Binary neutron star merger",
    event_time: 1187008882.4,
    start_time: 1187008842.0,
    end_time: 1187008922.0,
    dataset: "O2_4KHZ_R1",
    zoom: (1187008862.0, 1187008902.0),
    qscan_offsets: (10.0, 10.0),
};

static EVENTS: [EventDescriptor; 2] = [GW150914, GW170817];

/// Look up an event by catalog name (case-insensitive)
pub fn lookup(event_id: &str) -> Result<&'static EventDescriptor, EventError> {
    let wanted = event_id.trim().to_uppercase();
    EVENTS
        .iter()
        .find(|event| event.name == wanted)
        .ok_or_else(|| EventError::UnknownEvent(event_id.to_string()))
}

/// Look up an event by its interactive menu number (1 = GW170817, 2 = GW150914)
pub fn lookup_by_choice(choice: u32) -> Result<&'static EventDescriptor, EventError> {
    match choice {
        1 => lookup("GW170817"),
        2 => lookup("GW150914"),
        other => Err(EventError::UnknownEvent(other.to_string())),
    }
}

/// All registered events
pub fn list_events() -> &'static [EventDescriptor] {
    &EVENTS
}

/// All registered event names
pub fn list_event_names() -> Vec<String> {
    EVENTS.iter().map(|event| event.name.to_string()).collect()
}
