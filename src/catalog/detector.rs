// Detector identifiers
// The two LIGO interferometers whose open strain data is analysed

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interferometer site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Detector {
    /// LIGO Hanford Observatory
    H1,
    /// LIGO Livingston Observatory
    L1,
}

impl Detector {
    /// Archive identifier ("H1", "L1")
    pub fn code(&self) -> &'static str {
        match self {
            Detector::H1 => "H1",
            Detector::L1 => "L1",
        }
    }

    /// Human-readable name for plot legends
    pub fn display_name(&self) -> &'static str {
        match self {
            Detector::H1 => "LIGO-Hanford",
            Detector::L1 => "LIGO-Livingston",
        }
    }

    /// Trace colour used in time-domain plots
    pub fn color(&self) -> &'static str {
        match self {
            Detector::H1 => "black",
            Detector::L1 => "gray",
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Detector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "H1" => Ok(Detector::H1),
            "L1" => Ok(Detector::L1),
            other => Err(format!("unknown detector: {}", other)),
        }
    }
}
