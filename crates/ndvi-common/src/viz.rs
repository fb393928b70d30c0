//! Visualization parameters for rendered map layers.

use serde::{Deserialize, Serialize};

/// Value range and color palette used when a derived band is rendered to
/// tiles. Palette entries are hex RGB strings without a leading `#`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
}

impl Visualization {
    /// The fixed NDVI rendering: [-0.2, 0.8] over a six-stop brown-to-green
    /// ramp. Bare soil renders brown, dense canopy dark green.
    pub fn ndvi() -> Self {
        Self {
            min: -0.2,
            max: 0.8,
            palette: [
                "8b4513", "cd853f", "e6d690", "a8c66c", "4caf50", "1b5e20",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}
