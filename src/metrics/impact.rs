//! Environmental impact per recycled bottle.

use serde::Serialize;

use crate::metrics::utility::{fixed, round_to};

/// kg CO₂ avoided per bottle.
pub const CO2_KG_PER_BOTTLE: f64 = 0.082;
/// Litres of water saved per bottle.
pub const WATER_L_PER_BOTTLE: f64 = 0.5;
/// kWh of energy saved per bottle.
pub const ENERGY_KWH_PER_BOTTLE: f64 = 0.15;
/// kg of plastic kept out of landfill per bottle.
pub const PLASTIC_KG_PER_BOTTLE: f64 = 0.025;

/// Unrounded impact figures. Round only through [`Impact::display`] or
/// [`Impact::rounded`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Impact {
    pub co2_saved: f64,
    pub water_saved: f64,
    pub energy_saved: f64,
    pub plastic_diverted: f64,
}

/// Impact formatted at the dashboard's display precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactDisplay {
    pub co2_saved: String,
    pub water_saved: String,
    pub energy_saved: String,
    pub plastic_diverted: String,
}

pub fn impact(bottles: u64) -> Impact {
    let b = bottles as f64;
    Impact {
        co2_saved: b * CO2_KG_PER_BOTTLE,
        water_saved: b * WATER_L_PER_BOTTLE,
        energy_saved: b * ENERGY_KWH_PER_BOTTLE,
        plastic_diverted: b * PLASTIC_KG_PER_BOTTLE,
    }
}

impl Impact {
    pub fn rounded(&self) -> Impact {
        Impact {
            co2_saved: round_to(self.co2_saved, 1),
            water_saved: round_to(self.water_saved, 0),
            energy_saved: round_to(self.energy_saved, 1),
            plastic_diverted: round_to(self.plastic_diverted, 2),
        }
    }

    pub fn display(&self) -> ImpactDisplay {
        ImpactDisplay {
            co2_saved: fixed(self.co2_saved, 1),
            water_saved: fixed(self.water_saved, 0),
            energy_saved: fixed(self.energy_saved, 1),
            plastic_diverted: fixed(self.plastic_diverted, 2),
        }
    }
}
