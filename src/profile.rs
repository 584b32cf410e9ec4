//! Travel profiles used to turn a geodesic trip length into a travel time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelProfile {
    Car,
    Bike,
    Foot,
}

impl TravelProfile {
    pub const ALL: [TravelProfile; 3] = [TravelProfile::Car, TravelProfile::Bike, TravelProfile::Foot];

    /// Average urban speed in km/h.
    pub fn average_speed_kmh(&self) -> f64 {
        match self {
            TravelProfile::Car => 20.0,
            TravelProfile::Bike => 15.0,
            TravelProfile::Foot => 5.0,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TravelProfile::Car => "Car",
            TravelProfile::Bike => "Bike",
            TravelProfile::Foot => "Foot",
        }
    }

    /// Time to cover `meters` at this profile's average speed.
    pub fn travel_time(&self, meters: f64) -> Duration {
        let hours = meters.max(0.0) / 1000.0 / self.average_speed_kmh();
        Duration::from_secs_f64(hours * 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_travel_time() {
        assert_eq!(TravelProfile::Car.travel_time(20_000.0), Duration::from_secs(3600));
        assert_eq!(TravelProfile::Foot.travel_time(2_500.0), Duration::from_secs(1800));
        assert_eq!(TravelProfile::Bike.travel_time(0.0), Duration::ZERO);
    }
}
