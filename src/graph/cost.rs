use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::Cost;

/// Built-in edge cost policies.
///
/// The search itself accepts any `Fn(distance_m, speed_kmph) -> Cost`; this
/// enum only names the policies the server can be configured with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CostModel {
    /// Raw segment length in meters. Speed is ignored.
    #[default]
    Distance,
    /// Travel time in milliseconds at the posted speed.
    TravelTime,
}

impl CostModel {
    /// Cost of traversing one edge.
    pub fn cost(self, distance_m: u32, speed_kmph: u32) -> Cost {
        match self {
            CostModel::Distance => distance_cost(distance_m, speed_kmph),
            CostModel::TravelTime => travel_time_cost(distance_m, speed_kmph),
        }
    }

    /// Stable name used in logs and configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            CostModel::Distance => "distance",
            CostModel::TravelTime => "travel_time",
        }
    }
}

/// Cost equal to the edge length.
pub fn distance_cost(distance_m: u32, _speed_kmph: u32) -> Cost {
    Cost::from(distance_m)
}

/// Milliseconds needed to cover `distance_m` at `speed_kmph`.
///
/// A zero speed makes the edge impassable; the search never relaxes it.
pub fn travel_time_cost(distance_m: u32, speed_kmph: u32) -> Cost {
    if speed_kmph == 0 {
        return Cost::MAX;
    }
    // m / (km/h) = 3.6 s per unit, i.e. 3600 ms.
    Cost::from(distance_m) * 3_600 / Cost::from(speed_kmph)
}
