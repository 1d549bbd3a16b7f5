//! Canonical arrival record shared by the bus and train sources.

use serde::{Serialize, Serializer};
use std::fmt;

/// Which kind of vehicle an [`ArrivalRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalKind {
    Bus,
    Train,
}

impl fmt::Display for ArrivalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrivalKind::Bus => f.write_str("bus"),
            ArrivalKind::Train => f.write_str("train"),
        }
    }
}

/// Travel direction of a train relative to the queried station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Uptown,
    Downtown,
    Unknown,
}

impl Direction {
    /// Display label. Empty when the direction could not be determined.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Uptown => "Uptown",
            Direction::Downtown => "Downtown",
            Direction::Unknown => "",
        }
    }
}

/// One upcoming vehicle arrival, independent of the feed it came from.
///
/// Bus records carry `stops_away`, train records carry `direction`; the other
/// field is always `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrivalRecord {
    pub route: String,
    pub kind: ArrivalKind,
    /// Serialized as `null` when unknown.
    #[serde(serialize_with = "serialize_eta")]
    pub eta_seconds: u64,
    pub location_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stops_away: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl ArrivalRecord {
    /// ETA used when the source gave no prediction. Sorts after every real ETA.
    pub const UNKNOWN_ETA: u64 = u64::MAX;

    pub fn bus(
        route: impl Into<String>,
        eta_seconds: u64,
        location_label: impl Into<String>,
        stops_away: Option<u32>,
    ) -> Self {
        Self {
            route: route.into(),
            kind: ArrivalKind::Bus,
            eta_seconds,
            location_label: location_label.into(),
            stops_away,
            direction: None,
        }
    }

    pub fn train(route: impl Into<String>, eta_seconds: u64, direction: Direction) -> Self {
        Self {
            route: route.into(),
            kind: ArrivalKind::Train,
            eta_seconds,
            location_label: direction.label().to_string(),
            stops_away: None,
            direction: Some(direction),
        }
    }

    pub fn eta_known(&self) -> bool {
        self.eta_seconds != Self::UNKNOWN_ETA
    }

    /// Whole minutes until arrival, truncated. `None` for unknown ETAs.
    pub fn minutes_away(&self) -> Option<u64> {
        self.eta_known().then_some(self.eta_seconds / 60)
    }
}

fn serialize_eta<S: Serializer>(eta_seconds: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    match *eta_seconds {
        ArrivalRecord::UNKNOWN_ETA => serializer.serialize_none(),
        eta => serializer.serialize_u64(eta),
    }
}
