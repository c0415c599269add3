//! Arrival records and journey legs.
//!
//! A leg is one segment of a journey: a vehicle ride or a transfer edge.
//! Arrival records name their predecessor by `(round, stop)` through the leg
//! they carry, which keeps the round tables plain owned data.

use crate::model::time::{Duration, Time};
use crate::model::timetable::TransferType;
use crate::{ServiceLineId, StopId};

/// The earliest known arrival at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachingTime {
    pub arrival: Time,
    /// Number of legs consumed to get here (vehicle rides and transfers).
    pub leg_number: usize,
    /// The equivalent-origin stop this arrival chain started from.
    pub origin: StopId,
}

/// One segment of a journey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leg {
    Vehicle {
        from: StopId,
        to: StopId,
        service_line: ServiceLineId,
        departure_time: Time,
        arrival_time: Time,
    },
    Transfer {
        from: StopId,
        to: StopId,
        kind: TransferType,
        min_transfer_time: Option<Duration>,
    },
}

impl Leg {
    pub fn from_stop(&self) -> StopId {
        match *self {
            Leg::Vehicle { from, .. } | Leg::Transfer { from, .. } => from,
        }
    }

    pub fn to_stop(&self) -> StopId {
        match *self {
            Leg::Vehicle { to, .. } | Leg::Transfer { to, .. } => to,
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Leg::Transfer { .. })
    }
}

/// A per-round arrival record: a [`ReachingTime`] plus the leg that produced
/// it. The seed round carries no leg.
#[derive(Debug, Clone, PartialEq)]
pub struct TripLeg {
    pub arrival: Time,
    pub leg_number: usize,
    pub origin: StopId,
    pub leg: Option<Leg>,
}

impl TripLeg {
    pub fn reaching_time(&self) -> ReachingTime {
        ReachingTime {
            arrival: self.arrival,
            leg_number: self.leg_number,
            origin: self.origin,
        }
    }
}
