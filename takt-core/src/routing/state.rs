//! Per-query mutable state of the round loop.

use fixedbitset::FixedBitSet;

use crate::StopId;
use crate::model::time::Time;
use crate::routing::leg::{ReachingTime, TripLeg};

/// Arrival tables for one query: one row per round plus the running best.
///
/// `rounds[k][stop]` is the best arrival found with exactly `k` rounds,
/// carrying the leg that produced it; `earliest[stop]` is the best over all
/// rounds so far and drives target pruning.
#[derive(Debug)]
pub(crate) struct RouterState {
    pub(crate) rounds: Vec<Vec<Option<TripLeg>>>,
    pub(crate) earliest: Vec<Option<ReachingTime>>,
    pub(crate) marked: FixedBitSet,
}

impl RouterState {
    pub(crate) fn new(nb_stops: usize, max_rounds: usize) -> RouterState {
        RouterState {
            rounds: vec![vec![None; nb_stops]; max_rounds],
            earliest: vec![None; nb_stops],
            marked: FixedBitSet::with_capacity(nb_stops),
        }
    }

    /// Best arrival at `stop` over all rounds, `Time::MAX` when unreached.
    pub(crate) fn earliest_arrival(&self, stop: StopId) -> Time {
        self.earliest[stop].map_or(Time::MAX, |r| r.arrival)
    }

    /// Arrival recorded at `stop` within `round`, `Time::MAX` when absent.
    pub(crate) fn round_arrival(&self, round: usize, stop: StopId) -> Time {
        self.rounds[round][stop]
            .as_ref()
            .map_or(Time::MAX, |r| r.arrival)
    }

    /// Write an arrival into `round`, fold it into the best-known table and
    /// mark the stop for the next scan.
    pub(crate) fn record(&mut self, round: usize, stop: StopId, trip_leg: TripLeg) {
        let reached = trip_leg.reaching_time();
        if reached.arrival < self.earliest_arrival(stop) {
            self.earliest[stop] = Some(reached);
        }
        self.rounds[round][stop] = Some(trip_leg);
        self.marked.set(stop, true);
    }
}
