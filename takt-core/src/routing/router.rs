//! The round-based routing loop.
//!
//! Round `k` holds journeys using at most `k` vehicle legs; a transfer taken
//! after a ride stays within the ride's round, and two consecutive transfers
//! are never allowed. Each round scans every route touching a marked stop
//! exactly once, from the earliest marked stop onwards, then relaxes the
//! modeled transfer edges of the stops that improved.

use crate::model::route::PickupDropoff;
use crate::model::stops::Stops;
use crate::model::time::{Duration, Time};
use crate::model::timetable::{Timetable, TransferType};
use crate::routing::leg::{Leg, TripLeg};
use crate::routing::query::Query;
use crate::routing::result::RoutingResult;
use crate::routing::state::RouterState;
use crate::{RouteId, StopId, TripIndex};

/// A thin, stateless view over the frozen tables. Cheap to construct; one
/// instance may serve any number of concurrent [`Router::route`] calls.
#[derive(Debug, Clone, Copy)]
pub struct Router<'t> {
    timetable: &'t Timetable,
    stops: &'t Stops,
}

/// The trip a route scan is currently riding, with where it was boarded.
struct CurrentTrip {
    trip: TripIndex,
    hop_on_position: usize,
    hop_on_stop: StopId,
    origin: StopId,
}

impl<'t> Router<'t> {
    pub fn new(timetable: &'t Timetable, stops: &'t Stops) -> Router<'t> {
        Router { timetable, stops }
    }

    /// Run one query to completion and return the arrival tables.
    ///
    /// Never fails: an unknown origin yields a result in which every lookup
    /// reports the destination as unreached.
    pub fn route(&self, query: &Query) -> RoutingResult<'t> {
        self.route_with_pruning(query, true)
    }

    /// Routing with target pruning switchable, to let tests assert that
    /// pruning never changes any final arrival.
    pub(crate) fn route_with_pruning(&self, query: &Query, prune: bool) -> RoutingResult<'t> {
        let nb_stops = self.timetable.nb_stops();
        // Rounds 0 (seeds) through max_transfers + 1 (final vehicle legs).
        let max_rounds = query.max_transfers + 2;
        let mut state = RouterState::new(nb_stops, max_rounds);

        let destinations = self.resolve(&query.to);

        for origin in self.stops.equivalent_stops(&query.from) {
            state.record(
                0,
                origin.id,
                TripLeg {
                    arrival: query.departure_time,
                    leg_number: 0,
                    origin: origin.id,
                    leg: None,
                },
            );
        }
        // Stops reached on foot from the origin are boarding points too.
        self.relax_transfers(&mut state, 0, query);

        for round in 1..max_rounds {
            let reachable = self
                .timetable
                .reachable_routes(&state.marked, query.allowed_modes);
            state.marked.clear();

            for (&route_id, &hop_on) in &reachable {
                let bound = if prune {
                    pruning_bound(&state, &destinations)
                } else {
                    Time::MAX
                };
                self.scan_route(&mut state, round, route_id, hop_on, bound);
            }

            self.relax_transfers(&mut state, round, query);

            if state.marked.is_clear() {
                break;
            }
        }

        RoutingResult::new(
            self.stops,
            self.timetable,
            state.rounds,
            state.earliest,
            query.to.clone(),
        )
    }

    /// Expand external destination ids into concrete stop ids.
    fn resolve(&self, external_ids: &[String]) -> Vec<StopId> {
        let mut resolved = Vec::new();
        for external_id in external_ids {
            for stop in self.stops.equivalent_stops(external_id) {
                if !resolved.contains(&stop.id) {
                    resolved.push(stop.id);
                }
            }
        }
        resolved
    }

    /// Ride one route from its earliest marked stop to the terminus.
    ///
    /// At every stop the scan first tries to drop off the trip it is riding,
    /// then checks whether the previous round reached this stop early enough
    /// to catch an earlier trip of the same route.
    fn scan_route(
        &self,
        state: &mut RouterState,
        round: usize,
        route_id: RouteId,
        hop_on: StopId,
        bound: Time,
    ) {
        let route = &self.timetable.routes()[route_id];
        let mut current: Option<CurrentTrip> = None;

        for (position, stop) in route.stops_from(Some(hop_on)) {
            if let Some(ct) = &current {
                let arrive = route.arrival(ct.trip, position);
                if route.dropoff_type(ct.trip, position) != PickupDropoff::NotAvailable
                    && arrive < state.earliest_arrival(stop)
                    && arrive < bound
                {
                    let leg = Leg::Vehicle {
                        from: ct.hop_on_stop,
                        to: stop,
                        service_line: route.service_line(),
                        departure_time: route.departure(ct.trip, ct.hop_on_position),
                        arrival_time: arrive,
                    };
                    state.record(
                        round,
                        stop,
                        TripLeg {
                            arrival: arrive,
                            leg_number: round,
                            origin: ct.origin,
                            leg: Some(leg),
                        },
                    );
                }
            }

            let prev = state.rounds[round - 1][stop]
                .as_ref()
                .map(|r| (r.arrival, r.origin));
            if let Some((prev_arrival, prev_origin)) = prev {
                let catchable = match &current {
                    None => true,
                    Some(ct) => prev_arrival <= route.arrival(ct.trip, position),
                };
                if catchable {
                    let before = current.as_ref().map(|ct| ct.trip);
                    if let Some(trip) = route.earliest_trip(position, prev_arrival, before) {
                        current = Some(CurrentTrip {
                            trip,
                            hop_on_position: position,
                            hop_on_stop: stop,
                            origin: prev_origin,
                        });
                    }
                }
            }
        }
    }

    /// Push the round's improvements across modeled transfer edges.
    ///
    /// A stop reached by a transfer is never relaxed again: consecutive
    /// transfers are forbidden, multi-hop walks must be collapsed into direct
    /// edges by the ingester.
    fn relax_transfers(&self, state: &mut RouterState, round: usize, query: &Query) {
        let sources: Vec<StopId> = state.marked.ones().collect();

        for stop in sources {
            let Some(record) = state.rounds[round][stop].clone() else {
                continue;
            };
            if record.leg.as_ref().is_some_and(Leg::is_transfer) {
                continue;
            }

            for transfer in self.timetable.transfers(stop) {
                let cost = transfer.min_transfer_time.unwrap_or(match transfer.kind {
                    TransferType::InSeat => Duration::ZERO,
                    _ => query.min_transfer_time,
                });
                let arrival = record.arrival + cost;
                if arrival < state.round_arrival(round, transfer.destination) {
                    state.record(
                        round,
                        transfer.destination,
                        TripLeg {
                            arrival,
                            leg_number: record.leg_number + 1,
                            origin: record.origin,
                            leg: Some(Leg::Transfer {
                                from: stop,
                                to: transfer.destination,
                                kind: transfer.kind,
                                min_transfer_time: transfer.min_transfer_time,
                            }),
                        },
                    );
                }
            }
        }
    }
}

/// Best known arrival at any destination; candidates at or past this bound
/// cannot be part of an improving journey.
fn pruning_bound(state: &RouterState, destinations: &[StopId]) -> Time {
    destinations
        .iter()
        .map(|&stop| state.earliest_arrival(stop))
        .min()
        .unwrap_or(Time::MAX)
}

#[cfg(test)]
mod tests {
    use super::Router;
    use crate::loading::TimetableBuilder;
    use crate::model::stops::Stops;
    use crate::model::time::{Duration, Time};
    use crate::model::timetable::{RouteType, Timetable, TransferType};
    use crate::routing::query::Query;

    /// Two lines crossing at "mid" plus a footpath shortcut near the target.
    fn crossing_network() -> (Stops, Timetable) {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "mid", "b", "c", "walk", "d"] {
            builder.add_stop(id, id);
        }
        builder
            .add_service_line(RouteType::Bus, "1")
            .trip(&[("a", "08:00"), ("mid", "08:20"), ("b", "08:40")])
            .trip(&[("a", "09:00"), ("mid", "09:20"), ("b", "09:40")]);
        builder
            .add_service_line(RouteType::Bus, "2")
            .trip(&[("c", "08:10"), ("mid", "08:30"), ("d", "08:50")]);
        builder
            .transfer("b", "walk", TransferType::RequiresMinimalTime, Some(300))
            .unwrap();
        builder.build().unwrap()
    }

    fn query(from: &str, to: &str) -> Query {
        Query::builder()
            .from(from)
            .to(to)
            .departure_time(Time::from_hm(8, 0))
            .build()
    }

    #[test]
    fn pruning_leaves_arrivals_unchanged() {
        let (stops, timetable) = crossing_network();
        let router = Router::new(&timetable, &stops);
        let q = query("a", "d");

        let pruned = router.route_with_pruning(&q, true);
        let free = router.route_with_pruning(&q, false);

        for stop in stops.iter() {
            assert_eq!(
                pruned.arrival_at(&stop.external_id, None).map(|r| r.arrival),
                free.arrival_at(&stop.external_id, None).map(|r| r.arrival),
                "arrival mismatch at {}",
                stop.external_id
            );
        }
        assert_eq!(
            pruned.best_journey().map(|j| j.arrival_time()),
            free.best_journey().map(|j| j.arrival_time())
        );
    }

    #[test]
    fn transfers_never_chain() {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "b", "c", "d"] {
            builder.add_stop(id, id);
        }
        builder
            .add_service_line(RouteType::Bus, "1")
            .trip(&[("a", "08:00"), ("b", "08:10")]);
        // b -> c -> d is a two-hop walk; only b -> c may be taken.
        builder
            .transfer("b", "c", TransferType::Recommended, None)
            .unwrap();
        builder
            .transfer("c", "d", TransferType::Recommended, None)
            .unwrap();
        let (stops, timetable) = builder.build().unwrap();

        let result = Router::new(&timetable, &stops).route(&query("a", "d"));
        assert!(result.arrival_at("c", None).is_some());
        assert!(result.arrival_at("d", None).is_none());
    }

    #[test]
    fn in_seat_transfer_is_free_without_explicit_time() {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "b", "b2"] {
            builder.add_stop(id, id);
        }
        builder
            .add_service_line(RouteType::Rail, "IC")
            .trip(&[("a", "08:00"), ("b", "08:30")]);
        builder
            .transfer("b", "b2", TransferType::InSeat, None)
            .unwrap();
        let (stops, timetable) = builder.build().unwrap();

        let result = Router::new(&timetable, &stops).route(&query("a", "b2"));
        assert_eq!(
            result.arrival_at("b2", None).unwrap().arrival,
            Time::from_hm(8, 30)
        );
    }

    #[test]
    fn default_footpath_cost_applies() {
        let (stops, timetable) = crossing_network();
        let q = Query::builder()
            .from("a")
            .to("walk")
            .departure_time(Time::from_hm(8, 0))
            .min_transfer_time(Duration::from_seconds(600))
            .build();
        let result = Router::new(&timetable, &stops).route(&q);
        // The edge carries 300 s, overriding the query's 600 s default.
        assert_eq!(
            result.arrival_at("walk", None).unwrap().arrival,
            Time::from_hm(8, 45)
        );
    }
}
