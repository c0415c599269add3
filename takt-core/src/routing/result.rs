//! Query results: per-stop arrival summaries and journey reconstruction.

use crate::model::stops::Stops;
use crate::model::time::Time;
use crate::model::timetable::Timetable;
use crate::routing::leg::{Leg, ReachingTime, TripLeg};
use crate::StopId;

/// A concrete reconstructed journey, legs in chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct Journey {
    legs: Vec<Leg>,
    departure_time: Time,
    arrival_time: Time,
}

impl Journey {
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Departure of the seed the journey grew from, i.e. the queried time.
    pub fn departure_time(&self) -> Time {
        self.departure_time
    }

    pub fn arrival_time(&self) -> Time {
        self.arrival_time
    }

    pub fn nb_vehicle_legs(&self) -> usize {
        self.legs.iter().filter(|leg| !leg.is_transfer()).count()
    }
}

/// The outcome of one routing run.
///
/// Owns the per-round arrival tables produced by the router and reads the
/// shared [`Stops`]/[`Timetable`] for id resolution; journey reconstruction
/// is lazy, nothing is precomputed beyond the tables themselves.
#[derive(Debug)]
pub struct RoutingResult<'t> {
    stops: &'t Stops,
    timetable: &'t Timetable,
    rounds: Vec<Vec<Option<TripLeg>>>,
    earliest: Vec<Option<ReachingTime>>,
    destinations: Vec<String>,
}

impl<'t> RoutingResult<'t> {
    pub(crate) fn new(
        stops: &'t Stops,
        timetable: &'t Timetable,
        rounds: Vec<Vec<Option<TripLeg>>>,
        earliest: Vec<Option<ReachingTime>>,
        destinations: Vec<String>,
    ) -> RoutingResult<'t> {
        RoutingResult {
            stops,
            timetable,
            rounds,
            earliest,
            destinations,
        }
    }

    pub fn stops(&self) -> &'t Stops {
        self.stops
    }

    pub fn timetable(&self) -> &'t Timetable {
        self.timetable
    }

    /// Earliest known arrival at the queried stop or any of its equivalents.
    ///
    /// With `max_transfers` given, only journeys using at most that many
    /// vehicle legs count. Returns `None` when nothing reaches the stop set.
    pub fn arrival_at(&self, external_id: &str, max_transfers: Option<usize>) -> Option<ReachingTime> {
        let mut best: Option<ReachingTime> = None;
        let mut best_stop = StopId::MAX;

        for stop in self.stops.equivalent_stops(external_id) {
            let candidate = match max_transfers {
                None => self.earliest.get(stop.id).copied().flatten(),
                Some(limit) => {
                    let last = (limit + 1).min(self.rounds.len() - 1);
                    self.rounds[..=last]
                        .iter()
                        .filter_map(|round| round[stop.id].as_ref())
                        .map(TripLeg::reaching_time)
                        .min_by_key(|r| r.arrival)
                }
            };
            if let Some(reached) = candidate {
                let better = best.is_none_or(|b| {
                    reached.arrival < b.arrival
                        || (reached.arrival == b.arrival && stop.id < best_stop)
                });
                if better {
                    best = Some(reached);
                    best_stop = stop.id;
                }
            }
        }
        best
    }

    /// Every reached stop with its best arrival, in stop-id order.
    pub fn arrivals(&self) -> impl Iterator<Item = (StopId, ReachingTime)> + '_ {
        self.earliest
            .iter()
            .enumerate()
            .filter_map(|(stop, reached)| reached.map(|r| (stop, r)))
    }

    /// Reconstruct the best journey to the query's destination set.
    pub fn best_journey(&self) -> Option<Journey> {
        let destinations = self.destinations.clone();
        self.best_journey_among(destinations.iter().map(String::as_str))
    }

    /// Reconstruct the best journey to one explicit destination.
    pub fn best_journey_to(&self, external_id: &str) -> Option<Journey> {
        self.best_journey_among(std::iter::once(external_id))
    }

    fn best_journey_among<'a, I: Iterator<Item = &'a str>>(&self, external_ids: I) -> Option<Journey> {
        let mut winner: Option<(Time, StopId)> = None;
        for external_id in external_ids {
            for stop in self.stops.equivalent_stops(external_id) {
                let Some(reached) = self.earliest.get(stop.id).copied().flatten() else {
                    continue;
                };
                let better = winner.is_none_or(|(arrival, id)| {
                    reached.arrival < arrival || (reached.arrival == arrival && stop.id < id)
                });
                if better {
                    winner = Some((reached.arrival, stop.id));
                }
            }
        }
        winner.map(|(_, stop)| self.reconstruct(stop))
    }

    /// Walk the round tables backwards from `stop` to the seed.
    ///
    /// A vehicle leg was boarded on the previous round's arrival at its
    /// boarding stop; a transfer leg stays within its round. Panics if the
    /// chain is broken, which would mean corrupted tables.
    fn reconstruct(&self, stop: StopId) -> Journey {
        let arrival_time = self.earliest[stop]
            .expect("reconstruction starts at a reached stop")
            .arrival;
        let mut round = self
            .rounds
            .iter()
            .position(|r| r[stop].as_ref().is_some_and(|t| t.arrival == arrival_time))
            .expect("best arrival missing from every round");

        let mut legs = Vec::new();
        let mut current = stop;
        let departure_time = loop {
            let record = self.rounds[round][current]
                .as_ref()
                .expect("arrival chain broken in round tables");
            match &record.leg {
                None => break record.arrival,
                Some(leg) => {
                    legs.push(leg.clone());
                    current = leg.from_stop();
                    if !leg.is_transfer() {
                        round -= 1;
                    }
                }
            }
        };

        legs.reverse();
        Journey {
            legs,
            departure_time,
            arrival_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::loading::TimetableBuilder;
    use crate::model::time::Time;
    use crate::model::timetable::{RouteType, TransferType};
    use crate::routing::leg::Leg;
    use crate::routing::query::Query;
    use crate::routing::router::Router;

    fn at(hours: u16, minutes: u16) -> Time {
        Time::from_hm(hours, minutes)
    }

    #[test]
    fn journey_legs_come_back_in_travel_order() {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "b", "c", "d"] {
            builder.add_stop(id, id);
        }
        builder
            .add_service_line(RouteType::Bus, "1")
            .trip(&[("a", "08:00"), ("b", "08:20")]);
        builder
            .add_service_line(RouteType::Bus, "2")
            .trip(&[("c", "08:40"), ("d", "09:00")]);
        builder
            .transfer("b", "c", TransferType::RequiresMinimalTime, Some(300))
            .unwrap();
        let (stops, timetable) = builder.build().unwrap();

        let query = Query::builder()
            .from("a")
            .to("d")
            .departure_time(at(8, 0))
            .build();
        let journey = Router::new(&timetable, &stops)
            .route(&query)
            .best_journey()
            .unwrap();

        assert_eq!(journey.legs().len(), 3);
        assert!(!journey.legs()[0].is_transfer());
        assert!(journey.legs()[1].is_transfer());
        assert!(!journey.legs()[2].is_transfer());
        assert_eq!(journey.departure_time(), at(8, 0));
        assert_eq!(journey.arrival_time(), at(9, 0));
        assert_eq!(journey.nb_vehicle_legs(), 2);

        // Legs link up stop to stop.
        for pair in journey.legs().windows(2) {
            assert_eq!(pair[0].to_stop(), pair[1].from_stop());
        }
    }

    #[test]
    fn arrival_bounded_by_transfers_sees_only_early_rounds() {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "b", "c"] {
            builder.add_stop(id, id);
        }
        // Slow direct line and a fast two-leg alternative via b.
        builder
            .add_service_line(RouteType::Bus, "slow")
            .trip(&[("a", "08:00"), ("c", "10:00")]);
        builder
            .add_service_line(RouteType::Bus, "fast-1")
            .trip(&[("a", "08:00"), ("b", "08:30")]);
        builder
            .add_service_line(RouteType::Bus, "fast-2")
            .trip(&[("b", "08:40"), ("c", "09:10")]);
        let (stops, timetable) = builder.build().unwrap();

        let query = Query::builder()
            .from("a")
            .to("c")
            .departure_time(at(8, 0))
            .build();
        let result = Router::new(&timetable, &stops).route(&query);

        assert_eq!(result.arrival_at("c", Some(0)).unwrap().arrival, at(10, 0));
        assert_eq!(result.arrival_at("c", None).unwrap().arrival, at(9, 10));
    }

    #[test]
    fn unknown_destination_yields_nothing() {
        let mut builder = TimetableBuilder::new();
        builder.add_stop("a", "a");
        builder.add_stop("b", "b");
        builder
            .add_service_line(RouteType::Bus, "1")
            .trip(&[("a", "08:00"), ("b", "08:20")]);
        let (stops, timetable) = builder.build().unwrap();

        let query = Query::builder()
            .from("a")
            .to("ghost")
            .departure_time(at(8, 0))
            .build();
        let result = Router::new(&timetable, &stops).route(&query);
        assert!(result.best_journey().is_none());
        assert!(result.arrival_at("ghost", None).is_none());
    }

    #[test]
    fn vehicle_leg_carries_boarding_details() {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "b", "c"] {
            builder.add_stop(id, id);
        }
        builder
            .add_service_line(RouteType::Rail, "S1")
            .trip(&[("a", "08:00"), ("b", "08:15"), ("c", "08:30")]);
        let (stops, timetable) = builder.build().unwrap();

        let query = Query::builder()
            .from("a")
            .to("c")
            .departure_time(at(7, 55))
            .build();
        let journey = Router::new(&timetable, &stops)
            .route(&query)
            .best_journey()
            .unwrap();

        match &journey.legs()[0] {
            Leg::Vehicle {
                from,
                to,
                service_line,
                departure_time,
                arrival_time,
            } => {
                assert_eq!(stops.by_internal_id(*from).unwrap().external_id, "a");
                assert_eq!(stops.by_internal_id(*to).unwrap().external_id, "c");
                assert_eq!(timetable.service_line(*service_line).name, "S1");
                assert_eq!(*departure_time, at(8, 0));
                assert_eq!(*arrival_time, at(8, 30));
            }
            leg => panic!("expected a vehicle leg, got {leg:?}"),
        }
    }
}
