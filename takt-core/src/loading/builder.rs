//! Programmatic timetable construction.
//!
//! All build paths (the GTFS processor, the storage loader's consumers and
//! test fixtures) funnel through [`TimetableBuilder`], which owns the model
//! invariants: dense stop ids, parent/child linkage, non-overtaking sorted
//! trip matrices and the compact-representation bounds.

use hashbrown::HashMap;
use log::debug;

use crate::error::{Error, Result};
use crate::model::route::{PickupDropoff, Route, pack_rules};
use crate::model::stops::{LocationType, Stop, Stops};
use crate::model::time::{Duration, Time};
use crate::model::timetable::{
    RouteType, ServiceLine, StopAdjacency, Timetable, Transfer, TransferType,
};
use crate::{ServiceLineId, StopId};

/// One stop event of a trip under construction.
#[derive(Debug, Clone, Copy)]
pub struct TripEvent {
    pub stop: StopId,
    pub arrival: Time,
    pub departure: Time,
    pub pickup: PickupDropoff,
    pub dropoff: PickupDropoff,
}

#[derive(Debug, Clone)]
struct StopDraft {
    external_id: String,
    name: String,
    lat: Option<f64>,
    lon: Option<f64>,
    platform: Option<String>,
    location_type: LocationType,
    parent_external: Option<String>,
}

#[derive(Debug, Clone)]
struct LineDraft {
    kind: RouteType,
    name: String,
    trips: Vec<Vec<TripEvent>>,
}

/// Accumulates stops, service lines, trips and transfers, then freezes them
/// into a validated ([`Stops`], [`Timetable`]) pair.
#[derive(Debug, Default)]
pub struct TimetableBuilder {
    stops: Vec<StopDraft>,
    by_external: HashMap<String, StopId>,
    lines: Vec<LineDraft>,
    transfers: Vec<(StopId, Transfer)>,
}

impl TimetableBuilder {
    pub fn new() -> TimetableBuilder {
        TimetableBuilder::default()
    }

    /// Add a plain stop or platform without a parent; returns its dense id.
    /// Re-adding a known external id returns the existing stop.
    pub fn add_stop(&mut self, external_id: &str, name: &str) -> StopId {
        self.add_stop_full(external_id, name, None, None, None, LocationType::default(), None)
    }

    pub fn add_station(&mut self, external_id: &str, name: &str) -> StopId {
        self.add_stop_full(external_id, name, None, None, None, LocationType::Station, None)
    }

    /// Add a platform belonging to a station; the station may be added before
    /// or after, the link is resolved when building.
    pub fn add_platform(
        &mut self,
        external_id: &str,
        name: &str,
        parent_external: &str,
        platform: Option<&str>,
    ) -> StopId {
        self.add_stop_full(
            external_id,
            name,
            None,
            None,
            platform,
            LocationType::SimpleStopOrPlatform,
            Some(parent_external),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_stop_full(
        &mut self,
        external_id: &str,
        name: &str,
        lat: Option<f64>,
        lon: Option<f64>,
        platform: Option<&str>,
        location_type: LocationType,
        parent_external: Option<&str>,
    ) -> StopId {
        if let Some(&id) = self.by_external.get(external_id) {
            return id;
        }
        let id = self.stops.len();
        self.stops.push(StopDraft {
            external_id: external_id.to_string(),
            name: name.to_string(),
            lat,
            lon,
            platform: platform.map(str::to_string),
            location_type,
            parent_external: parent_external.map(str::to_string),
        });
        self.by_external.insert(external_id.to_string(), id);
        id
    }

    pub fn stop_id(&self, external_id: &str) -> Option<StopId> {
        self.by_external.get(external_id).copied()
    }

    /// Open a service line; trips are attached through the returned handle.
    pub fn add_service_line(&mut self, kind: RouteType, name: &str) -> ServiceLineBuilder<'_> {
        self.lines.push(LineDraft {
            kind,
            name: name.to_string(),
            trips: Vec::new(),
        });
        let line = self.lines.len() - 1;
        ServiceLineBuilder { builder: self, line }
    }

    /// Add a modeled transfer edge between two known stops.
    pub fn transfer(
        &mut self,
        from_external: &str,
        to_external: &str,
        kind: TransferType,
        min_transfer_seconds: Option<u32>,
    ) -> Result<&mut Self> {
        let from = self
            .stop_id(from_external)
            .ok_or_else(|| Error::UnknownStop(from_external.to_string()))?;
        let destination = self
            .stop_id(to_external)
            .ok_or_else(|| Error::UnknownStop(to_external.to_string()))?;
        self.transfers.push((
            from,
            Transfer {
                destination,
                kind,
                min_transfer_time: min_transfer_seconds.map(Duration::from_seconds),
            },
        ));
        Ok(self)
    }

    /// Freeze everything into the immutable model.
    pub fn build(self) -> Result<(Stops, Timetable)> {
        if self.stops.len() >= u32::MAX as usize {
            return Err(Error::MalformedTimetable(format!(
                "{} stops exceed the compact id range",
                self.stops.len()
            )));
        }

        let stops = self.link_stops()?;

        let mut routes = Vec::new();
        let mut service_lines = Vec::new();
        for (line_id, line) in self.lines.into_iter().enumerate() {
            let route_ids = build_line_routes(line_id, &line, &mut routes)?;
            service_lines.push(ServiceLine {
                kind: line.kind,
                name: line.name,
                routes: route_ids,
            });
        }

        let mut adjacency = vec![StopAdjacency::default(); stops.len()];
        for (route_id, route) in routes.iter().enumerate() {
            for &stop in route.stops() {
                let routes_here = &mut adjacency
                    .get_mut(stop)
                    .ok_or_else(|| {
                        Error::MalformedTimetable(format!("trip references unknown stop {stop}"))
                    })?
                    .routes;
                if !routes_here.contains(&route_id) {
                    routes_here.push(route_id);
                }
            }
        }
        for (from, transfer) in self.transfers {
            adjacency[from].transfers.push(transfer);
        }

        let timetable = Timetable::new(adjacency, routes, service_lines)?;
        debug!(
            "built timetable: {} stops, {} routes, {} service lines",
            stops.len(),
            timetable.routes().len(),
            timetable.service_lines().len()
        );
        Ok((stops, timetable))
    }

    fn link_stops(&self) -> Result<Stops> {
        let mut children: Vec<Vec<StopId>> = vec![Vec::new(); self.stops.len()];
        let mut parents: Vec<Option<StopId>> = vec![None; self.stops.len()];
        for (id, draft) in self.stops.iter().enumerate() {
            if let Some(parent_external) = &draft.parent_external {
                let parent = self
                    .by_external
                    .get(parent_external.as_str())
                    .copied()
                    .ok_or_else(|| Error::UnknownStop(parent_external.clone()))?;
                parents[id] = Some(parent);
                children[parent].push(id);
            }
        }

        let stops = self
            .stops
            .iter()
            .enumerate()
            .map(|(id, draft)| Stop {
                id,
                external_id: draft.external_id.clone(),
                name: draft.name.clone(),
                lat: draft.lat,
                lon: draft.lon,
                platform: draft.platform.clone(),
                location_type: draft.location_type,
                parent: parents[id],
                children: std::mem::take(&mut children[id]),
            })
            .collect();
        Stops::new(stops)
    }
}

/// Handle attaching trips to one service line.
pub struct ServiceLineBuilder<'a> {
    builder: &'a mut TimetableBuilder,
    line: usize,
}

impl ServiceLineBuilder<'_> {
    /// Add a simple trip from `(external stop id, clock time)` pairs: arrival
    /// equals departure, pickup and drop-off are regular.
    ///
    /// # Panics
    ///
    /// On an unknown stop id or an unparseable time; this convenience path is
    /// for fixtures and demos where both are authored by hand.
    pub fn trip(self, events: &[(&str, &str)]) -> Self {
        let events: Vec<TripEvent> = events
            .iter()
            .map(|&(external_id, clock)| {
                let stop = self
                    .builder
                    .stop_id(external_id)
                    .unwrap_or_else(|| panic!("trip references unknown stop '{external_id}'"));
                let time: Time = clock
                    .parse()
                    .unwrap_or_else(|e| panic!("bad trip time '{clock}': {e}"));
                TripEvent {
                    stop,
                    arrival: time,
                    departure: time,
                    pickup: PickupDropoff::Regular,
                    dropoff: PickupDropoff::Regular,
                }
            })
            .collect();
        self.trip_with(events)
    }

    /// Add a trip with full control over events.
    pub fn trip_with(self, events: Vec<TripEvent>) -> Self {
        self.builder.lines[self.line].trips.push(events);
        self
    }

    pub fn id(&self) -> ServiceLineId {
        self.line
    }
}

/// Group a line's trips by exact stop sequence, sort each group by departure
/// and split groups whose trips overtake each other, yielding the line's
/// route set.
fn build_line_routes(
    line_id: ServiceLineId,
    line: &LineDraft,
    routes: &mut Vec<Route>,
) -> Result<Vec<usize>> {
    let mut by_sequence: HashMap<Vec<StopId>, Vec<&Vec<TripEvent>>> = HashMap::new();
    for trip in &line.trips {
        if trip.len() < 2 {
            return Err(Error::MalformedTimetable(format!(
                "line '{}' has a trip with {} stop events",
                line.name,
                trip.len()
            )));
        }
        let sequence: Vec<StopId> = trip.iter().map(|e| e.stop).collect();
        by_sequence.entry(sequence).or_default().push(trip);
    }

    // Deterministic route numbering regardless of hash order.
    let mut sequences: Vec<(Vec<StopId>, Vec<&Vec<TripEvent>>)> = by_sequence.into_iter().collect();
    sequences.sort_by(|a, b| a.0.cmp(&b.0));

    let mut route_ids = Vec::new();
    for (sequence, mut trips) in sequences {
        trips.sort_by_key(|trip| trip[0].departure);

        // Trips overtaking an earlier trip at any position go to a sibling
        // route, keeping every route's matrix binary-searchable.
        let mut layers: Vec<Vec<&Vec<TripEvent>>> = Vec::new();
        for trip in trips {
            let slot = layers
                .iter()
                .position(|layer| !overtakes(layer.last().unwrap(), trip));
            match slot {
                Some(i) => layers[i].push(trip),
                None => layers.push(vec![trip]),
            }
        }
        if layers.len() > 1 {
            debug!(
                "line '{}': split {} overtaking trips into {} routes",
                line.name,
                layers.iter().map(Vec::len).sum::<usize>(),
                layers.len()
            );
        }

        for layer in layers {
            let mut stop_times = Vec::with_capacity(2 * sequence.len() * layer.len());
            let mut rules = Vec::with_capacity(sequence.len() * layer.len());
            for trip in &layer {
                for event in trip.iter() {
                    stop_times.push(event.arrival.minutes());
                    stop_times.push(event.departure.minutes());
                    rules.push((event.pickup, event.dropoff));
                }
            }
            route_ids.push(routes.len());
            routes.push(Route::new(
                line_id,
                sequence.clone(),
                stop_times,
                pack_rules(rules),
            )?);
        }
    }
    Ok(route_ids)
}

/// Whether `next` would overtake `prev` at any position.
fn overtakes(prev: &[TripEvent], next: &[TripEvent]) -> bool {
    prev.iter()
        .zip(next)
        .any(|(p, n)| n.departure < p.departure || n.arrival < p.arrival)
}

#[cfg(test)]
mod tests {
    use super::TimetableBuilder;
    use crate::model::time::Time;
    use crate::model::timetable::{RouteType, TransferType};

    #[test]
    fn groups_trips_of_one_sequence_into_one_route() {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "b", "c"] {
            builder.add_stop(id, id);
        }
        builder
            .add_service_line(RouteType::Bus, "10")
            .trip(&[("a", "08:00"), ("b", "08:10"), ("c", "08:20")])
            .trip(&[("a", "09:00"), ("b", "09:10"), ("c", "09:20")]);
        let (_, timetable) = builder.build().unwrap();
        assert_eq!(timetable.routes().len(), 1);
        assert_eq!(timetable.routes()[0].nb_trips(), 2);
    }

    #[test]
    fn distinct_sequences_become_route_variants() {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "b", "c"] {
            builder.add_stop(id, id);
        }
        builder
            .add_service_line(RouteType::Bus, "10")
            .trip(&[("a", "08:00"), ("b", "08:10"), ("c", "08:20")])
            .trip(&[("a", "09:00"), ("c", "09:20")]);
        let (_, timetable) = builder.build().unwrap();
        assert_eq!(timetable.routes().len(), 2);
        assert_eq!(timetable.service_lines()[0].routes.len(), 2);
    }

    #[test]
    fn overtaking_trips_split_into_sibling_routes() {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "b"] {
            builder.add_stop(id, id);
        }
        // The 08:05 express reaches b before the 08:00 stopper.
        builder
            .add_service_line(RouteType::Rail, "R")
            .trip(&[("a", "08:00"), ("b", "08:40")])
            .trip(&[("a", "08:05"), ("b", "08:25")]);
        let (_, timetable) = builder.build().unwrap();
        assert_eq!(timetable.routes().len(), 2);
        for route in timetable.routes() {
            assert_eq!(route.nb_trips(), 1);
        }
    }

    #[test]
    fn stations_link_platforms_in_both_directions() {
        let mut builder = TimetableBuilder::new();
        builder.add_platform("s:1", "Central pl. 1", "s", Some("1"));
        builder.add_station("s", "Central");
        builder.add_platform("s:2", "Central pl. 2", "s", Some("2"));
        builder.add_stop("x", "x");
        builder
            .add_service_line(RouteType::Rail, "S1")
            .trip(&[("s:1", "08:00"), ("x", "08:30")]);
        let (stops, _) = builder.build().unwrap();

        let station = stops.by_external_id("s").unwrap();
        assert_eq!(station.children, vec![0, 2]);
        assert_eq!(stops.by_external_id("s:2").unwrap().parent, Some(1));
    }

    #[test]
    fn transfer_to_unknown_stop_is_rejected() {
        let mut builder = TimetableBuilder::new();
        builder.add_stop("a", "a");
        assert!(
            builder
                .transfer("a", "ghost", TransferType::Recommended, None)
                .is_err()
        );
    }

    #[test]
    fn trip_times_survive_the_round_trip() {
        let mut builder = TimetableBuilder::new();
        for id in ["a", "b"] {
            builder.add_stop(id, id);
        }
        builder
            .add_service_line(RouteType::Bus, "N")
            .trip(&[("a", "23:50"), ("b", "25:30")]);
        let (_, timetable) = builder.build().unwrap();
        let route = &timetable.routes()[0];
        assert_eq!(route.departure(0, 0), Time::from_minutes(1430));
        assert_eq!(route.arrival(0, 1), Time::from_minutes(1530));
    }
}
