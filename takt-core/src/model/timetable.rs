//! The frozen timetable: routes, stop adjacency and service-line metadata.

use fixedbitset::FixedBitSet;
use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::model::route::Route;
use crate::model::time::Duration;
use crate::{RouteId, ServiceLineId, StopId};

/// How a modeled transfer edge may be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferType {
    #[default]
    Recommended,
    Guaranteed,
    RequiresMinimalTime,
    InSeat,
}

impl TransferType {
    pub fn from_code(code: u8) -> Option<TransferType> {
        match code {
            0 => Some(TransferType::Recommended),
            1 => Some(TransferType::Guaranteed),
            2 => Some(TransferType::RequiresMinimalTime),
            3 => Some(TransferType::InSeat),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            TransferType::Recommended => 0,
            TransferType::Guaranteed => 1,
            TransferType::RequiresMinimalTime => 2,
            TransferType::InSeat => 3,
        }
    }
}

/// A walking or cross-platform edge to another stop.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub destination: StopId,
    pub kind: TransferType,
    pub min_transfer_time: Option<Duration>,
}

/// Vehicle kind of a service line, GTFS route-type numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteType {
    Tram,
    Subway,
    Rail,
    Bus,
    Ferry,
    CableTram,
    AerialLift,
    Funicular,
    Trolleybus,
    Monorail,
}

impl RouteType {
    pub const ALL: [RouteType; 10] = [
        RouteType::Tram,
        RouteType::Subway,
        RouteType::Rail,
        RouteType::Bus,
        RouteType::Ferry,
        RouteType::CableTram,
        RouteType::AerialLift,
        RouteType::Funicular,
        RouteType::Trolleybus,
        RouteType::Monorail,
    ];

    pub fn from_code(code: u16) -> Option<RouteType> {
        match code {
            0 => Some(RouteType::Tram),
            1 => Some(RouteType::Subway),
            2 => Some(RouteType::Rail),
            3 => Some(RouteType::Bus),
            4 => Some(RouteType::Ferry),
            5 => Some(RouteType::CableTram),
            6 => Some(RouteType::AerialLift),
            7 => Some(RouteType::Funicular),
            11 => Some(RouteType::Trolleybus),
            12 => Some(RouteType::Monorail),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            RouteType::Tram => 0,
            RouteType::Subway => 1,
            RouteType::Rail => 2,
            RouteType::Bus => 3,
            RouteType::Ferry => 4,
            RouteType::CableTram => 5,
            RouteType::AerialLift => 6,
            RouteType::Funicular => 7,
            RouteType::Trolleybus => 11,
            RouteType::Monorail => 12,
        }
    }

    fn bit(self) -> u16 {
        match self {
            RouteType::Tram => 1 << 0,
            RouteType::Subway => 1 << 1,
            RouteType::Rail => 1 << 2,
            RouteType::Bus => 1 << 3,
            RouteType::Ferry => 1 << 4,
            RouteType::CableTram => 1 << 5,
            RouteType::AerialLift => 1 << 6,
            RouteType::Funicular => 1 << 7,
            RouteType::Trolleybus => 1 << 8,
            RouteType::Monorail => 1 << 9,
        }
    }
}

/// A set of vehicle kinds, used to filter which routes a query may board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSet(u16);

impl ModeSet {
    pub const ALL: ModeSet = ModeSet(0x03ff);
    pub const EMPTY: ModeSet = ModeSet(0);

    pub fn insert(&mut self, mode: RouteType) {
        self.0 |= mode.bit();
    }

    pub fn contains(self, mode: RouteType) -> bool {
        self.0 & mode.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = RouteType> {
        RouteType::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<RouteType> for ModeSet {
    fn from_iter<I: IntoIterator<Item = RouteType>>(iter: I) -> ModeSet {
        let mut set = ModeSet::EMPTY;
        for mode in iter {
            set.insert(mode);
        }
        set
    }
}

/// A user-facing transport line; its routes are the stop-list variants.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceLine {
    pub kind: RouteType,
    pub name: String,
    pub routes: Vec<RouteId>,
}

/// Per-stop adjacency: the routes serving it and its outgoing transfers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopAdjacency {
    pub routes: Vec<RouteId>,
    pub transfers: Vec<Transfer>,
}

/// The complete schedule side of the model. Immutable after construction and
/// safe to share across concurrently running queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Timetable {
    stops_adjacency: Vec<StopAdjacency>,
    routes: Vec<Route>,
    service_lines: Vec<ServiceLine>,
    active_stops: FixedBitSet,
}

impl Timetable {
    /// Freeze the tables, checking cross-references between them.
    pub fn new(
        stops_adjacency: Vec<StopAdjacency>,
        routes: Vec<Route>,
        service_lines: Vec<ServiceLine>,
    ) -> Result<Timetable> {
        let malformed = |msg: String| Error::MalformedTimetable(msg);
        let nb_stops = stops_adjacency.len();

        for (stop, adjacency) in stops_adjacency.iter().enumerate() {
            for &route_id in &adjacency.routes {
                let on_route = routes
                    .get(route_id)
                    .is_some_and(|r| r.position_of(stop).is_some());
                if !on_route {
                    return Err(malformed(format!(
                        "stop {stop} references route {route_id} which does not serve it"
                    )));
                }
            }
            for transfer in &adjacency.transfers {
                if transfer.destination >= nb_stops {
                    return Err(malformed(format!(
                        "transfer from stop {stop} to unknown stop {}",
                        transfer.destination
                    )));
                }
            }
        }
        for (route_id, route) in routes.iter().enumerate() {
            if route.service_line() >= service_lines.len() {
                return Err(malformed(format!(
                    "route {route_id} references unknown service line {}",
                    route.service_line()
                )));
            }
            for &stop in route.stops() {
                if stop >= nb_stops {
                    return Err(malformed(format!(
                        "route {route_id} serves unknown stop {stop}"
                    )));
                }
                if !stops_adjacency[stop].routes.contains(&route_id) {
                    return Err(malformed(format!(
                        "stop {stop} is missing route {route_id} in its adjacency"
                    )));
                }
            }
        }
        for (line_id, line) in service_lines.iter().enumerate() {
            for &route_id in &line.routes {
                let owned = routes.get(route_id).is_some_and(|r| r.service_line() == line_id);
                if !owned {
                    return Err(malformed(format!(
                        "service line {line_id} lists route {route_id} it does not own"
                    )));
                }
            }
        }

        let mut active_stops = FixedBitSet::with_capacity(nb_stops);
        for route in &routes {
            for &stop in route.stops() {
                active_stops.set(stop, true);
            }
        }
        for adjacency in &stops_adjacency {
            for transfer in &adjacency.transfers {
                active_stops.set(transfer.destination, true);
            }
        }

        Ok(Timetable {
            stops_adjacency,
            routes,
            service_lines,
            active_stops,
        })
    }

    pub fn nb_stops(&self) -> usize {
        self.stops_adjacency.len()
    }

    pub fn route(&self, route_id: RouteId) -> Option<&Route> {
        self.routes.get(route_id)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn stops_adjacency(&self) -> &[StopAdjacency] {
        &self.stops_adjacency
    }

    pub fn transfers(&self, stop: StopId) -> &[Transfer] {
        &self.stops_adjacency[stop].transfers
    }

    pub fn routes_through(&self, stop: StopId) -> &[RouteId] {
        &self.stops_adjacency[stop].routes
    }

    pub fn service_lines(&self) -> &[ServiceLine] {
        &self.service_lines
    }

    pub fn service_line(&self, line: ServiceLineId) -> &ServiceLine {
        &self.service_lines[line]
    }

    pub fn service_line_of(&self, route: &Route) -> &ServiceLine {
        &self.service_lines[route.service_line()]
    }

    /// Whether the stop is served by at least one route or transfer edge.
    pub fn is_active(&self, stop: StopId) -> bool {
        self.active_stops.contains(stop)
    }

    /// Routes touching any marked stop, each with its earliest marked hop-on
    /// stop; scanning a route from the earliest hop-on covers every other
    /// marked stop of the same route downstream.
    pub fn reachable_routes(
        &self,
        marked: &FixedBitSet,
        modes: ModeSet,
    ) -> HashMap<RouteId, StopId> {
        let mut reachable: HashMap<RouteId, StopId> = HashMap::new();
        for stop in marked.ones() {
            for &route_id in self.routes_through(stop) {
                let route = &self.routes[route_id];
                if !modes.contains(self.service_lines[route.service_line()].kind) {
                    continue;
                }
                reachable
                    .entry(route_id)
                    .and_modify(|hop_on| {
                        if route.is_before(stop, *hop_on) {
                            *hop_on = stop;
                        }
                    })
                    .or_insert(stop);
            }
        }
        reachable
    }
}

#[cfg(test)]
mod tests {
    use fixedbitset::FixedBitSet;

    use super::{ModeSet, RouteType, ServiceLine, StopAdjacency, Timetable};
    use crate::model::route::{PickupDropoff, Route, pack_rules};

    fn plain_route(line: usize, stops: Vec<usize>, first_departure: u16) -> Route {
        let nb = stops.len();
        let mut times = Vec::new();
        for position in 0..nb as u16 {
            let t = first_departure + 10 * position;
            times.push(t);
            times.push(t);
        }
        let rules = pack_rules((0..nb).map(|_| (PickupDropoff::Regular, PickupDropoff::Regular)));
        Route::new(line, stops, times, rules).unwrap()
    }

    fn sample_timetable() -> Timetable {
        // Route 0 (bus): 0 -> 1 -> 2; route 1 (rail): 2 -> 1 -> 3.
        let routes = vec![
            plain_route(0, vec![0, 1, 2], 480),
            plain_route(1, vec![2, 1, 3], 490),
        ];
        let service_lines = vec![
            ServiceLine {
                kind: RouteType::Bus,
                name: "10".to_string(),
                routes: vec![0],
            },
            ServiceLine {
                kind: RouteType::Rail,
                name: "S1".to_string(),
                routes: vec![1],
            },
        ];
        let mut adjacency = vec![StopAdjacency::default(); 5];
        adjacency[0].routes = vec![0];
        adjacency[1].routes = vec![0, 1];
        adjacency[2].routes = vec![0, 1];
        adjacency[3].routes = vec![1];
        Timetable::new(adjacency, routes, service_lines).unwrap()
    }

    fn marked(stops: &[usize], len: usize) -> FixedBitSet {
        let mut set = FixedBitSet::with_capacity(len);
        for &stop in stops {
            set.set(stop, true);
        }
        set
    }

    #[test]
    fn earliest_hop_on_wins() {
        let timetable = sample_timetable();
        // Stops 1 and 2 are both on route 1, in order 2 -> 1.
        let reachable = timetable.reachable_routes(&marked(&[1, 2], 5), ModeSet::ALL);
        assert_eq!(reachable[&1], 2);
        assert_eq!(reachable[&0], 1);
    }

    #[test]
    fn modes_filter_routes() {
        let timetable = sample_timetable();
        let rail_only: ModeSet = [RouteType::Rail].into_iter().collect();
        let reachable = timetable.reachable_routes(&marked(&[1], 5), rail_only);
        assert!(reachable.contains_key(&1));
        assert!(!reachable.contains_key(&0));
    }

    #[test]
    fn activity_tracks_routes_and_transfers() {
        let timetable = sample_timetable();
        assert!(timetable.is_active(0));
        assert!(timetable.is_active(3));
        assert!(!timetable.is_active(4));
    }

    #[test]
    fn rejects_dangling_references() {
        let routes = vec![plain_route(0, vec![0, 1], 480)];
        let lines = vec![ServiceLine {
            kind: RouteType::Bus,
            name: "10".to_string(),
            routes: vec![0],
        }];
        // Adjacency smaller than the stops the route serves.
        let adjacency = vec![StopAdjacency {
            routes: vec![0],
            transfers: Vec::new(),
        }];
        assert!(Timetable::new(adjacency, routes, lines).is_err());
    }
}
