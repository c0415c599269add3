//! One route per distinct ordered stop list of a service line.
//!
//! All trips sharing the exact stop sequence are packed into a single flat
//! time matrix, sorted by departure and non-overtaking at every position.
//! That ordering is what makes the earliest-trip lookup a binary search.

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::model::time::Time;
use crate::{ServiceLineId, StopId, TripIndex};

/// Pickup or drop-off constraint of one trip at one stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PickupDropoff {
    #[default]
    Regular,
    NotAvailable,
    MustPhoneAgency,
    MustCoordinateWithDriver,
}

impl PickupDropoff {
    pub fn from_code(code: u8) -> Option<PickupDropoff> {
        match code {
            0 => Some(PickupDropoff::Regular),
            1 => Some(PickupDropoff::NotAvailable),
            2 => Some(PickupDropoff::MustPhoneAgency),
            3 => Some(PickupDropoff::MustCoordinateWithDriver),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PickupDropoff::Regular => 0,
            PickupDropoff::NotAvailable => 1,
            PickupDropoff::MustPhoneAgency => 2,
            PickupDropoff::MustCoordinateWithDriver => 3,
        }
    }
}

/// Pack per-slot (pickup, drop-off) pairs at 4 bits per stop-occurrence.
///
/// Slot `i` lives in byte `i / 2`; the even slot occupies the low nibble.
/// Within a nibble the low 2 bits are the pickup rule, the high 2 bits the
/// drop-off rule. The byte layout is shared with the on-disk store.
pub fn pack_rules<I>(slots: I) -> Vec<u8>
where
    I: IntoIterator<Item = (PickupDropoff, PickupDropoff)>,
{
    let mut bytes = Vec::new();
    for (i, (pickup, dropoff)) in slots.into_iter().enumerate() {
        let nibble = pickup.code() | (dropoff.code() << 2);
        if i % 2 == 0 {
            bytes.push(nibble);
        } else {
            bytes[i / 2] |= nibble << 4;
        }
    }
    bytes
}

/// All trips of a service line that share one exact ordered stop list.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    service_line: ServiceLineId,
    stops: Vec<StopId>,
    /// Position of each stop within `stops` (first occurrence wins).
    stop_index: HashMap<StopId, usize>,
    /// Interleaved `[arrival, departure]` minutes, trip-major: the time pair
    /// of trip `t` at position `p` starts at `2 * (t * nb_stops + p)`.
    stop_times: Vec<u16>,
    /// 4 bits per stop-occurrence, see [`pack_rules`].
    pickup_dropoff: Vec<u8>,
}

impl Route {
    /// Assemble and validate a route.
    ///
    /// `stop_times` must hold `2 * stops.len() * nb_trips` minute values and
    /// satisfy the ordering invariants: within a trip, arrival ≤ departure ≤
    /// next arrival; across consecutive trips, arrivals and departures are
    /// non-decreasing at every position (no overtaking).
    pub fn new(
        service_line: ServiceLineId,
        stops: Vec<StopId>,
        stop_times: Vec<u16>,
        pickup_dropoff: Vec<u8>,
    ) -> Result<Route> {
        let malformed = |msg: String| Error::MalformedTimetable(msg);

        let nb_stops = stops.len();
        if nb_stops < 2 {
            return Err(malformed(format!(
                "route of line {service_line} has {nb_stops} stops, need at least 2"
            )));
        }
        let stride = 2 * nb_stops;
        if stop_times.is_empty() || stop_times.len() % stride != 0 {
            return Err(malformed(format!(
                "route of line {service_line}: {} time values do not tile {nb_stops} stops",
                stop_times.len()
            )));
        }
        let nb_trips = stop_times.len() / stride;
        let expected_rule_bytes = (nb_stops * nb_trips).div_ceil(2);
        if pickup_dropoff.len() != expected_rule_bytes {
            return Err(malformed(format!(
                "route of line {service_line}: {} pickup/drop-off bytes, expected {expected_rule_bytes}",
                pickup_dropoff.len()
            )));
        }

        let mut stop_index = HashMap::with_capacity(nb_stops);
        for (position, &stop) in stops.iter().enumerate() {
            stop_index.entry(stop).or_insert(position);
        }

        let route = Route {
            service_line,
            stops,
            stop_index,
            stop_times,
            pickup_dropoff,
        };
        route.check_time_ordering()?;
        Ok(route)
    }

    fn check_time_ordering(&self) -> Result<()> {
        let line = self.service_line;
        for trip in 0..self.nb_trips() {
            for position in 0..self.nb_stops() {
                if self.arrival(trip, position) > self.departure(trip, position) {
                    return Err(Error::MalformedTimetable(format!(
                        "line {line}: trip {trip} departs position {position} before arriving"
                    )));
                }
                if position + 1 < self.nb_stops()
                    && self.departure(trip, position) > self.arrival(trip, position + 1)
                {
                    return Err(Error::MalformedTimetable(format!(
                        "line {line}: trip {trip} arrives at position {} before departing {position}",
                        position + 1
                    )));
                }
                if trip + 1 < self.nb_trips() {
                    let overtakes = self.departure(trip, position)
                        > self.departure(trip + 1, position)
                        || self.arrival(trip, position) > self.arrival(trip + 1, position);
                    if overtakes {
                        return Err(Error::MalformedTimetable(format!(
                            "line {line}: trip {} overtakes trip {trip} at position {position}",
                            trip + 1
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn nb_stops(&self) -> usize {
        self.stops.len()
    }

    pub fn nb_trips(&self) -> usize {
        self.stop_times.len() / (2 * self.stops.len())
    }

    pub fn service_line(&self) -> ServiceLineId {
        self.service_line
    }

    pub fn stops(&self) -> &[StopId] {
        &self.stops
    }

    /// The packed time matrix, as stored on disk.
    pub(crate) fn raw_stop_times(&self) -> &[u16] {
        &self.stop_times
    }

    /// The packed pickup/drop-off bitmap, as stored on disk.
    pub(crate) fn raw_rules(&self) -> &[u8] {
        &self.pickup_dropoff
    }

    pub fn position_of(&self, stop: StopId) -> Option<usize> {
        self.stop_index.get(&stop).copied()
    }

    /// Whether `a` is served strictly before `b` on this route.
    ///
    /// # Panics
    ///
    /// If either stop is not part of the route; callers hold a stop obtained
    /// from this route's own stop list.
    pub fn is_before(&self, a: StopId, b: StopId) -> bool {
        self.stop_index[&a] < self.stop_index[&b]
    }

    #[inline]
    fn slot(&self, trip: TripIndex, position: usize) -> usize {
        trip * self.stops.len() + position
    }

    #[inline]
    pub fn arrival(&self, trip: TripIndex, position: usize) -> Time {
        Time::from_minutes(self.stop_times[2 * self.slot(trip, position)])
    }

    #[inline]
    pub fn departure(&self, trip: TripIndex, position: usize) -> Time {
        Time::from_minutes(self.stop_times[2 * self.slot(trip, position) + 1])
    }

    /// Arrival at a stop given by id; panics if the stop is not on the route.
    pub fn arrival_at(&self, stop: StopId, trip: TripIndex) -> Time {
        self.arrival(trip, self.stop_index[&stop])
    }

    /// Departure from a stop given by id; panics if the stop is not on the route.
    pub fn departure_from(&self, stop: StopId, trip: TripIndex) -> Time {
        self.departure(trip, self.stop_index[&stop])
    }

    #[inline]
    fn rule_nibble(&self, trip: TripIndex, position: usize) -> u8 {
        let slot = self.slot(trip, position);
        let byte = self.pickup_dropoff.get(slot / 2).copied().unwrap_or(0);
        if slot % 2 == 0 { byte & 0x0f } else { byte >> 4 }
    }

    #[inline]
    pub fn pickup_type(&self, trip: TripIndex, position: usize) -> PickupDropoff {
        // Unknown codes cannot appear: 2 bits cover exactly the 4 rules.
        PickupDropoff::from_code(self.rule_nibble(trip, position) & 0b11).unwrap()
    }

    #[inline]
    pub fn dropoff_type(&self, trip: TripIndex, position: usize) -> PickupDropoff {
        PickupDropoff::from_code(self.rule_nibble(trip, position) >> 2).unwrap()
    }

    pub fn pickup_type_at(&self, stop: StopId, trip: TripIndex) -> PickupDropoff {
        self.pickup_type(trip, self.stop_index[&stop])
    }

    pub fn dropoff_type_at(&self, stop: StopId, trip: TripIndex) -> PickupDropoff {
        self.dropoff_type(trip, self.stop_index[&stop])
    }

    /// Stops from `start` (or the route head) to the terminus, with positions.
    pub fn stops_from(
        &self,
        start: Option<StopId>,
    ) -> impl Iterator<Item = (usize, StopId)> + '_ {
        let first = start.map_or(0, |stop| self.stop_index[&stop]);
        self.stops
            .iter()
            .copied()
            .enumerate()
            .skip(first)
    }

    /// Earliest boardable trip at `position` departing at or after `after`.
    ///
    /// Only trips strictly before `before_trip` are considered (all trips if
    /// `None`). Because trips are sorted and non-overtaking at every position,
    /// the departure condition is monotone in the trip index: binary-search
    /// the first candidate, then skip forward over trips that do not pick up
    /// at this stop.
    pub fn earliest_trip(
        &self,
        position: usize,
        after: Time,
        before_trip: Option<TripIndex>,
    ) -> Option<TripIndex> {
        let upper = before_trip.map_or(self.nb_trips(), |t| t.min(self.nb_trips()));

        let mut low = 0;
        let mut high = upper;
        while low < high {
            let mid = (low + high) / 2;
            if self.departure(mid, position) >= after {
                high = mid;
            } else {
                low = mid + 1;
            }
        }

        (low..upper).find(|&trip| self.pickup_type(trip, position) != PickupDropoff::NotAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::{PickupDropoff, Route, pack_rules};
    use crate::model::time::Time;

    fn regular_rules(slots: usize) -> Vec<u8> {
        pack_rules((0..slots).map(|_| (PickupDropoff::Regular, PickupDropoff::Regular)))
    }

    /// Three trips over stops [5, 7, 9], departing 08:00 / 08:30 / 09:00.
    fn sample_route() -> Route {
        let mut times = Vec::new();
        for base in [480u16, 510, 540] {
            for position in 0..3u16 {
                let arrival = base + 10 * position;
                times.push(arrival);
                times.push(arrival + 1);
            }
        }
        Route::new(0, vec![5, 7, 9], times, regular_rules(9)).unwrap()
    }

    #[test]
    fn geometry_accessors() {
        let route = sample_route();
        assert_eq!(route.nb_stops(), 3);
        assert_eq!(route.nb_trips(), 3);
        assert!(route.is_before(5, 9));
        assert!(!route.is_before(9, 7));
        assert_eq!(route.arrival_at(7, 1), Time::from_minutes(520));
        assert_eq!(route.departure_from(7, 1), Time::from_minutes(521));
    }

    #[test]
    fn stops_from_restarts_anywhere() {
        let route = sample_route();
        let tail: Vec<_> = route.stops_from(Some(7)).collect();
        assert_eq!(tail, vec![(1, 7), (2, 9)]);
        let all: Vec<_> = route.stops_from(None).collect();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn earliest_trip_boundaries() {
        let route = sample_route();
        // Equality qualifies.
        assert_eq!(route.earliest_trip(0, Time::from_minutes(481), None), Some(0));
        assert_eq!(route.earliest_trip(0, Time::from_minutes(482), None), Some(1));
        // Past the last departure there is nothing to board.
        assert_eq!(route.earliest_trip(0, Time::from_minutes(600), None), None);
        // The cut excludes the boarded trip itself.
        assert_eq!(route.earliest_trip(0, Time::ZERO, Some(0)), None);
        assert_eq!(route.earliest_trip(0, Time::ZERO, Some(2)), Some(0));
    }

    #[test]
    fn earliest_trip_skips_closed_pickups() {
        let mut rules = Vec::new();
        for trip in 0..3 {
            for position in 0..3 {
                let pickup = if trip == 1 && position == 0 {
                    PickupDropoff::NotAvailable
                } else {
                    PickupDropoff::Regular
                };
                rules.push((pickup, PickupDropoff::Regular));
            }
        }
        let mut times = Vec::new();
        for base in [480u16, 510, 540] {
            for position in 0..3u16 {
                let arrival = base + 10 * position;
                times.push(arrival);
                times.push(arrival + 1);
            }
        }
        let route = Route::new(0, vec![5, 7, 9], times, pack_rules(rules)).unwrap();

        // 08:05 would catch trip 1, but it does not pick up at the head stop.
        assert_eq!(route.earliest_trip(0, Time::from_minutes(485), None), Some(2));
        // Downstream the middle trip remains boardable.
        assert_eq!(route.earliest_trip(1, Time::from_minutes(500), None), Some(1));
    }

    #[test]
    fn rule_bitmap_round_trips() {
        let pairs = [
            (PickupDropoff::Regular, PickupDropoff::NotAvailable),
            (PickupDropoff::MustPhoneAgency, PickupDropoff::Regular),
            (
                PickupDropoff::MustCoordinateWithDriver,
                PickupDropoff::MustPhoneAgency,
            ),
        ];
        let times = vec![480, 480, 490, 490, 500, 500];
        let route = Route::new(0, vec![1, 2, 3], times, pack_rules(pairs)).unwrap();
        for (position, (pickup, dropoff)) in pairs.into_iter().enumerate() {
            assert_eq!(route.pickup_type(0, position), pickup);
            assert_eq!(route.dropoff_type(0, position), dropoff);
        }
    }

    #[test]
    fn rejects_broken_matrices() {
        // Length does not tile the stop count.
        assert!(Route::new(0, vec![1, 2], vec![480, 480, 490], regular_rules(2)).is_err());
        // Departure before arrival.
        assert!(Route::new(0, vec![1, 2], vec![480, 470, 490, 490], regular_rules(2)).is_err());
        // Second trip overtakes the first at position 1.
        let times = vec![
            480, 480, 500, 500, //
            490, 490, 495, 495,
        ];
        assert!(Route::new(0, vec![1, 2], times, regular_rules(4)).is_err());
        // Travelling back in time along the trip.
        assert!(Route::new(0, vec![1, 2], vec![480, 480, 470, 470], regular_rules(2)).is_err());
    }
}
