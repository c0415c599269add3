//! Turns one GTFS directory into a frozen ([`Stops`], [`Timetable`]) pair
//! for a single service day.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate, Weekday};
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use log::{debug, info, warn};

use super::de::{deserialize_gtfs_file, deserialize_optional_gtfs_file, parse_gtfs_date};
use super::raw_types::{
    FeedCalendar, FeedCalendarDate, FeedRoute, FeedStop, FeedStopTime, FeedTransfer, FeedTrip,
};
use crate::error::Result;
use crate::loading::builder::{TimetableBuilder, TripEvent};
use crate::model::route::PickupDropoff;
use crate::model::stops::{LocationType, Stops};
use crate::model::time::Time;
use crate::model::timetable::{RouteType, Timetable, TransferType};

/// Where to read the feed and which service day to materialize.
#[derive(Debug, Clone)]
pub struct GtfsLoadConfig {
    pub gtfs_dir: PathBuf,
    pub date: NaiveDate,
}

/// Build the model from the feed's CSV files.
///
/// Individual malformed rows degrade with a warning; missing mandatory files
/// are errors. Trips whose service does not run on the configured date are
/// dropped before grouping.
pub fn timetable_from_gtfs(config: &GtfsLoadConfig) -> Result<(Stops, Timetable)> {
    let dir = &config.gtfs_dir;
    info!("loading GTFS feed from {}", dir.display());

    let feed_stops: Vec<FeedStop> = deserialize_gtfs_file(&dir.join("stops.txt"))?;
    let feed_routes: Vec<FeedRoute> = deserialize_gtfs_file(&dir.join("routes.txt"))?;
    let feed_trips: Vec<FeedTrip> = deserialize_gtfs_file(&dir.join("trips.txt"))?;
    let feed_stop_times: Vec<FeedStopTime> = deserialize_gtfs_file(&dir.join("stop_times.txt"))?;
    let calendars: Vec<FeedCalendar> = deserialize_optional_gtfs_file(&dir.join("calendar.txt"))?;
    let calendar_dates: Vec<FeedCalendarDate> =
        deserialize_optional_gtfs_file(&dir.join("calendar_dates.txt"))?;
    let feed_transfers: Vec<FeedTransfer> =
        deserialize_optional_gtfs_file(&dir.join("transfers.txt"))?;

    let active_services = active_services_on(config.date, &calendars, &calendar_dates);
    info!(
        "{} of {} services run on {}",
        active_services.len(),
        calendars.len().max(active_services.len()),
        config.date
    );

    let mut builder = TimetableBuilder::new();
    add_stops(&mut builder, &feed_stops);

    let active_trips: HashMap<&str, &str> = feed_trips
        .iter()
        .filter(|trip| active_services.contains(trip.service_id.as_str()))
        .map(|trip| (trip.trip_id.as_str(), trip.route_id.as_str()))
        .collect();

    let mut events_by_trip = collect_trip_events(&builder, &feed_stop_times, &active_trips);

    let mut trips_by_route: HashMap<&str, Vec<&str>> = HashMap::new();
    for trip in &feed_trips {
        if active_trips.contains_key(trip.trip_id.as_str()) {
            trips_by_route
                .entry(trip.route_id.as_str())
                .or_default()
                .push(trip.trip_id.as_str());
        }
    }

    for feed_route in &feed_routes {
        let kind = feed_route
            .route_type
            .parse::<u16>()
            .ok()
            .and_then(RouteType::from_code);
        let Some(kind) = kind else {
            warn!(
                "route '{}' has unsupported route_type '{}', skipping",
                feed_route.route_id, feed_route.route_type
            );
            continue;
        };

        let trip_events: Vec<Vec<TripEvent>> = trips_by_route
            .get(feed_route.route_id.as_str())
            .into_iter()
            .flatten()
            .filter_map(|trip_id| events_by_trip.remove(*trip_id))
            .collect();
        if trip_events.is_empty() {
            continue;
        }

        let name = [&feed_route.route_short_name, &feed_route.route_long_name]
            .into_iter()
            .find(|name| !name.is_empty())
            .unwrap_or(&feed_route.route_id);

        let mut line = builder.add_service_line(kind, name);
        for events in trip_events {
            line = line.trip_with(events);
        }
    }

    add_transfers(&mut builder, &feed_transfers);
    builder.build()
}

fn add_stops(builder: &mut TimetableBuilder, feed_stops: &[FeedStop]) {
    let known: HashSet<&str> = feed_stops.iter().map(|s| s.stop_id.as_str()).collect();

    for feed_stop in feed_stops {
        let location_type = match feed_stop.location_type.as_str() {
            "" => LocationType::SimpleStopOrPlatform,
            code => code
                .parse::<u8>()
                .ok()
                .and_then(LocationType::from_code)
                .unwrap_or_else(|| {
                    warn!(
                        "stop '{}' has unknown location_type '{code}', treating as plain stop",
                        feed_stop.stop_id
                    );
                    LocationType::SimpleStopOrPlatform
                }),
        };

        // Stations anchor their platforms; they never hang below another stop.
        let parent = match feed_stop.parent_station.as_str() {
            "" => None,
            _ if location_type == LocationType::Station => None,
            parent if known.contains(parent) => Some(parent),
            parent => {
                warn!(
                    "stop '{}' references missing parent '{parent}', dropping the link",
                    feed_stop.stop_id
                );
                None
            }
        };

        let name = if feed_stop.stop_name.is_empty() {
            &feed_stop.stop_id
        } else {
            &feed_stop.stop_name
        };
        builder.add_stop_full(
            &feed_stop.stop_id,
            name,
            parse_coordinate(&feed_stop.stop_lat),
            parse_coordinate(&feed_stop.stop_lon),
            (!feed_stop.platform_code.is_empty()).then_some(feed_stop.platform_code.as_str()),
            location_type,
            parent,
        );
    }
}

fn parse_coordinate(value: &str) -> Option<f64> {
    if value.is_empty() {
        return None;
    }
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("unparseable coordinate '{value}'");
            None
        }
    }
}

/// Group stop events by trip, ordered by `stop_sequence`, dropping events
/// that cannot be interpreted and trips too short to ride.
fn collect_trip_events(
    builder: &TimetableBuilder,
    feed_stop_times: &[FeedStopTime],
    active_trips: &HashMap<&str, &str>,
) -> HashMap<String, Vec<TripEvent>> {
    let mut sequenced: HashMap<&str, Vec<(u32, TripEvent)>> = HashMap::new();

    for stop_time in feed_stop_times {
        if !active_trips.contains_key(stop_time.trip_id.as_str()) {
            continue;
        }
        let Some(stop) = builder.stop_id(&stop_time.stop_id) else {
            warn!(
                "trip '{}' stops at unknown stop '{}', skipping the event",
                stop_time.trip_id, stop_time.stop_id
            );
            continue;
        };
        let Ok(sequence) = stop_time.stop_sequence.parse::<u32>() else {
            warn!(
                "trip '{}' has unparseable stop_sequence '{}', skipping the event",
                stop_time.trip_id, stop_time.stop_sequence
            );
            continue;
        };

        let arrival = stop_time.arrival_time.parse::<Time>().ok();
        let departure = stop_time.departure_time.parse::<Time>().ok();
        let (arrival, departure) = match (arrival, departure) {
            (Some(a), Some(d)) => (a, d),
            (Some(a), None) => (a, a),
            (None, Some(d)) => (d, d),
            (None, None) => {
                warn!(
                    "trip '{}' has no usable times at stop '{}', skipping the event",
                    stop_time.trip_id, stop_time.stop_id
                );
                continue;
            }
        };

        let event = TripEvent {
            stop,
            arrival,
            departure,
            pickup: parse_rule(&stop_time.pickup_type),
            dropoff: parse_rule(&stop_time.drop_off_type),
        };
        sequenced
            .entry(stop_time.trip_id.as_str())
            .or_default()
            .push((sequence, event));
    }

    let mut events_by_trip = HashMap::with_capacity(sequenced.len());
    for (trip_id, events) in sequenced {
        if events.len() < 2 {
            debug!("trip '{trip_id}' has fewer than two usable stops, dropping it");
            continue;
        }
        let ordered: Vec<TripEvent> = events
            .into_iter()
            .sorted_by_key(|(sequence, _)| *sequence)
            .map(|(_, event)| event)
            .collect();
        events_by_trip.insert(trip_id.to_string(), ordered);
    }
    events_by_trip
}

/// Missing and unknown codes count as regular service.
fn parse_rule(value: &str) -> PickupDropoff {
    match value {
        "" => PickupDropoff::Regular,
        code => code
            .parse::<u8>()
            .ok()
            .and_then(PickupDropoff::from_code)
            .unwrap_or(PickupDropoff::Regular),
    }
}

fn add_transfers(builder: &mut TimetableBuilder, feed_transfers: &[FeedTransfer]) {
    for feed_transfer in feed_transfers {
        let kind = match feed_transfer.transfer_type.trim() {
            "" | "0" => TransferType::Recommended,
            "1" => TransferType::Guaranteed,
            "2" => TransferType::RequiresMinimalTime,
            // Transfers declared impossible are simply not modeled.
            "3" => continue,
            "4" | "5" => TransferType::InSeat,
            other => {
                warn!("unknown transfer_type '{other}', skipping");
                continue;
            }
        };
        let min_transfer_seconds = feed_transfer.min_transfer_time.parse::<u32>().ok();

        let linked = builder.transfer(
            &feed_transfer.from_stop_id,
            &feed_transfer.to_stop_id,
            kind,
            min_transfer_seconds,
        );
        if linked.is_err() {
            warn!(
                "transfer between unknown stops '{}' and '{}', skipping",
                feed_transfer.from_stop_id, feed_transfer.to_stop_id
            );
        }
    }
}

/// Services running on `date`: weekday flag within the calendar range, then
/// calendar_dates exceptions applied on top.
fn active_services_on(
    date: NaiveDate,
    calendars: &[FeedCalendar],
    calendar_dates: &[FeedCalendarDate],
) -> HashSet<String> {
    let mut active = HashSet::new();

    for calendar in calendars {
        let flag = match date.weekday() {
            Weekday::Mon => &calendar.monday,
            Weekday::Tue => &calendar.tuesday,
            Weekday::Wed => &calendar.wednesday,
            Weekday::Thu => &calendar.thursday,
            Weekday::Fri => &calendar.friday,
            Weekday::Sat => &calendar.saturday,
            Weekday::Sun => &calendar.sunday,
        };
        let in_range = parse_gtfs_date(&calendar.start_date).is_some_and(|start| start <= date)
            && parse_gtfs_date(&calendar.end_date).is_some_and(|end| date <= end);
        if flag == "1" && in_range {
            active.insert(calendar.service_id.clone());
        }
    }

    for exception in calendar_dates {
        if parse_gtfs_date(&exception.date) != Some(date) {
            continue;
        }
        match exception.exception_type.as_str() {
            "1" => {
                active.insert(exception.service_id.clone());
            }
            "2" => {
                active.remove(&exception.service_id);
            }
            other => warn!("unknown calendar exception_type '{other}'"),
        }
    }

    active
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use chrono::NaiveDate;
    use tempdir::TempDir;

    use super::{GtfsLoadConfig, timetable_from_gtfs};
    use crate::model::time::Time;
    use crate::model::timetable::{RouteType, TransferType};

    fn write_feed(dir: &Path) {
        fs::write(
            dir.join("stops.txt"),
            "stop_id,stop_name,stop_lat,stop_lon,location_type,parent_station,platform_code\n\
             P,Central,47.0,8.0,1,,\n\
             P:1,Central,47.0,8.0,0,P,1\n\
             P:2,Central,47.0,8.0,0,P,2\n\
             E,East,47.1,8.2,0,,\n\
             W,West,46.9,7.8,0,,\n",
        )
        .unwrap();
        fs::write(
            dir.join("routes.txt"),
            "route_id,route_short_name,route_long_name,route_type\n\
             R1,10,,3\n\
             R2,,City rail,2\n",
        )
        .unwrap();
        fs::write(
            dir.join("trips.txt"),
            "route_id,service_id,trip_id\n\
             R1,WK,T1\n\
             R1,WK,T2\n\
             R2,SUN,T3\n\
             R2,WK,T4\n",
        )
        .unwrap();
        fs::write(
            dir.join("stop_times.txt"),
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence,pickup_type,drop_off_type\n\
             T1,08:00:00,08:00:00,W,1,,\n\
             T1,08:20:00,08:21:00,P:1,2,,\n\
             T1,08:40:00,08:40:00,E,3,,\n\
             T2,09:00:00,09:00:00,W,1,1,\n\
             T2,09:20:00,09:21:00,P:1,2,,\n\
             T2,09:40:00,09:40:00,E,3,,\n\
             T3,10:00:00,10:00:00,P:2,1,,\n\
             T3,10:30:00,10:30:00,E,2,,\n\
             T4,11:00:00,11:00:00,P:2,1,,\n\
             T4,11:30:00,11:30:00,E,2,,\n",
        )
        .unwrap();
        fs::write(
            dir.join("calendar.txt"),
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
             WK,1,1,1,1,1,0,0,20240101,20241231\n\
             SUN,0,0,0,0,0,0,1,20240101,20241231\n",
        )
        .unwrap();
        fs::write(
            dir.join("transfers.txt"),
            "from_stop_id,to_stop_id,transfer_type,min_transfer_time\n\
             P:1,P:2,2,180\n\
             P:1,GHOST,2,180\n\
             E,W,3,\n",
        )
        .unwrap();
    }

    #[test]
    fn builds_one_service_day() {
        let dir = TempDir::new("gtfs-fixture").unwrap();
        write_feed(dir.path());

        // A Monday: WK runs, SUN does not.
        let config = GtfsLoadConfig {
            gtfs_dir: dir.path().to_path_buf(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        };
        let (stops, timetable) = timetable_from_gtfs(&config).unwrap();

        assert_eq!(stops.len(), 5);
        let station = stops.by_external_id("P").unwrap();
        assert_eq!(station.children.len(), 2);
        assert_eq!(stops.by_external_id("P:2").unwrap().platform.as_deref(), Some("2"));

        // R1 keeps both weekday trips in one route; R2 keeps only T4.
        assert_eq!(timetable.service_lines().len(), 2);
        let bus = &timetable.service_lines()[0];
        assert_eq!((bus.kind, bus.name.as_str()), (RouteType::Bus, "10"));
        let rail = &timetable.service_lines()[1];
        assert_eq!((rail.kind, rail.name.as_str()), (RouteType::Rail, "City rail"));

        let bus_route = &timetable.routes()[bus.routes[0]];
        assert_eq!(bus_route.nb_trips(), 2);
        assert_eq!(
            bus_route.departure(0, 1),
            Time::from_hm(8, 21),
        );
        let rail_route = &timetable.routes()[rail.routes[0]];
        assert_eq!(rail_route.nb_trips(), 1);

        // The impossible transfer and the one to a ghost stop are dropped.
        let p1 = stops.by_external_id("P:1").unwrap().id;
        let transfers = timetable.transfers(p1);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].kind, TransferType::RequiresMinimalTime);
        assert_eq!(
            transfers[0].min_transfer_time.map(|d| d.seconds()),
            Some(180)
        );
    }

    #[test]
    fn sunday_selects_the_other_service() {
        let dir = TempDir::new("gtfs-fixture").unwrap();
        write_feed(dir.path());

        let config = GtfsLoadConfig {
            gtfs_dir: dir.path().to_path_buf(),
            date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
        };
        let (_, timetable) = timetable_from_gtfs(&config).unwrap();

        // Only R2/T3 survives.
        assert_eq!(timetable.service_lines().len(), 1);
        assert_eq!(timetable.service_lines()[0].name, "City rail");
        assert_eq!(timetable.routes().len(), 1);
        assert_eq!(timetable.routes()[0].nb_trips(), 1);
    }

    #[test]
    fn missing_mandatory_file_is_an_error() {
        let dir = TempDir::new("gtfs-empty").unwrap();
        let config = GtfsLoadConfig {
            gtfs_dir: dir.path().to_path_buf(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        };
        assert!(timetable_from_gtfs(&config).is_err());
    }
}
