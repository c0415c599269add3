//! Binary store for the timetable.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;

use super::codec::{
    expect_version, read_len, read_opt_u32, read_str, read_u8, read_u16, read_u32, write_len,
    write_opt_u32, write_str, write_u8, write_u16, write_u32,
};
use crate::error::{Error, Result};
use crate::model::route::Route;
use crate::model::time::Duration;
use crate::model::timetable::{
    RouteType, ServiceLine, StopAdjacency, Timetable, Transfer, TransferType,
};

pub const TIMETABLE_FORMAT_VERSION: &str = "0.0.6";

pub fn save_timetable<W: Write>(timetable: &Timetable, w: &mut W) -> Result<()> {
    write_str(w, TIMETABLE_FORMAT_VERSION)?;

    write_len(w, timetable.nb_stops())?;
    for adjacency in timetable.stops_adjacency() {
        write_len(w, adjacency.transfers.len())?;
        for transfer in &adjacency.transfers {
            write_u32(w, compact(transfer.destination)?)?;
            write_u8(w, transfer.kind.code())?;
            write_opt_u32(w, transfer.min_transfer_time.map(Duration::seconds))?;
        }
        write_len(w, adjacency.routes.len())?;
        for &route_id in &adjacency.routes {
            write_u32(w, compact(route_id)?)?;
        }
    }

    write_len(w, timetable.routes().len())?;
    for route in timetable.routes() {
        write_len(w, route.raw_stop_times().len())?;
        for &minutes in route.raw_stop_times() {
            write_u16(w, minutes)?;
        }
        write_len(w, route.raw_rules().len())?;
        w.write_all(route.raw_rules())?;
        write_len(w, route.stops().len())?;
        for &stop in route.stops() {
            write_u32(w, compact(stop)?)?;
        }
        write_u32(w, compact(route.service_line())?)?;
    }

    write_len(w, timetable.service_lines().len())?;
    for line in timetable.service_lines() {
        write_u16(w, line.kind.code())?;
        write_str(w, &line.name)?;
    }
    Ok(())
}

pub fn load_timetable<R: Read>(r: &mut R) -> Result<Timetable> {
    expect_version(r, TIMETABLE_FORMAT_VERSION)?;

    let nb_stops = read_len(r)?;
    let mut adjacency = Vec::with_capacity(nb_stops);
    for _ in 0..nb_stops {
        let nb_transfers = read_len(r)?;
        let mut transfers = Vec::with_capacity(nb_transfers);
        for _ in 0..nb_transfers {
            let destination = read_u32(r)? as usize;
            let kind = TransferType::from_code(read_u8(r)?).ok_or_else(|| {
                Error::MalformedTimetable("unknown transfer type in store".to_string())
            })?;
            let min_transfer_time = read_opt_u32(r)?.map(Duration::from_seconds);
            transfers.push(Transfer {
                destination,
                kind,
                min_transfer_time,
            });
        }
        let nb_routes = read_len(r)?;
        let mut routes = Vec::with_capacity(nb_routes);
        for _ in 0..nb_routes {
            routes.push(read_u32(r)? as usize);
        }
        adjacency.push(StopAdjacency { routes, transfers });
    }

    let nb_routes = read_len(r)?;
    let mut routes = Vec::with_capacity(nb_routes);
    for _ in 0..nb_routes {
        let nb_times = read_len(r)?;
        let mut stop_times = Vec::with_capacity(nb_times);
        for _ in 0..nb_times {
            stop_times.push(read_u16(r)?);
        }
        let nb_rule_bytes = read_len(r)?;
        let mut rules = vec![0u8; nb_rule_bytes];
        r.read_exact(&mut rules)?;
        let nb_route_stops = read_len(r)?;
        let mut stops = Vec::with_capacity(nb_route_stops);
        for _ in 0..nb_route_stops {
            stops.push(read_u32(r)? as usize);
        }
        let service_line = read_u32(r)? as usize;
        routes.push(Route::new(service_line, stops, stop_times, rules)?);
    }

    let nb_lines = read_len(r)?;
    let mut service_lines = Vec::with_capacity(nb_lines);
    for _ in 0..nb_lines {
        let kind = RouteType::from_code(read_u16(r)?).ok_or_else(|| {
            Error::MalformedTimetable("unknown route type in store".to_string())
        })?;
        let name = read_str(r)?;
        service_lines.push(ServiceLine {
            kind,
            name,
            routes: Vec::new(),
        });
    }
    // Line membership is derived, not stored.
    for (route_id, route) in routes.iter().enumerate() {
        let line = service_lines.get_mut(route.service_line()).ok_or_else(|| {
            Error::MalformedTimetable(format!(
                "route {route_id} references unknown service line {}",
                route.service_line()
            ))
        })?;
        line.routes.push(route_id);
    }

    Timetable::new(adjacency, routes, service_lines)
}

pub fn write_timetable_file(timetable: &Timetable, path: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    save_timetable(timetable, &mut file)?;
    file.flush()?;
    info!(
        "wrote {} routes over {} stops to {}",
        timetable.routes().len(),
        timetable.nb_stops(),
        path.display()
    );
    Ok(())
}

pub fn read_timetable_file(path: &Path) -> Result<Timetable> {
    let mut file = BufReader::new(File::open(path)?);
    let timetable = load_timetable(&mut file)?;
    info!(
        "read {} routes over {} stops from {}",
        timetable.routes().len(),
        timetable.nb_stops(),
        path.display()
    );
    Ok(timetable)
}

fn compact(id: usize) -> Result<u32> {
    u32::try_from(id)
        .map_err(|_| Error::MalformedTimetable(format!("id {id} exceeds the compact range")))
}
