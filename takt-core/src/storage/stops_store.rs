//! Binary store for the stop index.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;

use super::codec::{
    expect_version, read_len, read_opt_f64, read_opt_str, read_opt_u32, read_str, read_u8,
    read_u32, write_len, write_opt_f64, write_opt_str, write_opt_u32, write_str, write_u8,
    write_u32,
};
use crate::error::{Error, Result};
use crate::model::stops::{LocationType, Stop, Stops};

pub const STOPS_FORMAT_VERSION: &str = "0.0.2";

pub fn save_stops<W: Write>(stops: &Stops, w: &mut W) -> Result<()> {
    write_str(w, STOPS_FORMAT_VERSION)?;
    write_len(w, stops.len())?;
    for stop in stops.iter() {
        write_str(w, &stop.external_id)?;
        write_str(w, &stop.name)?;
        write_opt_f64(w, stop.lat)?;
        write_opt_f64(w, stop.lon)?;
        write_len(w, stop.children.len())?;
        for &child in &stop.children {
            write_u32(w, compact_id(child)?)?;
        }
        write_opt_u32(w, stop.parent.map(compact_id).transpose()?)?;
        write_u8(w, stop.location_type.code())?;
        write_opt_str(w, stop.platform.as_deref())?;
    }
    Ok(())
}

pub fn load_stops<R: Read>(r: &mut R) -> Result<Stops> {
    expect_version(r, STOPS_FORMAT_VERSION)?;
    let count = read_len(r)?;
    let mut stops = Vec::with_capacity(count);
    for id in 0..count {
        let external_id = read_str(r)?;
        let name = read_str(r)?;
        let lat = read_opt_f64(r)?;
        let lon = read_opt_f64(r)?;
        let nb_children = read_len(r)?;
        let mut children = Vec::with_capacity(nb_children);
        for _ in 0..nb_children {
            children.push(read_u32(r)? as usize);
        }
        let parent = read_opt_u32(r)?.map(|p| p as usize);
        let location_type = LocationType::from_code(read_u8(r)?).ok_or_else(|| {
            Error::MalformedTimetable(format!("unknown location type for stop '{external_id}'"))
        })?;
        let platform = read_opt_str(r)?;
        stops.push(Stop {
            id,
            external_id,
            name,
            lat,
            lon,
            platform,
            location_type,
            parent,
            children,
        });
    }
    Stops::new(stops)
}

pub fn write_stops_file(stops: &Stops, path: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    save_stops(stops, &mut file)?;
    file.flush()?;
    info!("wrote {} stops to {}", stops.len(), path.display());
    Ok(())
}

pub fn read_stops_file(path: &Path) -> Result<Stops> {
    let mut file = BufReader::new(File::open(path)?);
    let stops = load_stops(&mut file)?;
    info!("read {} stops from {}", stops.len(), path.display());
    Ok(stops)
}

fn compact_id(id: usize) -> Result<u32> {
    u32::try_from(id)
        .map_err(|_| Error::MalformedTimetable(format!("stop id {id} exceeds the compact range")))
}
