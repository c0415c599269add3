//! GTFS feed ingestion: CSV files in, frozen model out.

mod de;
mod processor;
mod raw_types;

pub use processor::{GtfsLoadConfig, timetable_from_gtfs};
