//! Versioned binary persistence of the frozen model.
//!
//! Both stores are length-prefixed little-endian records opening with a
//! format version string; a loader refuses any other version. All integers
//! go through `to_le_bytes`/`from_le_bytes`, so big-endian hosts swap on
//! read and the files are portable as-is.

mod codec;
pub mod stops_store;
pub mod timetable_store;

pub use stops_store::{STOPS_FORMAT_VERSION, load_stops, read_stops_file, save_stops, write_stops_file};
pub use timetable_store::{
    TIMETABLE_FORMAT_VERSION, load_timetable, read_timetable_file, save_timetable,
    write_timetable_file,
};
