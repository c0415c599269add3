//! CSV deserialization helpers for GTFS files.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use log::warn;

use crate::error::Result;

/// Read every parseable row of one GTFS file.
///
/// Individual malformed rows are dropped with a warning; a file that yields
/// nothing but errors surfaces the first of them.
pub(super) fn deserialize_gtfs_file<T>(path: &Path) -> Result<Vec<T>>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let file = File::open(path)?;
    let mut rows = Vec::new();
    let mut first_error = None;
    let mut dropped = 0usize;
    for row in csv::Reader::from_reader(file).deserialize() {
        match row {
            Ok(value) => rows.push(value),
            Err(error) => {
                dropped += 1;
                first_error.get_or_insert(error);
            }
        }
    }
    if rows.is_empty() {
        if let Some(error) = first_error {
            return Err(error.into());
        }
    }
    if dropped > 0 {
        warn!("{}: dropped {dropped} malformed rows", path.display());
    }
    Ok(rows)
}

/// Like [`deserialize_gtfs_file`], for files a feed may legitimately omit.
pub(super) fn deserialize_optional_gtfs_file<T>(path: &Path) -> Result<Vec<T>>
where
    T: for<'de> serde::Deserialize<'de>,
{
    if path.exists() {
        deserialize_gtfs_file(path)
    } else {
        Ok(Vec::new())
    }
}

/// GTFS dates are `YYYYMMDD`.
pub(super) fn parse_gtfs_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y%m%d").ok()
}
