use thiserror::Error;

/// Errors surfaced by timetable construction, storage and query building.
///
/// Routing itself does not produce errors: an unknown origin or destination
/// yields an empty result, and a broken frozen timetable is a programming
/// error that panics instead of being reported as a value.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown stop '{0}'")]
    UnknownStop(String),
    #[error("invalid time literal '{0}', expected HH:MM or HH:MM:SS")]
    InvalidTimeLiteral(String),
    #[error("malformed timetable: {0}")]
    MalformedTimetable(String),
    #[error("unsupported store version '{found}', expected '{expected}'")]
    UnsupportedVersion {
        expected: &'static str,
        found: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
