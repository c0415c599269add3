//! Query parameters and their builder.

use crate::model::time::{Duration, Time};
use crate::model::timetable::{ModeSet, RouteType};

pub const DEFAULT_MAX_TRANSFERS: usize = 5;
pub const DEFAULT_MIN_TRANSFER_TIME: Duration = Duration::from_seconds(120);

/// One routing request: origin, destinations, departure time and limits.
///
/// Origin and destinations are external stop identifiers; an identifier
/// unknown to the stop index is not an error, it simply contributes no
/// boarding or target stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub from: String,
    pub to: Vec<String>,
    pub departure_time: Time,
    pub max_transfers: usize,
    /// Footpath cost applied when a transfer edge carries no explicit time.
    pub min_transfer_time: Duration,
    pub allowed_modes: ModeSet,
}

impl Query {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }
}

/// Builder for [`Query`] with the documented defaults: 5 transfers, 120 s
/// minimum transfer time, all vehicle modes allowed.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    from: String,
    to: Vec<String>,
    departure_time: Time,
    max_transfers: usize,
    min_transfer_time: Duration,
    allowed_modes: ModeSet,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        QueryBuilder {
            from: String::new(),
            to: Vec::new(),
            departure_time: Time::ZERO,
            max_transfers: DEFAULT_MAX_TRANSFERS,
            min_transfer_time: DEFAULT_MIN_TRANSFER_TIME,
            allowed_modes: ModeSet::ALL,
        }
    }
}

impl QueryBuilder {
    pub fn from(mut self, external_id: impl Into<String>) -> Self {
        self.from = external_id.into();
        self
    }

    /// Add one destination; may be called repeatedly.
    pub fn to(mut self, external_id: impl Into<String>) -> Self {
        let external_id = external_id.into();
        if !self.to.contains(&external_id) {
            self.to.push(external_id);
        }
        self
    }

    pub fn to_all<I, S>(self, external_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        external_ids.into_iter().fold(self, |b, id| b.to(id))
    }

    pub fn departure_time(mut self, time: Time) -> Self {
        self.departure_time = time;
        self
    }

    pub fn max_transfers(mut self, max_transfers: usize) -> Self {
        self.max_transfers = max_transfers;
        self
    }

    pub fn min_transfer_time(mut self, duration: Duration) -> Self {
        self.min_transfer_time = duration;
        self
    }

    pub fn allowed_modes<I: IntoIterator<Item = RouteType>>(mut self, modes: I) -> Self {
        self.allowed_modes = modes.into_iter().collect();
        self
    }

    pub fn build(self) -> Query {
        Query {
            from: self.from,
            to: self.to,
            departure_time: self.departure_time,
            max_transfers: self.max_transfers,
            min_transfer_time: self.min_transfer_time,
            allowed_modes: self.allowed_modes,
        }
    }
}
