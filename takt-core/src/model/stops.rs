//! Stop records and the external-id index.
//!
//! Stops are dense: a stop's [`StopId`] equals its position in the backing
//! vector. Station/platform relations are expressed through `parent` and
//! `children` links and drive the "equivalent stops" expansion that turns a
//! queried identifier into the set of concrete boarding candidates.

use hashbrown::HashMap;

use crate::StopId;
use crate::error::{Error, Result};

/// GTFS location type of a stop record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocationType {
    #[default]
    SimpleStopOrPlatform,
    Station,
    EntranceExit,
    GenericNode,
    BoardingArea,
}

impl LocationType {
    pub fn from_code(code: u8) -> Option<LocationType> {
        match code {
            0 => Some(LocationType::SimpleStopOrPlatform),
            1 => Some(LocationType::Station),
            2 => Some(LocationType::EntranceExit),
            3 => Some(LocationType::GenericNode),
            4 => Some(LocationType::BoardingArea),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            LocationType::SimpleStopOrPlatform => 0,
            LocationType::Station => 1,
            LocationType::EntranceExit => 2,
            LocationType::GenericNode => 3,
            LocationType::BoardingArea => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    /// Dense id, equal to this stop's position in [`Stops`].
    pub id: StopId,
    /// Opaque identifier from the feed, e.g. `8504100:0:2`.
    pub external_id: String,
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Platform code within the parent station, when the feed provides one.
    pub platform: Option<String>,
    pub location_type: LocationType,
    pub parent: Option<StopId>,
    pub children: Vec<StopId>,
}

/// The frozen stop index: dense storage plus an external-id lookup.
#[derive(Debug, Clone)]
pub struct Stops {
    stops: Vec<Stop>,
    by_external: HashMap<String, StopId>,
}

impl Stops {
    /// Freeze a stop list, checking the parent/children invariants.
    pub fn new(stops: Vec<Stop>) -> Result<Stops> {
        let malformed = |msg: String| Error::MalformedTimetable(msg);
        for (position, stop) in stops.iter().enumerate() {
            if stop.id != position {
                return Err(malformed(format!(
                    "stop '{}' has id {} at position {position}",
                    stop.external_id, stop.id
                )));
            }
            if stop.parent.is_some() && !stop.children.is_empty() {
                return Err(malformed(format!(
                    "stop '{}' has both a parent and children",
                    stop.external_id
                )));
            }
            if stop.parent == Some(stop.id) {
                return Err(malformed(format!(
                    "stop '{}' is its own parent",
                    stop.external_id
                )));
            }
            if let Some(parent) = stop.parent {
                let ok = stops
                    .get(parent)
                    .is_some_and(|p| p.children.contains(&stop.id));
                if !ok {
                    return Err(malformed(format!(
                        "stop '{}' references parent {parent} which does not list it as a child",
                        stop.external_id
                    )));
                }
            }
            for &child in &stop.children {
                let ok = stops.get(child).is_some_and(|c| c.parent == Some(stop.id));
                if !ok {
                    return Err(malformed(format!(
                        "stop '{}' lists child {child} which does not point back",
                        stop.external_id
                    )));
                }
            }
        }

        let by_external = stops
            .iter()
            .map(|stop| (stop.external_id.clone(), stop.id))
            .collect();
        Ok(Stops { stops, by_external })
    }

    pub fn by_internal_id(&self, id: StopId) -> Option<&Stop> {
        self.stops.get(id)
    }

    pub fn by_external_id(&self, external_id: &str) -> Option<&Stop> {
        self.by_external
            .get(external_id)
            .map(|&id| &self.stops[id])
    }

    /// All stops a queried identifier may stand for: the stop itself plus its
    /// platform siblings (through the parent) or its own children.
    ///
    /// The queried stop comes first, siblings follow in insertion order. An
    /// unknown identifier yields an empty set; a stop with neither parent nor
    /// children is its own only equivalent.
    pub fn equivalent_stops(&self, external_id: &str) -> Vec<&Stop> {
        let Some(stop) = self.by_external_id(external_id) else {
            return Vec::new();
        };

        let siblings: &[StopId] = match stop.parent {
            Some(parent) => &self.stops[parent].children,
            None => &stop.children,
        };

        let mut result = vec![stop];
        for &sibling in siblings {
            if sibling != stop.id {
                result.push(&self.stops[sibling]);
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter()
    }
}

impl PartialEq for Stops {
    fn eq(&self, other: &Self) -> bool {
        // The external-id map is derived from the stop list.
        self.stops == other.stops
    }
}
