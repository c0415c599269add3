//! Convenience re-exports for downstream users.

pub use crate::error::{Error, Result};
pub use crate::loading::TimetableBuilder;
pub use crate::loading::gtfs::{GtfsLoadConfig, timetable_from_gtfs};
pub use crate::model::route::{PickupDropoff, Route};
pub use crate::model::stops::{LocationType, Stop, Stops};
pub use crate::model::time::{Duration, Time};
pub use crate::model::timetable::{
    ModeSet, RouteType, ServiceLine, Timetable, Transfer, TransferType,
};
pub use crate::routing::leg::{Leg, ReachingTime};
pub use crate::routing::query::{Query, QueryBuilder};
pub use crate::routing::result::{Journey, RoutingResult};
pub use crate::routing::router::Router;
pub use crate::{RouteId, ServiceLineId, StopId, TripIndex};
