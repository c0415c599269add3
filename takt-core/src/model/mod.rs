//! In-memory data model for the routing engine.
//!
//! Everything in this module is built once, by the GTFS ingester or the
//! storage loader, and frozen before any query runs against it.

pub mod route;
pub mod stops;
pub mod time;
pub mod timetable;

pub use route::{PickupDropoff, Route};
pub use stops::{LocationType, Stop, Stops};
pub use time::{Duration, Time};
pub use timetable::{
    ModeSet, RouteType, ServiceLine, StopAdjacency, Timetable, Transfer, TransferType,
};
