//! Round-based public transit journey planning.
//!
//! `takt_core` owns an in-memory timetable model optimized for round-based
//! routing (RAPTOR family), a router producing Pareto-optimal earliest
//! arrivals per number of boardings, journey reconstruction from the round
//! tables, a GTFS ingester that builds the model for one service day, and a
//! versioned binary store for the built model.
//!
//! The [`Timetable`] and [`Stops`] structures are immutable once built and may
//! be shared by reference across any number of concurrent [`Router::route`]
//! calls; all per-query state lives in the returned [`RoutingResult`].

pub mod error;
pub mod loading;
pub mod model;
pub mod prelude;
pub mod routing;
pub mod storage;

pub use error::Error;

pub use model::route::{PickupDropoff, Route};
pub use model::stops::{LocationType, Stop, Stops};
pub use model::time::{Duration, Time};
pub use model::timetable::{
    ModeSet, RouteType, ServiceLine, StopAdjacency, Timetable, Transfer, TransferType,
};
pub use routing::leg::{Leg, ReachingTime, TripLeg};
pub use routing::query::{Query, QueryBuilder};
pub use routing::result::{Journey, RoutingResult};
pub use routing::router::Router;

/// Dense index of a stop inside [`Stops`] and [`Timetable`].
pub type StopId = usize;
/// Dense index of a route (one ordered stop list of a service line).
pub type RouteId = usize;
/// Dense index of a user-facing service line.
pub type ServiceLineId = usize;
/// Index of a trip within its route, ordered by departure time.
pub type TripIndex = usize;
