//! The round-based routing engine and its query/result types.

pub mod leg;
pub mod query;
pub mod result;
pub mod router;
mod state;

pub use leg::{Leg, ReachingTime, TripLeg};
pub use query::{Query, QueryBuilder};
pub use result::{Journey, RoutingResult};
pub use router::Router;
