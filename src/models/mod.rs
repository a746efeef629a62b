mod route;
mod station;
mod train;

pub use route::{Route, RouteStop};
pub use station::{GeoPoint, Station, StationDirectory};
pub use train::{Roster, TrainCategory, TrainDefinition};
