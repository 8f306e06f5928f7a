pub mod memory_route_store;
pub mod postgres_route_store;
pub mod route_rows;
pub mod route_store;
pub mod store_error;

pub use memory_route_store::{FaultPoint, MemoryRouteStore, MemoryTransaction, RowCounts};
pub use postgres_route_store::{PgRouteStore, PgRouteTransaction};
pub use route_store::{RoutePredicate, RouteQuery, RouteStore, RouteTransaction};
pub use store_error::{StoreError, StoreResult};
