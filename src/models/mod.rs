//! Modelos del sistema
//!
//! Este módulo contiene el agregado de rutas (ruta, paradas y metadatos) y
//! los datos de referencia de ubicaciones.

pub mod location;
pub mod route;
pub mod route_metadata;
pub mod route_stop;

pub use location::Location;
pub use route::RoutePlan;
pub use route_metadata::RouteMetadata;
pub use route_stop::RouteStop;
