//! Route Manager
//!
//! Persistencia y consulta de agregados de ruta (rutas, paradas y metadatos)
//! sobre PostgreSQL o en memoria, con una API HTTP en axum.

pub mod config;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use dto::{CreateRouteOptions, RouteFilter, StopOptions, UpdateRouteOptions};
pub use models::{Location, RouteMetadata, RoutePlan, RouteStop};
pub use repositories::{MemoryRouteStore, PgRouteStore, RouteStore};
pub use services::RouteManager;
pub use utils::{RouteError, RouteResult};
