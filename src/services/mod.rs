//! Services module
//!
//! Lógica de negocio de la aplicación: el RouteManager coordina validación,
//! transacciones y traducción de errores sobre el almacén de rutas.

pub mod route_manager;

pub use route_manager::{default_route_name, RouteManager};
