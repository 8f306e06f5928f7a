//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! conversión de ticks y cancelación.

pub mod cancellation;
pub mod errors;
pub mod ticks;
pub mod validation;

pub use errors::{RouteError, RouteResult};
