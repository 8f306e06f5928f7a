//! Middleware del sistema
//!
//! Capas HTTP compartidas por el router.

pub mod cors;

pub use cors::*;
