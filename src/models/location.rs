//! Modelo de Location
//!
//! Datos de referencia: direcciones con nombre y sus identificadores externos.
//! No pertenecen a ninguna ruta.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LOCATION_NAME_MAX_LENGTH: usize = 50;
pub const LOCATION_ADDRESS_MAX_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub references: Vec<String>,
}

impl Location {
    pub fn new(name: String, address: String, latitude: f64, longitude: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            address,
            latitude,
            longitude,
            references: Vec::new(),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.name.trim().is_empty() {
            write!(f, "{}: ", self.name)?;
        }

        if self.address.trim().is_empty() {
            write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
        } else {
            write!(f, "{}", self.address)
        }
    }
}
