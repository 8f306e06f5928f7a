//! Modelo de RouteStop
//!
//! Parada de una ruta. `sequence` solo sirve para ordenar: no es única ni se
//! renumera. Latitud y longitud en NaN significan "sin geocodificar".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub const STOP_NAME_MAX_LENGTH: usize = 50;
pub const STOP_ADDRESS_MAX_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub id: Uuid,
    pub route_id: Uuid,
    pub sequence: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(with = "coordinate", default = "not_geocoded")]
    pub latitude: f64,
    #[serde(with = "coordinate", default = "not_geocoded")]
    pub longitude: f64,
    pub time_window_begin: DateTime<Utc>,
    pub time_window_end: Option<DateTime<Utc>>,
    pub dwell_time: Option<Duration>,
}

impl RouteStop {
    pub fn new(route_id: Uuid, sequence: i32, time_window_begin: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            route_id,
            sequence,
            name: String::new(),
            address: String::new(),
            latitude: f64::NAN,
            longitude: f64::NAN,
            time_window_begin,
            time_window_end: None,
            dwell_time: None,
        }
    }

    pub fn is_geocoded(&self) -> bool {
        !self.latitude.is_nan() && !self.longitude.is_nan()
    }

    /// La ventana horaria es válida si no termina antes de empezar
    pub fn has_valid_time_window(&self) -> bool {
        self.time_window_end
            .map_or(true, |end| end >= self.time_window_begin)
    }
}

impl PartialEq for RouteStop {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.route_id == other.route_id
            && self.sequence == other.sequence
            && self.name == other.name
            && self.address == other.address
            && same_coordinate(self.latitude, other.latitude)
            && same_coordinate(self.longitude, other.longitude)
            && self.time_window_begin == other.time_window_begin
            && self.time_window_end == other.time_window_end
            && self.dwell_time == other.dwell_time
    }
}

// NaN es el centinela de "sin coordenada", así que dos NaN son iguales
fn same_coordinate(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn not_geocoded() -> f64 {
    f64::NAN
}

/// Serializa NaN como `null` y viceversa
pub(crate) mod coordinate {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
