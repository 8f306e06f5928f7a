use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::models::RouteStop;
use crate::utils::errors::{RouteError, RouteResult};
use crate::utils::ticks;
use crate::utils::validation::{
    field_error, validate_dispatch_time, validate_latitude, validate_longitude,
    validate_metadata_entry, validate_tick_range, validate_time_window, validate_unique_keys,
};

// Opciones para crear una ruta
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateRouteOptions {
    #[validate(length(max = 50))]
    pub name: Option<String>,

    pub dispatch_time: Option<DateTime<Utc>>,

    pub metadata: Option<BTreeMap<String, String>>,

    pub stops: Option<Vec<StopOptions>>,
}

// Opciones para actualizar una ruta; todo es opcional
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateRouteOptions {
    #[validate(length(max = 50))]
    pub name: Option<String>,

    pub dispatch_time: Option<DateTime<Utc>>,

    pub remove_metadata: Option<Vec<String>>,

    pub add_metadata: Option<BTreeMap<String, String>>,

    pub remove_stops: Option<Vec<Uuid>>,

    pub add_stops: Option<Vec<StopOptions>>,
}

// Parada solicitada por el llamador
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StopOptions {
    pub sequence: i32,

    #[validate(length(max = 50))]
    pub name: Option<String>,

    #[validate(length(max = 200))]
    pub address: Option<String>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    pub time_window_begin: DateTime<Utc>,

    pub time_window_end: Option<DateTime<Utc>>,

    pub dwell_time: Option<Duration>,
}

impl CreateRouteOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn dispatched_at(mut self, dispatch_time: DateTime<Utc>) -> Self {
        self.dispatch_time = Some(dispatch_time);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_stop(mut self, stop: StopOptions) -> Self {
        self.stops.get_or_insert_with(Vec::new).push(stop);
        self
    }

    /// Validar todas las opciones antes de abrir la transacción
    pub fn check(&self) -> RouteResult<()> {
        self.validate()?;

        if let Some(dispatch_time) = &self.dispatch_time {
            validate_dispatch_time(dispatch_time).map_err(|e| field_error("dispatch_time", &e))?;
        }

        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                validate_metadata_entry("metadata", key, value)?;
            }
            validate_unique_keys("metadata", metadata.keys(), std::iter::empty())?;
        }

        if let Some(stops) = &self.stops {
            for (index, stop) in stops.iter().enumerate() {
                stop.check(&format!("stops[{index}]"))?;
            }
        }

        Ok(())
    }
}

impl UpdateRouteOptions {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_dispatch_time(mut self, dispatch_time: DateTime<Utc>) -> Self {
        self.dispatch_time = Some(dispatch_time);
        self
    }

    pub fn remove_key(mut self, key: impl Into<String>) -> Self {
        self.remove_metadata.get_or_insert_with(Vec::new).push(key.into());
        self
    }

    pub fn add_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn remove_stop(mut self, stop_id: Uuid) -> Self {
        self.remove_stops.get_or_insert_with(Vec::new).push(stop_id);
        self
    }

    pub fn add_stop(mut self, stop: StopOptions) -> Self {
        self.add_stops.get_or_insert_with(Vec::new).push(stop);
        self
    }

    pub fn check(&self) -> RouteResult<()> {
        self.validate()?;

        if let Some(dispatch_time) = &self.dispatch_time {
            validate_dispatch_time(dispatch_time).map_err(|e| field_error("dispatch_time", &e))?;
        }

        if let Some(metadata) = &self.add_metadata {
            for (key, value) in metadata {
                validate_metadata_entry("add_metadata", key, value)?;
            }
            validate_unique_keys("add_metadata", metadata.keys(), std::iter::empty())?;
        }

        if let Some(stops) = &self.add_stops {
            for (index, stop) in stops.iter().enumerate() {
                stop.check(&format!("add_stops[{index}]"))?;
            }
        }

        Ok(())
    }
}

impl StopOptions {
    pub fn new(sequence: i32, time_window_begin: DateTime<Utc>) -> Self {
        Self {
            sequence,
            name: None,
            address: None,
            latitude: None,
            longitude: None,
            time_window_begin,
            time_window_end: None,
            dwell_time: None,
        }
    }

    pub fn at(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.address = Some(address.into());
        self
    }

    pub fn located(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn until(mut self, time_window_end: DateTime<Utc>) -> Self {
        self.time_window_end = Some(time_window_end);
        self
    }

    pub fn dwell(mut self, dwell_time: Duration) -> Self {
        self.dwell_time = Some(dwell_time);
        self
    }

    /// Validar la parada; `prefix` identifica su posición en la petición
    pub fn check(&self, prefix: &str) -> RouteResult<()> {
        self.validate().map_err(|errors| match RouteError::from(errors) {
            RouteError::InvalidArgument { field, message } => {
                RouteError::invalid_argument(format!("{prefix}.{field}"), message)
            }
            other => other,
        })?;

        if let Some(latitude) = self.latitude {
            validate_latitude(latitude).map_err(|e| field_error(format!("{prefix}.latitude"), &e))?;
        }
        if let Some(longitude) = self.longitude {
            validate_longitude(longitude).map_err(|e| field_error(format!("{prefix}.longitude"), &e))?;
        }

        validate_tick_range(&self.time_window_begin)
            .map_err(|e| field_error(format!("{prefix}.time_window_begin"), &e))?;
        if let Some(end) = &self.time_window_end {
            validate_tick_range(end).map_err(|e| field_error(format!("{prefix}.time_window_end"), &e))?;
        }
        validate_time_window(&self.time_window_begin, self.time_window_end.as_ref())
            .map_err(|e| field_error(format!("{prefix}.time_window_end"), &e))?;

        Ok(())
    }

    /// Construir la fila de la parada para la ruta dada, a precisión de tick
    pub fn into_stop(self, route_id: Uuid) -> RouteStop {
        let mut stop = RouteStop::new(route_id, self.sequence, ticks::truncate(self.time_window_begin));
        stop.name = self.name.unwrap_or_default();
        stop.address = self.address.unwrap_or_default();
        stop.latitude = self.latitude.unwrap_or(f64::NAN);
        stop.longitude = self.longitude.unwrap_or(f64::NAN);
        stop.time_window_end = self.time_window_end.map(ticks::truncate);
        stop.dwell_time = self.dwell_time.map(ticks::truncate_duration);
        stop
    }
}
