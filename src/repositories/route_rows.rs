//! Filas de las tablas de rutas
//!
//! Forma persistida del agregado: instantes y duraciones como ticks. Ambos
//! adaptadores de almacén convierten a y desde estas filas.

use serde::Deserialize;
use uuid::Uuid;

use crate::models::route_stop::coordinate;
use crate::models::{RouteMetadata, RoutePlan, RouteStop};
use crate::repositories::store_error::{StoreError, StoreResult};
use crate::utils::ticks;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RouteRow {
    pub id: Uuid,
    pub name: String,
    pub dispatch_time: i64,
    pub version: i64,
}

#[derive(Debug, Clone, Deserialize, sqlx::FromRow)]
pub struct StopRow {
    pub id: Uuid,
    pub route_id: Uuid,
    pub sequence: i32,
    pub name: String,
    pub address: String,
    #[serde(with = "coordinate")]
    pub latitude: f64,
    #[serde(with = "coordinate")]
    pub longitude: f64,
    pub time_window_begin: i64,
    pub time_window_end: Option<i64>,
    pub dwell_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, sqlx::FromRow)]
pub struct MetadataRow {
    pub id: Uuid,
    pub route_id: Uuid,
    pub key: String,
    pub value: String,
}

impl RouteRow {
    pub fn from_route(route: &RoutePlan) -> StoreResult<Self> {
        let dispatch_time = ticks::to_ticks(route.dispatch_time).ok_or_else(|| {
            StoreError::Constraint(format!("route {} dispatch_time does not fit in ticks", route.id))
        })?;

        Ok(Self {
            id: route.id,
            name: route.name.clone(),
            dispatch_time,
            version: route.version,
        })
    }

    /// Reconstruir el agregado con sus hijos
    pub fn into_route(self, stops: Vec<StopRow>, metadata: Vec<MetadataRow>) -> StoreResult<RoutePlan> {
        let dispatch_time = ticks::from_ticks(self.dispatch_time).ok_or_else(|| {
            StoreError::Corrupt(format!("route {} has dispatch_time out of range", self.id))
        })?;

        let stops = stops
            .into_iter()
            .map(StopRow::into_stop)
            .collect::<StoreResult<Vec<_>>>()?;

        let metadata = metadata.into_iter().map(MetadataRow::into_metadata).collect();

        Ok(RoutePlan {
            id: self.id,
            name: self.name,
            dispatch_time,
            stops,
            metadata,
            version: self.version,
        }
        .normalized())
    }
}

impl StopRow {
    pub fn from_stop(stop: &RouteStop) -> StoreResult<Self> {
        let out_of_range = |column: &str| {
            StoreError::Constraint(format!("stop {} {column} does not fit in ticks", stop.id))
        };
        let time_window_begin = ticks::to_ticks(stop.time_window_begin).ok_or_else(|| out_of_range("time_window_begin"))?;
        let time_window_end = match stop.time_window_end {
            Some(end) => Some(ticks::to_ticks(end).ok_or_else(|| out_of_range("time_window_end"))?),
            None => None,
        };
        let dwell_time = match stop.dwell_time {
            Some(dwell) => Some(ticks::duration_to_ticks(dwell).ok_or_else(|| out_of_range("dwell_time"))?),
            None => None,
        };

        Ok(Self {
            id: stop.id,
            route_id: stop.route_id,
            sequence: stop.sequence,
            name: stop.name.clone(),
            address: stop.address.clone(),
            latitude: stop.latitude,
            longitude: stop.longitude,
            time_window_begin,
            time_window_end,
            dwell_time,
        })
    }

    pub fn into_stop(self) -> StoreResult<RouteStop> {
        let corrupt = |column: &str| StoreError::Corrupt(format!("stop {} has {column} out of range", self.id));

        let time_window_begin = ticks::from_ticks(self.time_window_begin).ok_or_else(|| corrupt("time_window_begin"))?;
        let time_window_end = match self.time_window_end {
            Some(end) => Some(ticks::from_ticks(end).ok_or_else(|| corrupt("time_window_end"))?),
            None => None,
        };
        let dwell_time = match self.dwell_time {
            Some(dwell) => Some(ticks::duration_from_ticks(dwell).ok_or_else(|| corrupt("dwell_time"))?),
            None => None,
        };

        Ok(RouteStop {
            id: self.id,
            route_id: self.route_id,
            sequence: self.sequence,
            name: self.name,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            time_window_begin,
            time_window_end,
            dwell_time,
        })
    }
}

impl MetadataRow {
    pub fn from_metadata(entry: &RouteMetadata) -> Self {
        Self {
            id: entry.id,
            route_id: entry.route_id,
            key: entry.key.clone(),
            value: entry.value.clone(),
        }
    }

    pub fn into_metadata(self) -> RouteMetadata {
        RouteMetadata {
            id: self.id,
            route_id: self.route_id,
            key: self.key,
            value: self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn test_route_rows_rebuild_the_aggregate() {
        let mut route = RoutePlan::new("Villeurbanne".to_string(), ticks::truncate(Utc::now()));
        let mut stop = RouteStop::new(route.id, 2, ticks::truncate(Utc::now()));
        stop.dwell_time = Some(Duration::from_secs(300));
        route.stops.push(stop);
        route.metadata.push(RouteMetadata::new(route.id, "zone".into(), "7".into()));

        let stops = route.stops.iter().map(|s| StopRow::from_stop(s).unwrap()).collect();
        let metadata = route.metadata.iter().map(MetadataRow::from_metadata).collect();
        let rebuilt = RouteRow::from_route(&route).unwrap().into_route(stops, metadata).unwrap();

        assert_eq!(rebuilt, route);
    }

    #[test]
    fn test_instants_beyond_ticks_are_rejected() {
        use chrono::TimeZone;
        let far = Utc.with_ymd_and_hms(100_000, 1, 1, 0, 0, 0).unwrap();

        let route = RoutePlan::new("Lointaine".to_string(), far);
        assert!(matches!(RouteRow::from_route(&route), Err(StoreError::Constraint(_))));

        let mut stop = RouteStop::new(route.id, 1, ticks::truncate(Utc::now()));
        stop.time_window_end = Some(far);
        assert!(matches!(StopRow::from_stop(&stop), Err(StoreError::Constraint(_))));
    }

    #[test]
    fn test_stop_row_reads_null_coordinates_from_json() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "route_id": Uuid::new_v4(),
            "sequence": 1,
            "name": "",
            "address": "",
            "latitude": null,
            "longitude": 4.85,
            "time_window_begin": 638_000_000_000_000_000_i64,
            "time_window_end": null,
            "dwell_time": null
        });
        let row: StopRow = serde_json::from_value(json).unwrap();
        assert!(row.latitude.is_nan());
        assert_eq!(row.longitude, 4.85);
    }

    #[test]
    fn test_negative_dwell_ticks_are_corrupt() {
        let row = StopRow {
            id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            sequence: 0,
            name: String::new(),
            address: String::new(),
            latitude: f64::NAN,
            longitude: f64::NAN,
            time_window_begin: 0,
            time_window_end: None,
            dwell_time: Some(-5),
        };
        assert!(matches!(row.into_stop(), Err(StoreError::Corrupt(_))));
    }
}
