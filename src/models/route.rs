//! Modelo de RoutePlan
//!
//! Raíz del agregado de rutas. Una ruta es dueña de sus paradas y de sus
//! metadatos; los tres se persisten y se borran juntos.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::route_metadata::{normalize_key, RouteMetadata};
use super::route_stop::RouteStop;

/// Longitud máxima del nombre de una ruta
pub const ROUTE_NAME_MAX_LENGTH: usize = 50;

/// Versión inicial del sello de concurrencia
pub const INITIAL_VERSION: i64 = 1;

/// Ruta de reparto con sus paradas y metadatos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub id: Uuid,
    pub name: String,
    pub dispatch_time: DateTime<Utc>,
    #[serde(default)]
    pub stops: Vec<RouteStop>,
    #[serde(default)]
    pub metadata: Vec<RouteMetadata>,
    /// Sello de concurrencia optimista, no forma parte de la vista pública
    #[serde(skip)]
    pub version: i64,
}

impl RoutePlan {
    pub fn new(name: String, dispatch_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            dispatch_time,
            stops: Vec::new(),
            metadata: Vec::new(),
            version: INITIAL_VERSION,
        }
    }

    /// Buscar un metadato por clave sin distinguir mayúsculas
    pub fn find_metadata(&self, key: &str) -> Option<&RouteMetadata> {
        self.metadata.iter().find(|entry| entry.matches_key(key))
    }

    /// Valor de un metadato por clave sin distinguir mayúsculas
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.find_metadata(key).map(|entry| entry.value.as_str())
    }

    pub fn has_metadata_key(&self, key: &str) -> bool {
        self.find_metadata(key).is_some()
    }

    pub fn find_stop(&self, stop_id: Uuid) -> Option<&RouteStop> {
        self.stops.iter().find(|stop| stop.id == stop_id)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Ordenar hijos: paradas por (sequence, id), metadatos por clave normalizada
    pub fn normalize(&mut self) {
        self.stops.sort_by(|a, b| a.sequence.cmp(&b.sequence).then(a.id.cmp(&b.id)));
        self.metadata.sort_by(|a, b| {
            normalize_key(&a.key)
                .cmp(&normalize_key(&b.key))
                .then(a.id.cmp(&b.id))
        });
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route() -> RoutePlan {
        let mut route = RoutePlan::new("Lyon Nord".to_string(), Utc::now());
        route.metadata.push(RouteMetadata::new(route.id, "Depot".to_string(), "LYS-01".to_string()));
        route.metadata.push(RouteMetadata::new(route.id, "carrier".to_string(), "acme".to_string()));
        route
    }

    #[test]
    fn test_new_route_starts_empty() {
        let route = RoutePlan::new("R1".to_string(), Utc::now());
        assert!(route.stops.is_empty());
        assert!(route.metadata.is_empty());
        assert_eq!(route.version, INITIAL_VERSION);
    }

    #[test]
    fn test_metadata_lookup_ignores_case() {
        let route = sample_route();
        assert_eq!(route.metadata_value("DEPOT"), Some("LYS-01"));
        assert!(route.has_metadata_key("Carrier"));
        assert!(!route.has_metadata_key("driver"));
    }

    #[test]
    fn test_normalize_orders_children() {
        let mut route = sample_route();
        let begin = Utc::now();
        route.stops.push(RouteStop::new(route.id, 3, begin));
        route.stops.push(RouteStop::new(route.id, 1, begin));
        route.stops.push(RouteStop::new(route.id, 2, begin));
        route.normalize();

        let sequences: Vec<i32> = route.stops.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(route.metadata[0].key, "carrier");
        assert_eq!(route.metadata[1].key, "Depot");
    }

    #[test]
    fn test_version_is_not_serialized() {
        let route = sample_route();
        let json = serde_json::to_value(&route).unwrap();
        assert!(json.get("version").is_none());
        assert_eq!(json["name"], "Lyon Nord");
    }
}
