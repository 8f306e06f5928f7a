//! Modelo de RouteMetadata
//!
//! Pares clave/valor libres asociados a una ruta. Dentro de una misma ruta las
//! claves son únicas sin distinguir mayúsculas; la base de datos no lo impone,
//! lo hace el RouteManager.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const METADATA_KEY_MAX_LENGTH: usize = 50;
pub const METADATA_VALUE_MAX_LENGTH: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMetadata {
    pub id: Uuid,
    pub route_id: Uuid,
    pub key: String,
    pub value: String,
}

impl RouteMetadata {
    pub fn new(route_id: Uuid, key: String, value: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            route_id,
            key,
            value,
        }
    }

    pub fn matches_key(&self, key: &str) -> bool {
        normalize_key(&self.key) == normalize_key(key)
    }
}

impl std::fmt::Display for RouteMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}

/// Forma canónica de una clave para comparar
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_key_ignores_case() {
        let entry = RouteMetadata::new(Uuid::new_v4(), "Zone".to_string(), "B".to_string());
        assert!(entry.matches_key("zone"));
        assert!(entry.matches_key("ZONE"));
        assert!(!entry.matches_key("zones"));
        assert_eq!(entry.to_string(), "Zone: B");
    }
}
