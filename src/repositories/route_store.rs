//! Contrato del almacén de agregados de ruta
//!
//! El RouteManager solo habla con la persistencia a través de estos traits:
//! transacciones con commit/rollback explícitos, altas y bajas de filas, y una
//! consulta perezosa de rutas filtrada por una lista de predicados.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::models::route_metadata::normalize_key;
use crate::models::{RouteMetadata, RoutePlan, RouteStop};
use crate::repositories::store_error::StoreResult;

/// Un filtro sobre rutas; una consulta los combina con AND
#[derive(Debug, Clone, PartialEq)]
pub enum RoutePredicate {
    Id(Uuid),
    /// Subcadena del nombre, sin distinguir mayúsculas
    NameContains(String),
    /// Hora de salida >= valor
    DispatchFrom(DateTime<Utc>),
    /// Hora de salida <= valor
    DispatchUntil(DateTime<Utc>),
    /// Número de paradas >= valor
    MinStops(i64),
    /// Número de paradas <= valor
    MaxStops(i64),
}

impl RoutePredicate {
    /// Evaluar el predicado sobre un agregado ya cargado
    pub fn matches(&self, route: &RoutePlan) -> bool {
        match self {
            RoutePredicate::Id(id) => route.id == *id,
            RoutePredicate::NameContains(fragment) => route
                .name
                .to_lowercase()
                .contains(&fragment.to_lowercase()),
            RoutePredicate::DispatchFrom(start) => route.dispatch_time >= *start,
            RoutePredicate::DispatchUntil(end) => route.dispatch_time <= *end,
            RoutePredicate::MinStops(minimum) => stop_count(route) >= *minimum,
            RoutePredicate::MaxStops(maximum) => stop_count(route) <= *maximum,
        }
    }
}

fn stop_count(route: &RoutePlan) -> i64 {
    i64::try_from(route.stop_count()).unwrap_or(i64::MAX)
}

/// Consulta de rutas: predicados en conjunción, orden por salida descendente
/// y tope de resultados. Siempre incluye paradas y metadatos.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    predicates: Vec<RoutePredicate>,
    limit: i64,
}

impl RouteQuery {
    pub fn new(limit: i64) -> Self {
        Self {
            predicates: Vec::new(),
            limit,
        }
    }

    /// Añadir un predicado a la conjunción
    pub fn and(mut self, predicate: RoutePredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Añadir el predicado solo si hay valor
    pub fn and_if<T>(self, value: Option<T>, predicate: impl FnOnce(T) -> RoutePredicate) -> Self {
        match value {
            Some(value) => self.and(predicate(value)),
            None => self,
        }
    }

    pub fn predicates(&self) -> &[RoutePredicate] {
        &self.predicates
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn matches(&self, route: &RoutePlan) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(route))
    }
}

/// Unidad de trabajo. Las escrituras solo son visibles tras `commit`; soltar
/// la transacción sin confirmar equivale a `rollback`.
#[async_trait]
pub trait RouteTransaction: Send + Sized {
    async fn add_route(&mut self, route: &RoutePlan) -> StoreResult<()>;

    /// Reescribir nombre y hora de salida e incrementar el sello de versión.
    /// Falla con `WriteConflict` si la versión guardada ya no es `expected_version`.
    async fn touch_route(&mut self, route: &RoutePlan, expected_version: i64) -> StoreResult<()>;

    async fn add_metadata(&mut self, entry: &RouteMetadata) -> StoreResult<()>;

    async fn add_stop(&mut self, stop: &RouteStop) -> StoreResult<()>;

    async fn remove_metadata(&mut self, ids: &[Uuid]) -> StoreResult<u64>;

    async fn remove_stops(&mut self, ids: &[Uuid]) -> StoreResult<u64>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}

#[async_trait]
pub trait RouteStore: Clone + Send + Sync + 'static {
    type Transaction: RouteTransaction;

    async fn begin(&self) -> StoreResult<Self::Transaction>;

    /// Rutas que cumplen la consulta, producidas de forma perezosa.
    /// Soltar el stream detiene la enumeración y libera el cursor.
    fn query_routes(&self, query: RouteQuery) -> BoxStream<'static, StoreResult<RoutePlan>>;

    /// Subconjunto de `ids` que existe en el almacén
    async fn existing_route_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Uuid>>;

    /// Borrar rutas con sus paradas y metadatos en una sola operación atómica
    async fn remove_routes(&self, ids: &[Uuid]) -> StoreResult<u64>;
}

/// Claves normalizadas de los metadatos de una ruta
pub fn normalized_keys(route: &RoutePlan) -> Vec<String> {
    route.metadata.iter().map(|entry| normalize_key(&entry.key)).collect()
}
