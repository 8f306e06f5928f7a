//! Almacén de rutas en memoria
//!
//! Implementa el mismo contrato que el adaptador de PostgreSQL sobre tablas en
//! proceso: restricciones de esquema comprobadas en cada sentencia, escrituras
//! de una transacción aplicadas de golpe en el commit y borrado en cascada.
//! Incluye inyección de fallos y latencia para pruebas.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::route::ROUTE_NAME_MAX_LENGTH;
use crate::models::route_metadata::{METADATA_KEY_MAX_LENGTH, METADATA_VALUE_MAX_LENGTH};
use crate::models::route_stop::{STOP_ADDRESS_MAX_LENGTH, STOP_NAME_MAX_LENGTH};
use crate::models::{RouteMetadata, RoutePlan, RouteStop};
use crate::repositories::route_rows::{MetadataRow, RouteRow, StopRow};
use crate::repositories::route_store::{RouteQuery, RouteStore, RouteTransaction};
use crate::repositories::store_error::{StoreError, StoreResult};

/// Punto del almacén donde se puede inyectar un fallo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    AddRoute,
    TouchRoute,
    AddMetadata,
    AddStop,
    RemoveMetadata,
    RemoveStops,
    Commit,
    Query,
    RemoveRoutes,
}

/// Número de filas por tabla
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub routes: usize,
    pub stops: usize,
    pub metadata: usize,
}

#[derive(Debug, Default)]
struct Tables {
    routes: HashMap<Uuid, RouteRow>,
    stops: HashMap<Uuid, StopRow>,
    metadata: HashMap<Uuid, MetadataRow>,
}

impl Tables {
    fn assemble(&self, row: &RouteRow) -> StoreResult<RoutePlan> {
        let stops = self
            .stops
            .values()
            .filter(|stop| stop.route_id == row.id)
            .cloned()
            .collect();
        let metadata = self
            .metadata
            .values()
            .filter(|entry| entry.route_id == row.id)
            .cloned()
            .collect();
        row.clone().into_route(stops, metadata)
    }
}

#[derive(Debug, Default)]
struct Faults {
    pending: Mutex<Vec<(FaultPoint, StoreError)>>,
}

impl Faults {
    fn take(&self, point: FaultPoint) -> Option<StoreError> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let index = pending.iter().position(|(p, _)| *p == point)?;
        Some(pending.remove(index).1)
    }

    fn push(&self, point: FaultPoint, error: StoreError) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((point, error));
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRouteStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Faults>,
    latency: Option<Duration>,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Añadir una espera antes de cada sentencia
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Hacer fallar la próxima operación en `point` con `error`
    pub fn fail_next(&self, point: FaultPoint, error: StoreError) {
        self.faults.push(point, error);
    }

    pub async fn row_counts(&self) -> RowCounts {
        let tables = self.tables.read().await;
        RowCounts {
            routes: tables.routes.len(),
            stops: tables.stops.len(),
            metadata: tables.metadata.len(),
        }
    }

    /// Escribir una fila de metadatos fuera del RouteManager, como haría
    /// otro cliente de la misma base de datos
    pub async fn insert_raw_metadata(&self, entry: &RouteMetadata) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.routes.contains_key(&entry.route_id) {
            return Err(foreign_key_violation("metadata", entry.route_id));
        }
        tables.metadata.insert(entry.id, MetadataRow::from_metadata(entry));
        Ok(())
    }
}

async fn statement(latency: Option<Duration>, faults: &Faults, point: FaultPoint) -> StoreResult<()> {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
    match faults.take(point) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn check_length(table: &str, column: &str, value: &str, max: usize) -> StoreResult<()> {
    if value.chars().count() > max {
        return Err(StoreError::Constraint(format!(
            "value too long for {table}.{column} (max {max})"
        )));
    }
    Ok(())
}

fn foreign_key_violation(table: &str, route_id: Uuid) -> StoreError {
    StoreError::Constraint(format!("{table}.route_id references missing route {route_id}"))
}

fn duplicate_key(table: &str, id: Uuid) -> StoreError {
    StoreError::Constraint(format!("duplicate primary key {id} in {table}"))
}

#[derive(Debug)]
enum StagedWrite {
    InsertRoute(RouteRow),
    TouchRoute { row: RouteRow, expected_version: i64 },
    InsertStop(StopRow),
    InsertMetadata(MetadataRow),
    DeleteStops(Vec<Uuid>),
    DeleteMetadata(Vec<Uuid>),
}

/// Transacción en memoria; soltarla sin `commit` descarta lo escrito
#[derive(Debug)]
pub struct MemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Faults>,
    latency: Option<Duration>,
    staged: Vec<StagedWrite>,
}

impl MemoryTransaction {
    async fn statement(&self, point: FaultPoint) -> StoreResult<()> {
        statement(self.latency, &self.faults, point).await
    }

    fn staged_route(&self, id: Uuid) -> bool {
        self.staged
            .iter()
            .any(|write| matches!(write, StagedWrite::InsertRoute(row) if row.id == id))
    }

    fn staged_child(&self, id: Uuid) -> bool {
        self.staged.iter().any(|write| match write {
            StagedWrite::InsertStop(row) => row.id == id,
            StagedWrite::InsertMetadata(row) => row.id == id,
            _ => false,
        })
    }

    fn staged_deletes(&self) -> HashSet<Uuid> {
        self.staged
            .iter()
            .flat_map(|write| match write {
                StagedWrite::DeleteStops(ids) | StagedWrite::DeleteMetadata(ids) => ids.as_slice(),
                _ => &[][..],
            })
            .copied()
            .collect()
    }

    async fn route_visible(&self, id: Uuid) -> bool {
        self.staged_route(id) || self.tables.read().await.routes.contains_key(&id)
    }
}

#[async_trait]
impl RouteTransaction for MemoryTransaction {
    async fn add_route(&mut self, route: &RoutePlan) -> StoreResult<()> {
        self.statement(FaultPoint::AddRoute).await?;
        check_length("routes", "name", &route.name, ROUTE_NAME_MAX_LENGTH)?;
        if self.route_visible(route.id).await {
            return Err(duplicate_key("routes", route.id));
        }
        let row = RouteRow::from_route(route)?;
        self.staged.push(StagedWrite::InsertRoute(row));
        Ok(())
    }

    async fn touch_route(&mut self, route: &RoutePlan, expected_version: i64) -> StoreResult<()> {
        self.statement(FaultPoint::TouchRoute).await?;
        check_length("routes", "name", &route.name, ROUTE_NAME_MAX_LENGTH)?;

        let current = self
            .tables
            .read()
            .await
            .routes
            .get(&route.id)
            .map(|row| row.version);
        if current != Some(expected_version) {
            return Err(StoreError::WriteConflict(format!(
                "route {} is no longer at version {expected_version}",
                route.id
            )));
        }

        let mut row = RouteRow::from_route(route)?;
        row.version = expected_version + 1;
        self.staged.push(StagedWrite::TouchRoute { row, expected_version });
        Ok(())
    }

    async fn add_metadata(&mut self, entry: &RouteMetadata) -> StoreResult<()> {
        self.statement(FaultPoint::AddMetadata).await?;
        check_length("metadata", "key", &entry.key, METADATA_KEY_MAX_LENGTH)?;
        check_length("metadata", "value", &entry.value, METADATA_VALUE_MAX_LENGTH)?;
        if !self.route_visible(entry.route_id).await {
            return Err(foreign_key_violation("metadata", entry.route_id));
        }
        if self.staged_child(entry.id) || self.tables.read().await.metadata.contains_key(&entry.id) {
            return Err(duplicate_key("metadata", entry.id));
        }
        self.staged.push(StagedWrite::InsertMetadata(MetadataRow::from_metadata(entry)));
        Ok(())
    }

    async fn add_stop(&mut self, stop: &RouteStop) -> StoreResult<()> {
        self.statement(FaultPoint::AddStop).await?;
        check_length("stops", "name", &stop.name, STOP_NAME_MAX_LENGTH)?;
        check_length("stops", "address", &stop.address, STOP_ADDRESS_MAX_LENGTH)?;
        if !stop.has_valid_time_window() {
            return Err(StoreError::Constraint(format!(
                "stop {} violates stops.time_window_end >= time_window_begin",
                stop.id
            )));
        }
        if !self.route_visible(stop.route_id).await {
            return Err(foreign_key_violation("stops", stop.route_id));
        }
        if self.staged_child(stop.id) || self.tables.read().await.stops.contains_key(&stop.id) {
            return Err(duplicate_key("stops", stop.id));
        }
        let row = StopRow::from_stop(stop)?;
        self.staged.push(StagedWrite::InsertStop(row));
        Ok(())
    }

    async fn remove_metadata(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        self.statement(FaultPoint::RemoveMetadata).await?;
        let already_deleted = self.staged_deletes();
        let targets: Vec<Uuid> = {
            let tables = self.tables.read().await;
            ids.iter()
                .filter(|id| tables.metadata.contains_key(*id) && !already_deleted.contains(*id))
                .copied()
                .collect()
        };
        let removed = targets.len() as u64;
        self.staged.push(StagedWrite::DeleteMetadata(targets));
        Ok(removed)
    }

    async fn remove_stops(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        self.statement(FaultPoint::RemoveStops).await?;
        let already_deleted = self.staged_deletes();
        let targets: Vec<Uuid> = {
            let tables = self.tables.read().await;
            ids.iter()
                .filter(|id| tables.stops.contains_key(*id) && !already_deleted.contains(*id))
                .copied()
                .collect()
        };
        let removed = targets.len() as u64;
        self.staged.push(StagedWrite::DeleteStops(targets));
        Ok(removed)
    }

    async fn commit(self) -> StoreResult<()> {
        self.statement(FaultPoint::Commit).await?;
        let mut tables = self.tables.write().await;

        // Revalidar contra el estado confirmado antes de aplicar nada
        let mut new_routes = HashSet::new();
        for write in &self.staged {
            match write {
                StagedWrite::InsertRoute(row) => {
                    if tables.routes.contains_key(&row.id) {
                        return Err(duplicate_key("routes", row.id));
                    }
                    new_routes.insert(row.id);
                }
                StagedWrite::TouchRoute { row, expected_version } => {
                    let current = tables.routes.get(&row.id).map(|r| r.version);
                    if current != Some(*expected_version) {
                        return Err(StoreError::WriteConflict(format!(
                            "route {} changed before commit",
                            row.id
                        )));
                    }
                }
                StagedWrite::InsertStop(row) => {
                    if !new_routes.contains(&row.route_id) && !tables.routes.contains_key(&row.route_id) {
                        return Err(foreign_key_violation("stops", row.route_id));
                    }
                }
                StagedWrite::InsertMetadata(row) => {
                    if !new_routes.contains(&row.route_id) && !tables.routes.contains_key(&row.route_id) {
                        return Err(foreign_key_violation("metadata", row.route_id));
                    }
                }
                StagedWrite::DeleteStops(_) | StagedWrite::DeleteMetadata(_) => {}
            }
        }

        for write in self.staged {
            match write {
                StagedWrite::InsertRoute(row) | StagedWrite::TouchRoute { row, .. } => {
                    tables.routes.insert(row.id, row);
                }
                StagedWrite::InsertStop(row) => {
                    tables.stops.insert(row.id, row);
                }
                StagedWrite::InsertMetadata(row) => {
                    tables.metadata.insert(row.id, row);
                }
                StagedWrite::DeleteStops(ids) => {
                    for id in ids {
                        tables.stops.remove(&id);
                    }
                }
                StagedWrite::DeleteMetadata(ids) => {
                    for id in ids {
                        tables.metadata.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        tracing::debug!(staged = self.staged.len(), "Descartando escrituras de la transacción en memoria");
        Ok(())
    }
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> StoreResult<MemoryTransaction> {
        statement(self.latency, &self.faults, FaultPoint::Begin).await?;
        Ok(MemoryTransaction {
            tables: Arc::clone(&self.tables),
            faults: Arc::clone(&self.faults),
            latency: self.latency,
            staged: Vec::new(),
        })
    }

    fn query_routes(&self, query: RouteQuery) -> BoxStream<'static, StoreResult<RoutePlan>> {
        let tables = Arc::clone(&self.tables);
        let faults = Arc::clone(&self.faults);
        let latency = self.latency;

        stream::once(async move {
            statement(latency, &faults, FaultPoint::Query).await?;
            let tables = tables.read().await;

            let mut routes = Vec::new();
            for row in tables.routes.values() {
                let route = tables.assemble(row)?;
                if query.matches(&route) {
                    routes.push(route);
                }
            }
            routes.sort_by(|a, b| b.dispatch_time.cmp(&a.dispatch_time).then(a.id.cmp(&b.id)));
            routes.truncate(usize::try_from(query.limit()).unwrap_or(0));
            Ok::<_, StoreError>(routes)
        })
        .flat_map(|result| match result {
            Ok(routes) => stream::iter(routes.into_iter().map(Ok)).boxed(),
            Err(error) => stream::iter(vec![Err(error)]).boxed(),
        })
        .boxed()
    }

    async fn existing_route_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        statement(self.latency, &self.faults, FaultPoint::Query).await?;
        let tables = self.tables.read().await;
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| tables.routes.contains_key(*id) && seen.insert(**id))
            .copied()
            .collect())
    }

    async fn remove_routes(&self, ids: &[Uuid]) -> StoreResult<u64> {
        statement(self.latency, &self.faults, FaultPoint::RemoveRoutes).await?;
        let mut tables = self.tables.write().await;
        let targets: HashSet<Uuid> = ids.iter().copied().collect();

        // Hijos primero, luego la raíz, todo bajo el mismo candado
        tables.stops.retain(|_, stop| !targets.contains(&stop.route_id));
        tables.metadata.retain(|_, entry| !targets.contains(&entry.route_id));
        let before = tables.routes.len();
        tables.routes.retain(|id, _| !targets.contains(id));
        Ok((before - tables.routes.len()) as u64)
    }
}
