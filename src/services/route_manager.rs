//! Servicio RouteManager
//!
//! Punto de entrada para crear, consultar, actualizar y borrar agregados de
//! ruta. Valida las opciones antes de tocar el almacén, agrupa cada escritura
//! en una transacción y traduce los fallos del almacén a `RouteError`.

use chrono::{DateTime, Utc};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::dto::{CreateRouteOptions, RouteFilter, StopOptions, UpdateRouteOptions};
use crate::models::{RouteMetadata, RoutePlan, RouteStop};
use crate::repositories::route_store::{
    normalized_keys, RoutePredicate, RouteQuery, RouteStore, RouteTransaction,
};
use crate::repositories::store_error::{StoreError, StoreResult};
use crate::utils::errors::{RouteError, RouteResult};
use crate::utils::ticks;
use crate::utils::validation::validate_unique_keys;

/// Nombre por defecto de una ruta creada sin nombre
pub fn default_route_name(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

#[derive(Debug, Clone)]
pub struct RouteManager<S> {
    store: S,
}

impl<S: RouteStore> RouteManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Crear una ruta con sus metadatos y paradas en una sola transacción
    pub async fn create(&self, options: CreateRouteOptions) -> RouteResult<RoutePlan> {
        options.check()?;

        let now = Utc::now();
        let name = options
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| default_route_name(now));
        let dispatch_time = ticks::truncate(options.dispatch_time.unwrap_or(now));

        let mut route = RoutePlan::new(name, dispatch_time);
        route.metadata = options
            .metadata
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| RouteMetadata::new(route.id, key, value))
            .collect();
        route.stops = options
            .stops
            .unwrap_or_default()
            .into_iter()
            .map(|stop| stop.into_stop(route.id))
            .collect();
        route.normalize();

        debug!(route_id = %route.id, name = %route.name, "Creando ruta");

        let mut tx = self.store.begin().await?;
        if let Err(e) = insert_route(&mut tx, &route).await {
            error!(route_id = %route.id, error = %e, "Error creando ruta");
            rollback(tx).await;
            return Err(RouteError::from_store(e, route.id));
        }
        tx.commit()
            .await
            .map_err(|e| RouteError::from_store(e, route.id))?;

        info!(
            route_id = %route.id,
            stops = route.stops.len(),
            metadata = route.metadata.len(),
            "Ruta creada"
        );
        Ok(route)
    }

    /// Buscar rutas. El stream es perezoso; soltarlo detiene la lectura.
    pub fn find(&self, filter: Option<RouteFilter>) -> BoxStream<'static, RouteResult<RoutePlan>> {
        let filter = filter.unwrap_or_default();
        if let Err(errors) = filter.validate() {
            let error = RouteError::from(errors);
            debug!(error = %error, "Filtro de rutas inválido");
            return stream::once(future::ready(Err(error))).boxed();
        }

        let query = build_route_query(filter);
        debug!(predicates = query.predicates().len(), limit = query.limit(), "Consultando rutas");

        self.store
            .query_routes(query)
            .map(|item| item.map_err(RouteError::from))
            .boxed()
    }

    pub async fn find_by_id(&self, id: Uuid) -> RouteResult<Option<RoutePlan>> {
        let mut routes = self.find(Some(RouteFilter::by_id(id).with_limit(1)));
        routes.next().await.transpose()
    }

    /// Actualización parcial de una ruta existente
    pub async fn update(&self, id: Uuid, options: UpdateRouteOptions) -> RouteResult<RoutePlan> {
        options.check()?;

        let current = self
            .find_by_id(id)
            .await?
            .ok_or(RouteError::NotFound { id })?;

        let plan = UpdatePlan::new(current, options)?;
        if plan.is_empty() {
            debug!(route_id = %id, "Actualización sin cambios");
            return Ok(plan.route);
        }

        let mut tx = self.store.begin().await?;
        if let Err(e) = plan.apply(&mut tx).await {
            warn!(route_id = %id, error = %e, "Error actualizando ruta, deshaciendo");
            rollback(tx).await;
            return Err(self.resolve_write_failure(e, id).await);
        }
        if let Err(e) = tx.commit().await {
            warn!(route_id = %id, error = %e, "Commit de actualización rechazado");
            return Err(self.resolve_write_failure(e, id).await);
        }

        info!(
            route_id = %id,
            removed_stops = plan.removed_stops.len(),
            added_stops = plan.added_stops.len(),
            removed_metadata = plan.removed_metadata.len(),
            added_metadata = plan.added_metadata.len(),
            "Ruta actualizada"
        );
        Ok(plan.into_route())
    }

    /// Borrar las rutas indicadas con todos sus hijos.
    /// Devuelve cuántas rutas se borraron; ids inexistentes se ignoran.
    pub async fn delete(&self, ids: &[Uuid]) -> RouteResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let existing = self.store.existing_route_ids(ids).await?;
        if existing.is_empty() {
            debug!(requested = ids.len(), "Ninguna ruta que borrar");
            return Ok(0);
        }

        let removed = self.store.remove_routes(&existing).await?;
        warn!(requested = ids.len(), removed, "Rutas borradas");
        Ok(removed)
    }

    pub async fn delete_routes(&self, routes: &[RoutePlan]) -> RouteResult<u64> {
        let ids: Vec<Uuid> = routes.iter().map(|route| route.id).collect();
        self.delete(&ids).await
    }

    pub async fn delete_route(&self, route: &RoutePlan) -> RouteResult<bool> {
        Ok(self.delete(&[route.id]).await? > 0)
    }

    // Un conflicto sobre una ruta que ya no existe se informa como NotFound
    async fn resolve_write_failure(&self, error: StoreError, id: Uuid) -> RouteError {
        if !error.is_write_conflict() {
            return error.into();
        }
        match self.store.existing_route_ids(&[id]).await {
            Ok(found) if found.is_empty() => RouteError::NotFound { id },
            _ => RouteError::WriteConflict { id },
        }
    }
}

fn build_route_query(filter: RouteFilter) -> RouteQuery {
    let limit = filter.effective_limit();
    RouteQuery::new(limit)
        .and_if(filter.id, RoutePredicate::Id)
        .and_if(
            filter.name.filter(|name| !name.trim().is_empty()),
            RoutePredicate::NameContains,
        )
        .and_if(filter.dispatch_start_time, RoutePredicate::DispatchFrom)
        .and_if(filter.dispatch_end_time, RoutePredicate::DispatchUntil)
        .and_if(filter.stop_minimum, RoutePredicate::MinStops)
        .and_if(filter.stop_maximum, RoutePredicate::MaxStops)
}

async fn insert_route<T: RouteTransaction>(tx: &mut T, route: &RoutePlan) -> StoreResult<()> {
    tx.add_route(route).await?;
    for entry in &route.metadata {
        debug!(route_id = %route.id, key = %entry.key, "Añadiendo metadato");
        tx.add_metadata(entry).await?;
    }
    for stop in &route.stops {
        debug!(route_id = %route.id, stop_id = %stop.id, sequence = stop.sequence, "Añadiendo parada");
        tx.add_stop(stop).await?;
    }
    Ok(())
}

async fn rollback<T: RouteTransaction>(tx: T) {
    if let Err(e) = tx.rollback().await {
        error!(error = %e, "Error en rollback");
    }
}

/// Cambios calculados para una actualización, aplicados en orden:
/// raíz, bajas de metadatos, altas de metadatos, bajas de paradas, altas de paradas
#[derive(Debug)]
struct UpdatePlan {
    route: RoutePlan,
    expected_version: i64,
    root_changed: bool,
    removed_metadata: Vec<Uuid>,
    added_metadata: Vec<RouteMetadata>,
    removed_stops: Vec<Uuid>,
    added_stops: Vec<RouteStop>,
}

impl UpdatePlan {
    fn new(mut route: RoutePlan, options: UpdateRouteOptions) -> RouteResult<Self> {
        let expected_version = route.version;
        let mut root_changed = false;

        if let Some(name) = options.name.filter(|name| !name.trim().is_empty()) {
            if name != route.name {
                route.name = name;
                root_changed = true;
            }
        }

        if let Some(dispatch_time) = options.dispatch_time.map(ticks::truncate) {
            if dispatch_time != route.dispatch_time {
                route.dispatch_time = dispatch_time;
                root_changed = true;
            }
        }

        let mut removed_metadata = Vec::new();
        for key in options.remove_metadata.unwrap_or_default() {
            route.metadata.retain(|entry| {
                if entry.matches_key(&key) {
                    removed_metadata.push(entry.id);
                    false
                } else {
                    true
                }
            });
        }

        let additions = options.add_metadata.unwrap_or_default();
        let surviving = normalized_keys(&route);
        validate_unique_keys("add_metadata", additions.keys(), &surviving)?;
        let added_metadata: Vec<RouteMetadata> = additions
            .into_iter()
            .map(|(key, value)| RouteMetadata::new(route.id, key, value))
            .collect();

        let requested: HashSet<Uuid> = options.remove_stops.unwrap_or_default().into_iter().collect();
        let mut removed_stops = Vec::new();
        route.stops.retain(|stop| {
            if requested.contains(&stop.id) {
                removed_stops.push(stop.id);
                false
            } else {
                true
            }
        });

        let added_stops: Vec<RouteStop> = options
            .add_stops
            .unwrap_or_default()
            .into_iter()
            .map(|stop: StopOptions| stop.into_stop(route.id))
            .collect();

        Ok(Self {
            route,
            expected_version,
            root_changed,
            removed_metadata,
            added_metadata,
            removed_stops,
            added_stops,
        })
    }

    fn is_empty(&self) -> bool {
        !self.root_changed
            && self.removed_metadata.is_empty()
            && self.added_metadata.is_empty()
            && self.removed_stops.is_empty()
            && self.added_stops.is_empty()
    }

    async fn apply<T: RouteTransaction>(&self, tx: &mut T) -> StoreResult<()> {
        tx.touch_route(&self.route, self.expected_version).await?;

        if !self.removed_metadata.is_empty() {
            tx.remove_metadata(&self.removed_metadata).await?;
        }
        for entry in &self.added_metadata {
            tx.add_metadata(entry).await?;
        }
        if !self.removed_stops.is_empty() {
            tx.remove_stops(&self.removed_stops).await?;
        }
        for stop in &self.added_stops {
            tx.add_stop(stop).await?;
        }
        Ok(())
    }

    fn into_route(self) -> RoutePlan {
        let mut route = self.route;
        route.version = self.expected_version + 1;
        route.metadata.extend(self.added_metadata);
        route.stops.extend(self.added_stops);
        route.normalized()
    }
}
