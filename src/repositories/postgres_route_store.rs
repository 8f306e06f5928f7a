//! Almacén de rutas sobre PostgreSQL
//!
//! Tablas en el esquema `routing`; los hijos se cargan junto a cada ruta con
//! sub-consultas `json_agg`. Las consultas se ejecutan en una tarea aparte que
//! alimenta un canal acotado, así el consumidor marca el ritmo y soltar el
//! stream cancela la lectura.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{RouteMetadata, RoutePlan, RouteStop};
use crate::repositories::route_rows::{MetadataRow, RouteRow, StopRow};
use crate::repositories::route_store::{RoutePredicate, RouteQuery, RouteStore, RouteTransaction};
use crate::repositories::store_error::{StoreError, StoreResult};
use crate::utils::ticks;

const SELECT_ROUTES: &str = r#"
    SELECT r.id, r.name, r.dispatch_time, r.version,
        COALESCE((
            SELECT json_agg(json_build_object(
                'id', s.id,
                'route_id', s.route_id,
                'sequence', s.sequence,
                'name', s.name,
                'address', s.address,
                'latitude', NULLIF(s.latitude, 'NaN'),
                'longitude', NULLIF(s.longitude, 'NaN'),
                'time_window_begin', s.time_window_begin,
                'time_window_end', s.time_window_end,
                'dwell_time', s.dwell_time))
            FROM routing.stops s WHERE s.route_id = r.id
        ), '[]'::json) AS stops,
        COALESCE((
            SELECT json_agg(json_build_object(
                'id', m.id,
                'route_id', m.route_id,
                'key', m.key,
                'value', m.value))
            FROM routing.metadata m WHERE m.route_id = r.id
        ), '[]'::json) AS metadata
    FROM routing.routes r
    WHERE TRUE"#;

const STOP_COUNT: &str = "(SELECT COUNT(*) FROM routing.stops c WHERE c.route_id = r.id)";

#[derive(Debug, sqlx::FromRow)]
struct RouteRecord {
    id: Uuid,
    name: String,
    dispatch_time: i64,
    version: i64,
    stops: Json<Vec<StopRow>>,
    metadata: Json<Vec<MetadataRow>>,
}

impl RouteRecord {
    fn into_route(self) -> StoreResult<RoutePlan> {
        let row = RouteRow {
            id: self.id,
            name: self.name,
            dispatch_time: self.dispatch_time,
            version: self.version,
        };
        row.into_route(self.stops.0, self.metadata.0)
    }
}

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &RoutePredicate) {
    match predicate {
        RoutePredicate::Id(id) => {
            builder.push(" AND r.id = ");
            builder.push_bind(*id);
        }
        RoutePredicate::NameContains(fragment) => {
            builder.push(" AND strpos(lower(r.name), lower(");
            builder.push_bind(fragment.clone());
            builder.push(")) > 0");
        }
        RoutePredicate::DispatchFrom(start) => {
            builder.push(" AND r.dispatch_time >= ");
            builder.push_bind(ticks::saturating_ticks(*start));
        }
        RoutePredicate::DispatchUntil(end) => {
            builder.push(" AND r.dispatch_time <= ");
            builder.push_bind(ticks::saturating_ticks(*end));
        }
        RoutePredicate::MinStops(minimum) => {
            builder.push(format!(" AND {STOP_COUNT} >= "));
            builder.push_bind(*minimum);
        }
        RoutePredicate::MaxStops(maximum) => {
            builder.push(format!(" AND {STOP_COUNT} <= "));
            builder.push_bind(*maximum);
        }
    }
}

fn build_query(query: &RouteQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_ROUTES);
    for predicate in query.predicates() {
        push_predicate(&mut builder, predicate);
    }
    builder.push(" ORDER BY r.dispatch_time DESC, r.id LIMIT ");
    builder.push_bind(query.limit());
    builder
}

/// Aborta la tarea lectora cuando el stream se suelta
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Debug, Clone)]
pub struct PgRouteStore {
    pool: PgPool,
}

impl PgRouteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgRouteTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RouteTransaction for PgRouteTransaction {
    async fn add_route(&mut self, route: &RoutePlan) -> StoreResult<()> {
        let row = RouteRow::from_route(route)?;
        sqlx::query(
            "INSERT INTO routing.routes (id, name, dispatch_time, version) VALUES ($1, $2, $3, $4)",
        )
        .bind(row.id)
        .bind(row.name)
        .bind(row.dispatch_time)
        .bind(row.version)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn touch_route(&mut self, route: &RoutePlan, expected_version: i64) -> StoreResult<()> {
        let row = RouteRow::from_route(route)?;
        let result = sqlx::query(
            r#"
            UPDATE routing.routes
            SET name = $3, dispatch_time = $4, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(row.id)
        .bind(expected_version)
        .bind(row.name)
        .bind(row.dispatch_time)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::WriteConflict(format!(
                "route {} is no longer at version {expected_version}",
                route.id
            )));
        }
        Ok(())
    }

    async fn add_metadata(&mut self, entry: &RouteMetadata) -> StoreResult<()> {
        sqlx::query("INSERT INTO routing.metadata (id, route_id, key, value) VALUES ($1, $2, $3, $4)")
            .bind(entry.id)
            .bind(entry.route_id)
            .bind(&entry.key)
            .bind(&entry.value)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn add_stop(&mut self, stop: &RouteStop) -> StoreResult<()> {
        let row = StopRow::from_stop(stop)?;
        sqlx::query(
            r#"
            INSERT INTO routing.stops
                (id, route_id, sequence, name, address, latitude, longitude,
                 time_window_begin, time_window_end, dwell_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(row.id)
        .bind(row.route_id)
        .bind(row.sequence)
        .bind(row.name)
        .bind(row.address)
        .bind(row.latitude)
        .bind(row.longitude)
        .bind(row.time_window_begin)
        .bind(row.time_window_end)
        .bind(row.dwell_time)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn remove_metadata(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM routing.metadata WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn remove_stops(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM routing.stops WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl RouteStore for PgRouteStore {
    type Transaction = PgRouteTransaction;

    async fn begin(&self) -> StoreResult<PgRouteTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PgRouteTransaction { tx })
    }

    fn query_routes(&self, query: RouteQuery) -> BoxStream<'static, StoreResult<RoutePlan>> {
        let pool = self.pool.clone();
        let (sender, receiver) = mpsc::channel::<StoreResult<RoutePlan>>(1);

        let handle = tokio::spawn(async move {
            let mut builder = build_query(&query);
            let mut rows = builder.build_query_as::<RouteRecord>().fetch(&pool);

            while let Some(row) = rows.next().await {
                let item = row.map_err(StoreError::from).and_then(RouteRecord::into_route);
                let failed = item.is_err();
                if sender.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        stream::unfold((receiver, AbortOnDrop(handle)), |(mut receiver, guard)| async move {
            let item = receiver.recv().await?;
            Some((item, (receiver, guard)))
        })
        .boxed()
    }

    async fn existing_route_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM routing.routes WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(found)
    }

    async fn remove_routes(&self, ids: &[Uuid]) -> StoreResult<u64> {
        // Paradas y metadatos caen por ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM routing.routes WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await?;
        tracing::debug!(removed = result.rows_affected(), "Rutas borradas en PostgreSQL");
        Ok(result.rows_affected())
    }
}
