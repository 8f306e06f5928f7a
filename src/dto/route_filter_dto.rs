use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::validate_tick_range;

/// Tamaño de página cuando no se indica `limit`
pub const DEFAULT_LIMIT: i64 = 10;

// Filtros para búsqueda de rutas; los campos ausentes no filtran
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct RouteFilter {
    pub id: Option<Uuid>,

    pub name: Option<String>,

    #[validate(custom = "validate_tick_range")]
    pub dispatch_start_time: Option<DateTime<Utc>>,

    #[validate(custom = "validate_tick_range")]
    pub dispatch_end_time: Option<DateTime<Utc>>,

    #[validate(range(min = 0))]
    pub stop_minimum: Option<i64>,

    #[validate(range(min = 0))]
    pub stop_maximum: Option<i64>,

    #[validate(range(min = 1))]
    pub limit: Option<i64>,
}

impl RouteFilter {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn name_contains(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn dispatched_between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.dispatch_start_time = start;
        self.dispatch_end_time = end;
        self
    }

    pub fn with_stop_count(mut self, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        self.stop_minimum = minimum;
        self.stop_maximum = maximum;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}
