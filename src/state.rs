//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use crate::config::environment::EnvironmentConfig;
use crate::repositories::RouteStore;
use crate::services::RouteManager;

#[derive(Debug, Clone)]
pub struct AppState<S> {
    pub manager: RouteManager<S>,
    pub config: EnvironmentConfig,
}

impl<S: RouteStore> AppState<S> {
    pub fn new(store: S, config: EnvironmentConfig) -> Self {
        Self {
            manager: RouteManager::new(store),
            config,
        }
    }
}
