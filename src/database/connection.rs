//! Conexión a PostgreSQL
//!
//! Crea el pool a partir de `DatabaseConfig` y aplica las migraciones del
//! esquema `routing` al arrancar.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Pool de conexiones listo para el almacén de rutas
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Conectar y ejecutar migraciones pendientes
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        tracing::info!(url = %mask_database_url(&config.url), "Conectando a PostgreSQL");

        let pool = config
            .create_pool()
            .await
            .context("Failed to connect to PostgreSQL")?;

        Self::from_pool(pool).await
    }

    /// Usar un pool ya creado, ejecutando las migraciones pendientes
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let connection = Self { pool };
        connection.run_migrations().await?;
        Ok(connection)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Migraciones aplicadas");
        Ok(())
    }

    pub fn into_pool(self) -> PgPool {
        self.pool
    }
}

/// Enmascarar credenciales de la URL de la base de datos en logs
pub fn mask_database_url(url: &str) -> String {
    let Some(at_pos) = url.rfind('@') else {
        return url.to_string();
    };
    let scheme_end = url.find("://").map(|pos| pos + 3).unwrap_or(0);
    if scheme_end > at_pos {
        return url.to_string();
    }
    format!("{}***:***@{}", &url[..scheme_end], &url[at_pos + 1..])
}
