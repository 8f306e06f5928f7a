use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

use route_manager::config::{DatabaseConfig, EnvironmentConfig, StoreBackend};
use route_manager::database::DatabaseConnection;
use route_manager::repositories::{MemoryRouteStore, PgRouteStore, RouteStore};
use route_manager::routes::create_app_router;
use route_manager::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .with_ansi(!config.is_production())
        .init();

    info!("🚚 Route Manager API");
    info!("================================================");
    info!("🌍 Entorno: {}", config.environment);

    let addr: SocketAddr = config.server_url().parse()?;

    match config.store_backend {
        StoreBackend::Postgres => {
            let database = match DatabaseConnection::connect(&DatabaseConfig::from_env()?).await {
                Ok(connection) => connection,
                Err(e) => {
                    error!("❌ Error conectando a la base de datos: {:#}", e);
                    return Err(e);
                }
            };
            info!("✅ PostgreSQL conectado y migrado");
            serve(PgRouteStore::new(database.into_pool()), config, addr).await
        }
        StoreBackend::Memory => {
            warn!("⚠️ Almacén en memoria: los datos se pierden al reiniciar");
            serve(MemoryRouteStore::new(), config, addr).await
        }
    }
}

async fn serve<S: RouteStore>(store: S, config: EnvironmentConfig, addr: SocketAddr) -> Result<()> {
    let app = create_app_router(AppState::new(store, config));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET    /health - Health check");
    info!("   GET    /routes - Buscar rutas");
    info!("   POST   /routes - Crear ruta");
    info!("   GET    /routes/:id - Obtener ruta");
    info!("   PUT    /routes/:id - Actualizar ruta");
    info!("   DELETE /routes/:id - Borrar ruta");
    info!("   POST   /routes/:id/stops - Añadir parada");
    info!("   DELETE /routes/:id/stops/:stop_id - Quitar parada");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el manejador de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el manejador de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
