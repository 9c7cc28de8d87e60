use std::net::SocketAddr;
use std::sync::Arc;

use authz_service::{
    build_router,
    config::AuthzConfig,
    services::{
        AdminService, JwtService, PermissionResolver, PgAuditSink, PgIdentityStore,
        RedisPermissionCache, RedisRevocationStore,
    },
    AppState,
};
use service_core::observability::logging::init_tracing;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthzConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authorization service"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        service_core::error::AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e))
    })?;
    tracing::info!("Database initialized");

    let identity = Arc::new(PgIdentityStore::new(pool.clone()));
    let revocation = Arc::new(RedisRevocationStore::new(&config.redis).await?);
    let cache = Arc::new(RedisPermissionCache::new(&config.redis).await?);
    tracing::info!("Redis stores initialized");

    let jwt = JwtService::new(&config.jwt)?;
    tracing::info!("JWT service initialized");

    let resolver = PermissionResolver::new(cache, config.authz.permission_cache_ttl_seconds);
    let audit = Arc::new(PgAuditSink::new(pool));
    let admin = AdminService::new(identity.clone(), resolver.clone(), audit.clone());

    let state = AppState {
        config: config.clone(),
        jwt,
        identity,
        revocation,
        resolver,
        admin,
        audit,
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
