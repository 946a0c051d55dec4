use pawtrack::{
    auth::JwtConfig, cache::create_redis_pool, create_db_pool, create_router, init_tracing,
    shutdown_telemetry, AppState, Config,
};
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("invalid JWT key: {0}")]
    Jwt(#[from] pawtrack::auth::JwtKeyError),
    #[error("database pool: {0}")]
    Database(#[from] diesel::r2d2::PoolError),
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(&config);

    let outcome = run(config).await;
    shutdown_telemetry();

    if let Err(e) = outcome {
        error!(error = %e, "Pawtrack stopped");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting pawtrack"
    );
    for issue in config.validate_for_production() {
        warn!(issue = %issue, "Configuration warning");
    }

    let jwt = JwtConfig::from_env(
        config.jwt.access_token_expiry_secs,
        config.jwt.issuer.clone(),
        config.jwt.audience.clone(),
    )?;

    let db_pool = create_db_pool(&config)?;
    info!(
        host = %config.database.url.rsplit('@').next().unwrap_or("***"),
        max_connections = config.database.max_connections,
        "Database pool ready"
    );

    let state = AppState::new(db_pool, create_redis_pool(&config.redis), jwt, &config);

    // Failures are logged and do not stop startup.
    if config.security.backfill_role_permissions {
        if let Err(e) = state.permissions.backfill_role_defaults().await {
            error!(error = %e, "Role permission backfill failed");
        }
    }
    let app = create_router(state, &config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(address = %addr, docs = %format!("http://{addr}/swagger-ui"), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Cannot listen for shutdown signal, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
