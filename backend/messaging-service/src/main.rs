use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use messaging_service::config::{Config, StorageBackend, SERVICE_NAME};
use messaging_service::middleware::JwtValidator;
use messaging_service::repository::Repositories;
use messaging_service::services::spawn_expiry_sweeper;
use messaging_service::state::AppState;
use messaging_service::websocket::{ConnectionRegistry, DeliveryChannel, RedisRelay};
use messaging_service::{logging, metrics, routes};
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let config = Arc::new(Config::from_env()?);
    tracing::info!(
        service = SERVICE_NAME,
        env = %config.app.env,
        storage = %config.storage.backend,
        "starting"
    );

    let repos = match (config.storage.backend, config.storage.database.clone()) {
        (StorageBackend::Postgres, Some(db_config)) => {
            db_config.log_config();
            let pool = db_pool::create_pool(db_config)
                .await
                .context("failed to create database pool")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("database migrations failed")?;
            Repositories::postgres(pool)
        }
        (StorageBackend::Postgres, None) => {
            anyhow::bail!("postgres storage selected without database configuration")
        }
        (StorageBackend::Memory, _) => {
            tracing::warn!("using in-memory storage; data is lost on restart");
            Repositories::in_memory()
        }
    };

    let registry = ConnectionRegistry::new();
    let relay = match config.redis.url.as_deref() {
        Some(url) => {
            let relay = RedisRelay::connect(url)
                .await
                .context("failed to connect redis relay")?;
            let listener = relay.clone();
            let listener_registry = registry.clone();
            tokio::spawn(async move {
                if let Err(e) = listener.run_listener(listener_registry).await {
                    tracing::error!(error = %e, "redis relay listener stopped");
                }
            });
            Some(relay)
        }
        None => {
            tracing::info!("REDIS_URL not set; realtime delivery is local to this instance");
            None
        }
    };

    let channel = DeliveryChannel::new(registry, relay);
    let state = AppState::new(config.clone(), repos, channel);
    let _sweeper = spawn_expiry_sweeper(
        state.notifications.clone(),
        config.notifications.sweep_interval(),
    );

    let validator = web::Data::new(JwtValidator::new(
        &config.auth.jwt_secret,
        config.auth.leeway_secs,
    ));
    let state_data = web::Data::new(state);

    let bind_addr = config.bind_address();
    tracing::info!(host = %bind_addr.0, port = bind_addr.1, "starting HTTP server");

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(metrics::MetricsMiddleware)
            .wrap(TracingLogger::default())
            .app_data(state_data.clone())
            .app_data(validator.clone())
            .route("/health", web::get().to(routes::health::health))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(routes::configure_routes)
    })
    .bind(bind_addr)
    .context("failed to bind HTTP listener")?
    .run()
    .await
    .context("HTTP server error")?;

    Ok(())
}
