//! Live Chess Back binary entrypoint wiring REST routes, Redis and MongoDB layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_chess_back::{
    chess::ShakmatyRules,
    config::AppConfig,
    dao::live_store::{LiveStore, memory::MemoryLiveStore},
    routes,
    services::{scheduler, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let live_store = connect_live_store().await;
    let app_state = AppState::new(config, live_store, Arc::new(ShakmatyRules));

    spawn_record_store(app_state.clone());
    tokio::spawn(scheduler::run_tournament_sweeps(app_state.clone()));
    tokio::spawn(scheduler::run_finalization_replays(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connect to Redis, falling back to an in-process store for single-node development.
#[cfg(feature = "redis-store")]
async fn connect_live_store() -> Arc<dyn LiveStore> {
    use live_chess_back::dao::live_store::redis::{RedisConfig, RedisLiveStore};

    let config = RedisConfig::from_env();
    match RedisLiveStore::connect(config).await {
        Ok(store) => {
            info!("connected to Redis");
            Arc::new(store)
        }
        Err(err) => {
            warn!(error = %err, "Redis unavailable; using the in-memory live store");
            Arc::new(MemoryLiveStore::new())
        }
    }
}

#[cfg(not(feature = "redis-store"))]
async fn connect_live_store() -> Arc<dyn LiveStore> {
    warn!("built without Redis support; using the in-memory live store");
    Arc::new(MemoryLiveStore::new())
}

/// Start the MongoDB supervisor; the service stays degraded until it connects.
#[cfg(feature = "mongo-store")]
fn spawn_record_store(state: SharedState) {
    use live_chess_back::dao::{
        record_store::{
            RecordStore,
            mongodb::{MongoConfig, MongoRecordStore},
        },
        storage::StorageError,
    };

    let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoRecordStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
    }));
}

/// Without MongoDB support, records live in memory for the lifetime of the process.
#[cfg(not(feature = "mongo-store"))]
fn spawn_record_store(state: SharedState) {
    use live_chess_back::dao::record_store::memory::MemoryRecordStore;

    warn!("built without MongoDB support; using the in-memory record store");
    tokio::spawn(async move {
        state
            .set_record_store(Arc::new(MemoryRecordStore::new()))
            .await;
    });
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
