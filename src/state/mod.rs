/// Live game record and its status transitions.
pub mod live_game;
mod notifier;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    chess::RulesEngine,
    config::AppConfig,
    dao::{live_store::LiveStore, record_store::RecordStore},
    error::ServiceError,
};

pub use self::notifier::{PairingNotifier, Waiter};

/// Handle to the application state shared by routes and background tasks.
pub type SharedState = Arc<AppState>;

/// Central application state: configuration, store handles and in-process coordination.
pub struct AppState {
    config: AppConfig,
    live_store: Arc<dyn LiveStore>,
    record_store: RwLock<Option<Arc<dyn RecordStore>>>,
    rules: Arc<dyn RulesEngine>,
    notifier: PairingNotifier,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`].
    ///
    /// The application starts in degraded mode until a record store is installed.
    pub fn new(
        config: AppConfig,
        live_store: Arc<dyn LiveStore>,
        rules: Arc<dyn RulesEngine>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            live_store,
            record_store: RwLock::new(None),
            rules,
            notifier: PairingNotifier::new(),
            degraded: degraded_tx,
        })
    }

    /// State with both stores installed, out of degraded mode.
    pub async fn with_stores(
        config: AppConfig,
        live_store: Arc<dyn LiveStore>,
        record_store: Arc<dyn RecordStore>,
        rules: Arc<dyn RulesEngine>,
    ) -> SharedState {
        let state = Self::new(config, live_store, rules);
        state.set_record_store(record_store).await;
        state
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared fast store.
    pub fn live_store(&self) -> Arc<dyn LiveStore> {
        self.live_store.clone()
    }

    /// Chess rules engine.
    pub fn rules(&self) -> &dyn RulesEngine {
        self.rules.as_ref()
    }

    /// Wake-ups for players parked in matchmaking.
    pub fn notifier(&self) -> &PairingNotifier {
        &self.notifier
    }

    /// Obtain a handle to the current record store, if one is installed.
    pub async fn record_store(&self) -> Option<Arc<dyn RecordStore>> {
        let guard = self.record_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current record store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_record_store(&self) -> Result<Arc<dyn RecordStore>, ServiceError> {
        self.record_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a record store and leave degraded mode.
    pub async fn set_record_store(&self, store: Arc<dyn RecordStore>) {
        {
            let mut guard = self.record_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
