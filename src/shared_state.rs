use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::FromRef;
use chrono::Utc;

use crate::models::forecast::{Forecast, ForecastSnapshot};
use crate::models::site::SiteModel;

/// Single swap point for the served forecast.
///
/// Readers clone the inner `Arc` and drop the lock right away; a refresh
/// builds the whole snapshot first and only then publishes it.
#[derive(Clone, Debug, Default)]
pub struct ForecastStore {
    current: Arc<RwLock<Option<Arc<ForecastSnapshot>>>>,
    version: Arc<AtomicU64>,
}

impl ForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published snapshot, `None` until the first refresh succeeds.
    pub fn current(&self) -> Option<Arc<ForecastSnapshot>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Wraps `forecast` into the next version and swaps it in.
    pub fn publish(&self, forecast: Forecast) -> Arc<ForecastSnapshot> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(ForecastSnapshot { version, built_at: Utc::now(), forecast });
        *current = Some(Arc::clone(&snapshot));
        snapshot
    }
}

#[derive(Clone, Debug)]
pub struct AppState {
    pub store: ForecastStore,
    pub offline: bool,
}

/// Router state; handlers pick the part they need through `FromRef`.
#[derive(Clone, Debug)]
pub struct SharedState {
    pub app: AppState,
    pub sites: Arc<Vec<SiteModel>>,
}

impl FromRef<SharedState> for AppState {
    fn from_ref(state: &SharedState) -> Self {
        state.app.clone()
    }
}

impl FromRef<SharedState> for Arc<Vec<SiteModel>> {
    fn from_ref(state: &SharedState) -> Self {
        Arc::clone(&state.sites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = ForecastStore::new();
        assert!(store.current().is_none());
    }

    #[test]
    fn test_publish_bumps_version() {
        let store = ForecastStore::new();
        let first = store.publish(Forecast::default());
        let second = store.publish(Forecast::default());
        assert_eq!((first.version, second.version), (1, 2));
        assert_eq!(store.current().map(|s| s.version), Some(2));
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let store = ForecastStore::new();
        store.publish(Forecast::default());
        let held = store.current().unwrap();
        store.publish(Forecast::default());
        assert_eq!(held.version, 1);
        assert_eq!(store.current().unwrap().version, 2);
    }

    #[test]
    fn test_clones_share_the_slot() {
        let store = ForecastStore::new();
        let reader = store.clone();
        store.publish(Forecast::default());
        assert_eq!(reader.current().map(|s| s.version), Some(1));
    }
}
