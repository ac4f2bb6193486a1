use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::QueueGauge;
use crate::services::store::Store;

/// Shared state of the query surface. Read-only access to the store, plus a
/// view of the live pipeline queue when one is running.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
    pub queue: Option<QueueGauge>,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
            queue: None,
        }
    }

    #[must_use]
    pub fn with_queue(mut self, gauge: QueueGauge) -> Self {
        self.queue = Some(gauge);
        self
    }
}
