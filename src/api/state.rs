use std::sync::Arc;
use std::time::Instant;

use crate::store::DataStore;
use crate::updater::UpdateLog;

pub struct AppState {
    pub store: Arc<DataStore>,
    pub update_log: Arc<UpdateLog>,
    pub api_token: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<DataStore>,
        update_log: Arc<UpdateLog>,
        api_token: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            update_log,
            api_token,
            started_at: Instant::now(),
        })
    }
}
