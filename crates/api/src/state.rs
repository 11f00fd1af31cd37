use std::sync::Arc;

use janusd_config::Settings;
use janusd_core::dispatch::Dispatcher;
use janusd_core::media::MemoryMediaEngine;

use crate::ws::storage::WsStorage;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub ws_storage: Arc<WsStorage>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(Box::new(MemoryMediaEngine::new()), settings));
        let ws_storage = Arc::new(WsStorage::new());
        Self {
            dispatcher,
            ws_storage,
        }
    }
}
