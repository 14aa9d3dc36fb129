//! HTTP surface of the relay host
//!
//! Frames come in over POST or a WebSocket; observers read the session view
//! or follow it over Server-Sent Events.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::config::RelayConfig;
use crate::runtime::RelayManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayManager>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            relay: Arc::new(RelayManager::new(config)),
        }
    }
}
