//! HTTP API over the runtime transport

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::SessionStore;
use crate::project::FolderPicker;
use crate::settings::SettingsStore;
use crate::transport::TransportHandle;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub transport: TransportHandle,
    pub sessions: SessionStore,
    pub settings: SettingsStore,
    pub folders: Arc<dyn FolderPicker>,
}
