//! HTTP bridge for widget renderers
//!
//! Renderers send commands as small JSON posts and follow the widget through
//! an SSE stream of snapshots.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::runtime::WidgetHandle;
use crate::transport::ReferenceSearch;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub widget: WidgetHandle,
    pub search: Arc<dyn ReferenceSearch>,
}

impl AppState {
    #[must_use]
    pub fn new(widget: WidgetHandle, search: Arc<dyn ReferenceSearch>) -> Self {
        Self { widget, search }
    }
}
