//! Events that drive the widget

use super::state::Theme;
use crate::protocol::StreamEvent;
use crate::session::SessionId;
use crate::transport::WidgetData;
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Renderer commands
    OpenComposer,
    EditQuery {
        text: String,
    },
    Submit {
        query: String,
        /// Fresh id for the session this submit would start
        session: SessionId,
        started_at: DateTime<Utc>,
    },
    Dismiss,
    Reset,
    SetTheme {
        theme: Theme,
    },

    // Stream session deliveries
    Session {
        session: SessionId,
        update: SessionUpdate,
    },

    // Widget configuration fetch
    WidgetDataLoaded {
        data: WidgetData,
    },
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Event::OpenComposer => "open_composer",
            Event::EditQuery { .. } => "edit_query",
            Event::Submit { .. } => "submit",
            Event::Dismiss => "dismiss",
            Event::Reset => "reset",
            Event::SetTheme { .. } => "set_theme",
            Event::Session { .. } => "session",
            Event::WidgetDataLoaded { .. } => "widget_data_loaded",
        }
    }
}

/// What a stream session delivers to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A classified stream event
    Stream(StreamEvent),
    /// The stream finished without error
    Ended,
    /// Protocol drift; the session is dead
    Fault(String),
}
