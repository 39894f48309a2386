//! Widget runtime
//!
//! One task owns the [`WidgetModel`]. Renderer commands and session
//! deliveries are applied through [`crate::state_machine::transition`] one
//! at a time; renderers observe the result through [`WidgetHandle`].

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::WidgetRuntime;

use crate::error::RuntimeStopped;
use crate::session::SessionId;
use crate::state_machine::{Theme, WidgetContext, WidgetModel, WidgetSnapshot};
use crate::transport::{QueryTransport, WidgetDataSource};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Renderer commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    OpenComposer,
    EditQuery(String),
    /// Submit the given query, or the composer's current text when `None`
    Submit(Option<String>),
    Dismiss,
    Reset,
    SetTheme(Theme),
}

/// Pushed to every subscriber
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetNotification {
    Snapshot(WidgetSnapshot),
    Fault { session: SessionId, message: String },
}

/// Renderer-facing handle to a running widget. Cheap to clone.
#[derive(Clone)]
pub struct WidgetHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<WidgetSnapshot>,
    notifications: broadcast::Sender<WidgetNotification>,
}

#[allow(clippy::missing_errors_doc)] // Commands only fail with RuntimeStopped
impl WidgetHandle {
    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> WidgetSnapshot {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetNotification> {
        self.notifications.subscribe()
    }

    /// Snapshot channel, for waiting on a particular state
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<WidgetSnapshot> {
        self.snapshots.clone()
    }

    pub async fn send(&self, command: Command) -> Result<(), RuntimeStopped> {
        self.commands.send(command).await.map_err(|_| RuntimeStopped)
    }

    pub async fn open_composer(&self) -> Result<(), RuntimeStopped> {
        self.send(Command::OpenComposer).await
    }

    pub async fn edit_query(&self, text: impl Into<String>) -> Result<(), RuntimeStopped> {
        self.send(Command::EditQuery(text.into())).await
    }

    pub async fn submit(&self, query: Option<String>) -> Result<(), RuntimeStopped> {
        self.send(Command::Submit(query)).await
    }

    pub async fn dismiss(&self) -> Result<(), RuntimeStopped> {
        self.send(Command::Dismiss).await
    }

    pub async fn reset(&self) -> Result<(), RuntimeStopped> {
        self.send(Command::Reset).await
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), RuntimeStopped> {
        self.send(Command::SetTheme(theme)).await
    }
}

/// Start a widget runtime on the current tokio runtime.
///
/// The widget data fetch, when a source is given, runs in the background and
/// never blocks commands.
#[must_use]
pub fn spawn(
    context: WidgetContext,
    theme: Theme,
    transport: Arc<dyn QueryTransport>,
    widget_source: Option<Arc<dyn WidgetDataSource>>,
) -> WidgetHandle {
    let model = WidgetModel::new(theme);
    let (command_tx, command_rx) = mpsc::channel(32);
    let (snapshot_tx, snapshot_rx) = watch::channel(model.snapshot(&context));
    let (notification_tx, _) = broadcast::channel(128);

    let runtime = WidgetRuntime::new(
        context,
        model,
        transport,
        command_rx,
        snapshot_tx,
        notification_tx.clone(),
    );

    tokio::spawn(runtime.run(widget_source));

    WidgetHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        notifications: notification_tx,
    }
}
