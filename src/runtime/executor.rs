//! Widget runtime executor

use super::{Command, WidgetNotification};
use crate::session::{SessionController, SessionId};
use crate::state_machine::{
    transition, Effect, Event, TransitionError, WidgetContext, WidgetModel, WidgetSnapshot,
};
use crate::transport::{QueryTransport, WidgetDataSource};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

pub struct WidgetRuntime {
    context: WidgetContext,
    model: WidgetModel,
    sessions: SessionController,
    command_rx: mpsc::Receiver<Command>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    snapshot_tx: watch::Sender<WidgetSnapshot>,
    broadcast_tx: broadcast::Sender<WidgetNotification>,
}

impl WidgetRuntime {
    #[must_use]
    pub fn new(
        context: WidgetContext,
        model: WidgetModel,
        transport: Arc<dyn QueryTransport>,
        command_rx: mpsc::Receiver<Command>,
        snapshot_tx: watch::Sender<WidgetSnapshot>,
        broadcast_tx: broadcast::Sender<WidgetNotification>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        Self {
            context,
            model,
            sessions: SessionController::new(transport, event_tx.clone()),
            command_rx,
            event_rx,
            event_tx,
            snapshot_tx,
            broadcast_tx,
        }
    }

    /// Run until every [`super::WidgetHandle`] is dropped
    pub async fn run(mut self, widget_source: Option<Arc<dyn WidgetDataSource>>) {
        tracing::info!(state = %self.model.state(), "Starting widget runtime");

        if let Some(source) = widget_source {
            let event_tx = self.event_tx.clone();
            tokio::spawn(async move {
                match source.widget_data().await {
                    Ok(data) => {
                        let _ = event_tx.send(Event::WidgetDataLoaded { data }).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Widget data unavailable");
                    }
                }
            });
        }

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        let event = self.command_event(command);
                        self.process_event(event);
                    }
                    None => break,
                },
                Some(event) = self.event_rx.recv() => self.process_event(event),
            }
        }

        if let Some(handle) = self.sessions.current() {
            handle.cancel();
        }
        tracing::info!("Widget runtime stopped");
    }

    fn command_event(&self, command: Command) -> Event {
        match command {
            Command::OpenComposer => Event::OpenComposer,
            Command::EditQuery(text) => Event::EditQuery { text },
            Command::Submit(query) => Event::Submit {
                query: query.unwrap_or_else(|| self.model.query().to_string()),
                session: SessionId::new(),
                started_at: Utc::now(),
            },
            Command::Dismiss => Event::Dismiss,
            Command::Reset => Event::Reset,
            Command::SetTheme(theme) => Event::SetTheme { theme },
        }
    }

    fn process_event(&mut self, event: Event) {
        let name = event.name();
        let result = match transition(&self.model, event) {
            Ok(result) => result,
            Err(TransitionError::InvalidTransition { state, event }) => {
                tracing::debug!(%state, event, "Ignoring command with no transition");
                return;
            }
        };

        let old_state = self.model.state();
        self.model = result.new_model;
        if old_state != self.model.state() {
            tracing::info!(from = %old_state, to = %self.model.state(), event = name, "Widget state changed");
        }
        if let Err(violation) = self.model.check_invariants() {
            tracing::error!(%violation, event = name, "Widget model invariant violated");
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::StartSession { session, query } => {
                self.sessions.start(session, query);
            }
            Effect::CancelSession { session } => {
                self.sessions.cancel(session);
            }
            Effect::CloseSession { session } => {
                self.sessions.close(session);
            }
            Effect::PublishSnapshot => {
                let snapshot = self.model.snapshot(&self.context);
                self.snapshot_tx.send_replace(snapshot.clone());
                // No subscribers is fine
                let _ = self
                    .broadcast_tx
                    .send(WidgetNotification::Snapshot(snapshot));
            }
            Effect::ReportFault { session, message } => {
                tracing::error!(session_id = %session, error = %message, "Session abandoned after protocol fault");
                let _ = self
                    .broadcast_tx
                    .send(WidgetNotification::Fault { session, message });
            }
        }
    }
}
