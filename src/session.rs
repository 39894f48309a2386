//! Stream session controller
//!
//! Owns the lifecycle of one in-flight query: opens the stream, classifies
//! each event, and delivers the results to the runtime's event loop. At most
//! one session is open; starting another cancels the previous one first.

#![allow(clippy::module_name_repetitions)] // Session types read as one family

use crate::error::SessionError;
use crate::protocol::{demultiplex, StreamEvent, TaggedEvent};
use crate::state_machine::{Event, SessionUpdate};
use crate::transport::QueryTransport;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Opaque session identifier, used to correlate deliveries and cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Completed,
    Errored,
    Cancelled,
}

/// The state machine's record of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn open(id: SessionId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SessionStatus::Open,
            started_at,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }
}

/// Handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    cancel: CancellationToken,
}

impl SessionHandle {
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Abort the transport. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Starts and cancels stream sessions, delivering their events as
/// [`Event::Session`] on the runtime's event channel.
pub struct SessionController {
    transport: Arc<dyn QueryTransport>,
    events: mpsc::Sender<Event>,
    current: Option<SessionHandle>,
}

impl SessionController {
    #[must_use]
    pub fn new(transport: Arc<dyn QueryTransport>, events: mpsc::Sender<Event>) -> Self {
        Self {
            transport,
            events,
            current: None,
        }
    }

    /// Start a session, cancelling any session still open. Never fails.
    pub fn start(&mut self, id: SessionId, query: impl Into<String>) -> SessionHandle {
        if let Some(previous) = self.current.take() {
            tracing::info!(
                session_id = %previous.id,
                superseded_by = %id,
                "Cancelling superseded session"
            );
            previous.cancel();
        }
        self.spawn(id, query.into())
    }

    /// Start a session only if none is open
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyOpen`] while another session is still running.
    pub fn try_start(
        &mut self,
        id: SessionId,
        query: impl Into<String>,
    ) -> Result<SessionHandle, SessionError> {
        if self.current.as_ref().is_some_and(|h| !h.is_cancelled()) {
            return Err(SessionError::AlreadyOpen);
        }
        Ok(self.spawn(id, query.into()))
    }

    /// Cancel a session. Safe to call repeatedly, for unknown sessions, and
    /// for sessions that already completed. Returns whether it was open.
    pub fn cancel(&mut self, id: SessionId) -> bool {
        match self.current.take() {
            Some(handle) if handle.id == id => {
                handle.cancel();
                tracing::info!(session_id = %id, "Session cancelled");
                true
            }
            other => {
                self.current = other;
                false
            }
        }
    }

    /// Forget a session that delivered its terminal event
    pub fn close(&mut self, id: SessionId) {
        if self.current.as_ref().is_some_and(|h| h.id == id) {
            if let Some(handle) = self.current.take() {
                // The task has already stopped reading; this just releases it
                handle.cancel();
            }
            tracing::debug!(session_id = %id, "Session closed");
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&SessionHandle> {
        self.current.as_ref()
    }

    fn spawn(&mut self, id: SessionId, query: String) -> SessionHandle {
        let handle = SessionHandle {
            id,
            cancel: CancellationToken::new(),
        };

        tokio::spawn(run_session(
            id,
            query,
            self.transport.clone(),
            self.events.clone(),
            handle.cancel.clone(),
        ));

        self.current = Some(handle.clone());
        handle
    }
}

/// Drive one session's stream until a terminal event, stream end, or
/// cancellation. After cancellation nothing more is delivered, even events
/// that were already buffered.
async fn run_session(
    id: SessionId,
    query: String,
    transport: Arc<dyn QueryTransport>,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
) {
    tracing::info!(session_id = %id, "Opening stream session");

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        opened = transport.open(&query) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "Transport failed before first event");
            deliver(&events, &cancel, id, classify(id, TaggedEvent::error(e.message))).await;
            return;
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            next = stream.next() => next,
        };

        let update = match next {
            Some(Ok(tagged)) => classify(id, tagged),
            Some(Err(e)) => {
                tracing::warn!(session_id = %id, error = %e, "Transport failed mid-stream");
                classify(id, TaggedEvent::error(e.message))
            }
            None => {
                tracing::info!(session_id = %id, "Stream session completed");
                deliver(&events, &cancel, id, SessionUpdate::Ended).await;
                return;
            }
        };

        let finished_answer = matches!(update, SessionUpdate::Stream(StreamEvent::Answer(_)));
        let terminal = match &update {
            SessionUpdate::Stream(event) => event.is_terminal(),
            SessionUpdate::Ended | SessionUpdate::Fault(_) => true,
        };

        if !deliver(&events, &cancel, id, update).await {
            return;
        }

        if terminal {
            if finished_answer {
                tracing::info!(session_id = %id, "Stream session completed with full answer");
                deliver(&events, &cancel, id, SessionUpdate::Ended).await;
            }
            return;
        }
    }
}

fn classify(id: SessionId, tagged: TaggedEvent) -> SessionUpdate {
    match demultiplex(tagged) {
        Ok(event) => {
            if let StreamEvent::Error(message) = &event {
                tracing::warn!(session_id = %id, error = %message, "Stream reported an error");
            }
            SessionUpdate::Stream(event)
        }
        Err(e) => {
            tracing::error!(session_id = %id, error = %e, "Protocol fault, abandoning session");
            SessionUpdate::Fault(e.to_string())
        }
    }
}

/// Returns `false` once the session is cancelled or the runtime is gone
async fn deliver(
    events: &mpsc::Sender<Event>,
    cancel: &CancellationToken,
    session: SessionId,
    update: SessionUpdate,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = events.send(Event::Session { session, update }) => sent.is_ok(),
    }
}
