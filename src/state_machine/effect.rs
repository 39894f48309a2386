//! Effects produced by state transitions

use crate::session::SessionId;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a stream for the query
    StartSession { session: SessionId, query: String },

    /// Abort the stream and drop anything it still delivers
    CancelSession { session: SessionId },

    /// Release a session that reached its terminal event
    CloseSession { session: SessionId },

    /// Push the current snapshot to subscribers
    PublishSnapshot,

    /// Surface a protocol fault to subscribers
    ReportFault { session: SessionId, message: String },
}

impl Effect {
    #[must_use]
    pub fn start_session(session: SessionId, query: impl Into<String>) -> Self {
        Effect::StartSession {
            session,
            query: query.into(),
        }
    }

    #[must_use]
    pub fn report_fault(session: SessionId, message: impl Into<String>) -> Self {
        Effect::ReportFault {
            session,
            message: message.into(),
        }
    }
}
