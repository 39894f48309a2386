//! Scripted transports and a test harness for the widget runtime
//!
//! These mocks enable integration testing without real I/O.

use super::{spawn, WidgetHandle};
use crate::error::TransportError;
use crate::protocol::TaggedEvent;
use crate::references::CitationKey;
use crate::state_machine::{Theme, WidgetContext, WidgetModel, WidgetSnapshot};
use crate::transport::{EventStream, QueryTransport, WidgetCopy, WidgetData, WidgetDataSource};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

// ============================================================================
// Scripted transport
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Event {
        delay: Option<Duration>,
        event: TaggedEvent,
    },
    Fail(TransportError),
    /// Keep the stream open forever
    Hang,
}

/// What one `open` call produces
#[derive(Debug, Clone, Default)]
pub struct Script {
    open_error: Option<TransportError>,
    steps: Vec<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail before the first event
    pub fn failing(error: TransportError) -> Self {
        Self {
            open_error: Some(error),
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn event(mut self, tag: &str, data: &str) -> Self {
        self.steps.push(Step::Event {
            delay: None,
            event: TaggedEvent::new(tag, data),
        });
        self
    }

    #[must_use]
    pub fn delayed_event(mut self, delay: Duration, tag: &str, data: &str) -> Self {
        self.steps.push(Step::Event {
            delay: Some(delay),
            event: TaggedEvent::new(tag, data),
        });
        self
    }

    /// Fail mid-stream
    #[must_use]
    pub fn fail(mut self, error: TransportError) -> Self {
        self.steps.push(Step::Fail(error));
        self
    }

    #[must_use]
    pub fn hang(mut self) -> Self {
        self.steps.push(Step::Hang);
        self
    }

    fn into_stream(self) -> Result<EventStream, TransportError> {
        if let Some(error) = self.open_error {
            return Err(error);
        }

        let stream = stream::unfold(self.steps.into_iter(), |mut steps| async move {
            match steps.next() {
                None => None,
                Some(Step::Event { delay, event }) => {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    Some((Ok(event), steps))
                }
                Some(Step::Fail(error)) => Some((Err(error), steps)),
                Some(Step::Hang) => {
                    std::future::pending::<()>().await;
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}

/// Transport that plays back scripts. Scripts registered for a query with
/// [`ScriptedTransport::on`] win; otherwise queued scripts are used in order.
#[derive(Default)]
pub struct ScriptedTransport {
    queued: Mutex<VecDeque<Script>>,
    by_query: Mutex<HashMap<String, Script>>,
    /// Record of all queries opened
    queries: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_script(self, script: Script) -> Self {
        self.queued.lock().unwrap().push_back(script);
        self
    }

    #[must_use]
    pub fn on(self, query: &str, script: Script) -> Self {
        self.by_query
            .lock()
            .unwrap()
            .insert(query.to_string(), script);
        self
    }

    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryTransport for ScriptedTransport {
    async fn open(&self, query: &str) -> Result<EventStream, TransportError> {
        self.queries.lock().unwrap().push(query.to_string());

        let script = self
            .by_query
            .lock()
            .unwrap()
            .remove(query)
            .or_else(|| self.queued.lock().unwrap().pop_front());

        match script {
            Some(script) => script.into_stream(),
            None => Err(TransportError::network("No scripted response queued")),
        }
    }
}

/// Widget data served immediately
pub struct StaticWidgetData(pub WidgetData);

#[async_trait]
impl WidgetDataSource for StaticWidgetData {
    async fn widget_data(&self) -> Result<WidgetData, TransportError> {
        Ok(self.0.clone())
    }
}

pub fn sample_widget_data() -> WidgetData {
    WidgetData {
        id: "proj_test".to_string(),
        image_url: "https://example.test/avatar.png".to_string(),
        copy: WidgetCopy {
            title: "Need help?".to_string(),
            subtitle: "Ask the docs".to_string(),
            cta: "Ask a question".to_string(),
            placeholder: "How do I...".to_string(),
            loading: "Thinking...".to_string(),
        },
    }
}

// ============================================================================
// Test widget builder
// ============================================================================

pub struct TestWidget {
    pub handle: WidgetHandle,
    pub transport: Arc<ScriptedTransport>,
}

pub struct TestWidgetBuilder {
    transport: ScriptedTransport,
    citation_key: CitationKey,
    theme: Theme,
    widget_data: Option<WidgetData>,
}

impl TestWidgetBuilder {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self {
            transport,
            citation_key: CitationKey::Path,
            theme: Theme::Dark,
            widget_data: None,
        }
    }

    #[must_use]
    pub fn citation_key(mut self, key: CitationKey) -> Self {
        self.citation_key = key;
        self
    }

    #[must_use]
    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    #[must_use]
    pub fn widget_data(mut self, data: WidgetData) -> Self {
        self.widget_data = Some(data);
        self
    }

    pub fn build(self) -> TestWidget {
        let transport = Arc::new(self.transport);
        let source = self
            .widget_data
            .map(|data| Arc::new(StaticWidgetData(data)) as Arc<dyn WidgetDataSource>);

        let handle = spawn(
            WidgetContext::new(self.citation_key),
            self.theme,
            transport.clone(),
            source,
        );

        TestWidget { handle, transport }
    }
}

impl TestWidget {
    pub fn new(transport: ScriptedTransport) -> Self {
        TestWidgetBuilder::new(transport).build()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for(&self, predicate: impl FnMut(&WidgetSnapshot) -> bool) -> WidgetSnapshot {
        let mut rx = self.handle.watch();
        let waited = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate)).await;
        match waited {
            Ok(Ok(snapshot)) => snapshot.clone(),
            Ok(Err(_)) => panic!("widget runtime stopped"),
            Err(_) => panic!("timed out; last snapshot: {:?}", self.handle.snapshot()),
        }
    }

    pub async fn wait_for_state(&self, state: crate::state_machine::WidgetState) -> WidgetSnapshot {
        self.wait_for(|s| s.state == state).await
    }

    /// Open the composer, type `query`, and submit it
    pub async fn ask(&self, query: &str) {
        self.handle.open_composer().await.unwrap();
        self.handle.edit_query(query).await.unwrap();
        self.handle.submit(None).await.unwrap();
    }
}

/// A handle whose runtime has already stopped: every command fails
pub fn stopped_handle() -> WidgetHandle {
    let context = WidgetContext::new(CitationKey::Path);
    let (commands, _) = mpsc::channel(1);
    let (_, snapshots) = watch::channel(WidgetModel::new(Theme::Dark).snapshot(&context));
    let (notifications, _) = broadcast::channel(1);
    WidgetHandle {
        commands,
        snapshots,
        notifications,
    }
}

// ============================================================================
// Integration tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::ERROR_MESSAGE;
    use crate::runtime::WidgetNotification;
    use crate::session::SessionStatus;
    use crate::state_machine::WidgetState;

    const REFERENCES: &str = r#"[
        {"path": "/a", "text": "", "page": "Alpha"},
        {"path": "/b", "text": "", "page": "Beta"},
        {"path": "/c", "text": "", "page": "Gamma"}
    ]"#;

    #[tokio::test]
    async fn test_streamed_answer_falls_back_to_first_reference() {
        let widget = TestWidget::new(ScriptedTransport::new().with_script(
            Script::new()
                .event("references", REFERENCES)
                .event("partial_answer", "Hello\\")
                .event("partial_answer", "nworld"),
        ));

        widget.ask("how?").await;
        let done = widget.wait_for_state(WidgetState::Finished).await;

        assert_eq!(done.answer.text, "Hello\nworld");
        assert_eq!(done.query, "");
        assert_eq!(done.citations.len(), 1);
        assert_eq!(done.citations[0].path, "/a");
        assert_eq!(done.session.unwrap().status, SessionStatus::Completed);
        assert_eq!(widget.transport.recorded_queries(), vec!["how?".to_string()]);
    }

    #[tokio::test]
    async fn test_answer_event_cites_in_order() {
        let widget = TestWidget::new(ScriptedTransport::new().with_script(
            Script::new()
                .event("references", REFERENCES)
                .event("partial_answer", "draft")
                .event("answer", r#"{"answer": "Final", "sources": ["/c", "/missing", "/a"]}"#)
                .hang(),
        ));

        widget.ask("q").await;
        let done = widget.wait_for_state(WidgetState::Finished).await;

        assert_eq!(done.answer.text, "Final");
        let paths: Vec<_> = done.citations.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/c", "/a"]);
    }

    #[tokio::test]
    async fn test_page_citation_key() {
        let widget = TestWidgetBuilder::new(ScriptedTransport::new().with_script(
            Script::new()
                .event("references", REFERENCES)
                .event("answer", r#"{"answer": "x", "sources": ["Beta"]}"#),
        ))
        .citation_key(CitationKey::Page)
        .build();

        widget.ask("q").await;
        let done = widget.wait_for_state(WidgetState::Finished).await;
        assert_eq!(done.citations[0].path, "/b");
    }

    #[tokio::test]
    async fn test_single_json_reply_with_source_objects() {
        let widget = TestWidget::new(ScriptedTransport::new().with_script(Script::new().event(
            "answer",
            r#"{"answer": "Use the CLI", "sources": [{"page": "Install", "path": "/install", "title": "Installing"}, ""]}"#,
        )));

        widget.ask("install?").await;
        let done = widget.wait_for_state(WidgetState::Finished).await;

        assert_eq!(done.answer.text, "Use the CLI");
        assert_eq!(done.citations.len(), 1);
        assert_eq!(done.citations[0].display_title(), "Installing");
    }

    #[tokio::test]
    async fn test_null_source_entries_are_dropped() {
        let widget = TestWidget::new(ScriptedTransport::new().with_script(
            Script::new()
                .event("references", REFERENCES)
                .event("answer", r#"{"answer":"Use the CLI","sources":[null,"/a"]}"#),
        ));

        widget.ask("q").await;
        let done = widget.wait_for_state(WidgetState::Finished).await;

        assert_eq!(done.answer.text, "Use the CLI");
        assert_eq!(done.citations.len(), 1);
        assert_eq!(done.citations[0].path, "/a");
        assert_eq!(done.session.unwrap().status, SessionStatus::Completed);
        assert!(done.last_fault.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_shows_error() {
        let widget = TestWidget::new(
            ScriptedTransport::new().with_script(Script::failing(TransportError::network("refused"))),
        );

        widget.ask("q").await;
        let done = widget.wait_for_state(WidgetState::Finished).await;

        assert_eq!(done.answer.text, ERROR_MESSAGE);
        assert!(done.citations.is_empty());
        assert_eq!(done.session.unwrap().status, SessionStatus::Errored);
        assert!(done.last_fault.is_none());
    }

    #[tokio::test]
    async fn test_error_event_discards_partial_text() {
        let widget = TestWidget::new(ScriptedTransport::new().with_script(
            Script::new()
                .event("references", REFERENCES)
                .event("partial_answer", "half an ans")
                .event("error", "model overloaded"),
        ));

        widget.ask("q").await;
        let done = widget.wait_for_state(WidgetState::Finished).await;

        assert_eq!(done.answer.text, ERROR_MESSAGE);
        assert!(done.citations.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tag_reports_fault() {
        let widget = TestWidget::new(ScriptedTransport::new().with_script(
            Script::new()
                .event("partial_answer", "a")
                .event("telemetry", "{}")
                .event("partial_answer", "never applied"),
        ));
        let mut notifications = widget.handle.subscribe();

        widget.ask("q").await;
        let done = widget.wait_for_state(WidgetState::Finished).await;

        assert_eq!(done.answer.text, ERROR_MESSAGE);
        assert_eq!(done.session.unwrap().status, SessionStatus::Errored);
        assert!(done.last_fault.unwrap().contains("telemetry"));

        let fault = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Ok(WidgetNotification::Fault { message, .. }) = notifications.recv().await {
                    return message;
                }
            }
        })
        .await
        .unwrap();
        assert!(fault.contains("telemetry"));
    }

    #[tokio::test]
    async fn test_reset_then_new_query_ignores_old_session() {
        let widget = TestWidget::new(
            ScriptedTransport::new()
                .on(
                    "old",
                    Script::new()
                        .delayed_event(Duration::from_millis(100), "partial_answer", "stale")
                        .delayed_event(Duration::from_millis(10), "answer", r#"{"answer": "stale"}"#),
                )
                .on("new", Script::new().event("partial_answer", "fresh")),
        );

        widget.ask("old").await;
        widget.wait_for_state(WidgetState::Loading).await;
        widget.handle.reset().await.unwrap();
        widget.ask("new").await;

        let done = widget.wait_for_state(WidgetState::Finished).await;
        assert_eq!(done.answer.text, "fresh");

        tokio::time::sleep(Duration::from_millis(250)).await;
        let later = widget.handle.snapshot();
        assert_eq!(later.answer.text, "fresh");
        assert_eq!(later.state, WidgetState::Finished);
    }

    #[tokio::test]
    async fn test_reset_while_loading_cancels() {
        let widget = TestWidget::new(ScriptedTransport::new().on("q", Script::new().hang()));

        widget.ask("q").await;
        widget.wait_for_state(WidgetState::Loading).await;
        widget.handle.reset().await.unwrap();

        let splash = widget.wait_for_state(WidgetState::Splash).await;
        assert_eq!(splash.query, "");
        assert!(splash.answer.text.is_empty());
        assert!(splash.citations.is_empty());
        assert_eq!(splash.session.unwrap().status, SessionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_empty_submit_is_ignored() {
        let widget = TestWidget::new(ScriptedTransport::new());

        widget.handle.open_composer().await.unwrap();
        widget.handle.submit(None).await.unwrap();
        widget.handle.edit_query("after").await.unwrap();

        let typing = widget.wait_for(|s| s.query == "after").await;
        assert_eq!(typing.state, WidgetState::UserTyping);
        assert!(typing.session.is_none());
        assert!(widget.transport.recorded_queries().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_command_leaves_state() {
        let widget = TestWidget::new(ScriptedTransport::new());

        widget.handle.dismiss().await.unwrap();
        widget.handle.open_composer().await.unwrap();

        let typing = widget.wait_for_state(WidgetState::UserTyping).await;
        assert_eq!(typing.query, "");
    }

    #[tokio::test]
    async fn test_dismiss_after_answer_returns_to_splash() {
        let widget = TestWidget::new(
            ScriptedTransport::new().with_script(Script::new().event("partial_answer", "done")),
        );

        widget.ask("q").await;
        widget.wait_for_state(WidgetState::Finished).await;
        widget.handle.dismiss().await.unwrap();

        let splash = widget.wait_for_state(WidgetState::Splash).await;
        assert!(splash.answer.text.is_empty());
        assert!(splash.streamed_text.is_empty());
    }

    #[tokio::test]
    async fn test_stopped_runtime_refuses_commands() {
        let handle = stopped_handle();
        assert!(matches!(
            handle.open_composer().await,
            Err(crate::error::RuntimeStopped)
        ));
        assert_eq!(handle.snapshot().state, WidgetState::Splash);
    }

    #[tokio::test]
    async fn test_widget_data_and_theme() {
        let widget = TestWidgetBuilder::new(ScriptedTransport::new())
            .theme(Theme::Light)
            .widget_data(sample_widget_data())
            .build();

        let loaded = widget.wait_for(|s| s.widget.is_some()).await;
        assert_eq!(loaded.theme, Theme::Light);
        assert_eq!(loaded.widget.unwrap().copy.cta, "Ask a question");

        widget.handle.set_theme(Theme::Dark).await.unwrap();
        let dark = widget.wait_for(|s| s.theme == Theme::Dark).await;
        assert_eq!(dark.state, WidgetState::Splash);
    }

    #[tokio::test]
    async fn test_explicit_submit_query() {
        let widget = TestWidget::new(
            ScriptedTransport::new().on("typed elsewhere", Script::new().event("partial_answer", "ok")),
        );

        widget.handle.open_composer().await.unwrap();
        widget.handle.submit(Some("typed elsewhere".to_string())).await.unwrap();

        let done = widget.wait_for_state(WidgetState::Finished).await;
        assert_eq!(done.answer.text, "ok");
    }
}
