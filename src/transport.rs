//! Answer service transport
//!
//! [`QueryTransport`] opens one event stream per query. The HTTP
//! implementation accepts either a Server-Sent Events response or a single
//! JSON answer body, which it surfaces as one `answer` event.

use crate::answer::ERROR_MESSAGE;
use crate::config::WidgetConfig;
use crate::error::TransportError;
use crate::protocol::{SseDecoder, TaggedEvent, TAG_ANSWER};
use crate::references::Reference;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Ordered tagged events for one query
pub type EventStream = BoxStream<'static, Result<TaggedEvent, TransportError>>;

#[allow(clippy::module_name_repetitions)] // Named for the role it plays in a session
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Send `query` and return its event stream.
    ///
    /// # Errors
    ///
    /// Failures before the first event (connection, non-success status) are
    /// returned here; failures mid-stream are yielded as stream items.
    async fn open(&self, query: &str) -> Result<EventStream, TransportError>;
}

#[async_trait]
pub trait WidgetDataSource: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the widget endpoint cannot be read.
    async fn widget_data(&self) -> Result<WidgetData, TransportError>;
}

/// Keyword search over the project's pages
#[async_trait]
pub trait ReferenceSearch: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the search endpoint fails.
    async fn search(&self, query: &str) -> Result<Vec<Reference>, TransportError>;
}

/// Display copy and project identity served by the widget endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetData {
    pub id: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub copy: WidgetCopy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetCopy {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub cta: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub loading: String,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

#[allow(clippy::module_name_repetitions)] // Distinct from the scripted test transport
pub struct HttpTransport {
    client: Client,
    api_base: String,
    project_id: Option<String>,
    widget: OnceCell<WidgetData>,
}

impl HttpTransport {
    #[must_use]
    pub fn new(config: &WidgetConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            widget: OnceCell::new(),
        }
    }

    /// Configured project, else the id served with the widget data
    async fn project_id(&self) -> Result<String, TransportError> {
        if let Some(id) = &self.project_id {
            return Ok(id.clone());
        }
        Ok(self.widget_data().await?.id)
    }
}

#[async_trait]
impl WidgetDataSource for HttpTransport {
    async fn widget_data(&self) -> Result<WidgetData, TransportError> {
        let data = self
            .widget
            .get_or_try_init(|| async {
                let url = format!("{}/widget", self.api_base);
                tracing::debug!(%url, "Fetching widget data");
                let response = self.client.get(&url).send().await?.error_for_status()?;
                let data = response.json::<WidgetData>().await?;
                Ok::<_, TransportError>(data)
            })
            .await?;
        Ok(data.clone())
    }
}

#[async_trait]
impl ReferenceSearch for HttpTransport {
    async fn search(&self, query: &str) -> Result<Vec<Reference>, TransportError> {
        let url = format!("{}/widget/search", self.api_base);
        let response = self
            .client
            .post(&url)
            .json(&QueryBody { query })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "Search request rejected");
            return Err(TransportError::status(status.as_u16(), ERROR_MESSAGE));
        }

        response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Search response did not parse");
            TransportError::decode(ERROR_MESSAGE)
        })
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn open(&self, query: &str) -> Result<EventStream, TransportError> {
        let project = self.project_id().await?;
        let url = format!("{}/{}/ask", self.api_base, project);

        let response = self
            .client
            .post(&url)
            .json(&QueryBody { query })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::status(
                status.as_u16(),
                format!("HTTP {status}: {body}"),
            ));
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if is_event_stream {
            tracing::debug!(%url, "Streaming answer");
            return Ok(sse_events(response.bytes_stream()));
        }

        // Single-response servers return the whole answer as JSON
        let body = response.text().await?;
        let event = TaggedEvent::new(TAG_ANSWER, body);
        Ok(stream::iter([Ok(event)]).boxed())
    }
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<TaggedEvent>,
    done: bool,
}

/// Decode a raw byte stream into tagged events
pub fn sse_events<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TransportError> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(chunk.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.done = true;
                    state.pending.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
