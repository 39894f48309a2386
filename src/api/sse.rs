//! Server-Sent Events support

use crate::runtime::WidgetNotification;
use crate::state_machine::WidgetSnapshot;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Current snapshot first, then every notification
#[must_use = "the stream does nothing until returned as a response"]
pub fn sse_stream(
    initial: WidgetSnapshot,
    broadcast_rx: broadcast::Receiver<WidgetNotification>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok(notification_to_axum(&WidgetNotification::Snapshot(initial)))
    });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(notification) => Some(Ok(notification_to_axum(&notification))),
        // A lagging renderer catches up on the next snapshot
        Err(_) => None,
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn notification_to_axum(notification: &WidgetNotification) -> Event {
    let name = match notification {
        WidgetNotification::Snapshot(_) => "snapshot",
        WidgetNotification::Fault { .. } => "fault",
    };

    match serde_json::to_string(notification) {
        Ok(data) => Event::default().event(name).data(data),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize notification");
            Event::default().event(name).data("{}")
        }
    }
}
