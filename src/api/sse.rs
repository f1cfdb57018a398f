//! Server-Sent Events support

use crate::transport::{LiveState, UiEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Initial state, then every UI event as it happens
pub fn sse_stream(
    init: LiveState,
    broadcast_rx: tokio::sync::broadcast::Receiver<UiEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(to_sse("init", &init)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(to_sse(event_name(&event), &event))),
        Err(e) => {
            tracing::debug!(error = %e, "SSE client lagged");
            None
        }
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn event_name(event: &UiEvent) -> &'static str {
    match event {
        UiEvent::Agent { .. } => "agent",
        UiEvent::Error { .. } => "error",
        UiEvent::Complete { .. } => "complete",
        UiEvent::StateChanged(_) => "state_changed",
        UiEvent::SessionsChanged => "sessions_changed",
    }
}

fn to_sse(name: &str, payload: &impl Serialize) -> Event {
    let data = serde_json::to_string(payload).unwrap_or_else(|e| {
        tracing::error!(event = name, error = %e, "Failed to serialize SSE payload");
        "{}".to_string()
    });
    Event::default().event(name).data(data)
}
