//! Server-Sent Events (SSE) endpoint for real-time notifications.
//!
//! Endpoint: GET /events
//!
//! # Example
//!
//! ```text
//! event: notification
//! data: {"type":"notification","message_type":"success","message":"Entry created","link_url":"/entries/docker","link_label":"View"}
//!
//! event: linked
//! data: {"type":"linked","slug":"docker","entries_updated":3,"links_added":5,"timestamp":"..."}
//!
//! event: heartbeat
//! data: {"type":"heartbeat","timestamp":"2024-01-01T00:00:00Z"}
//! ```

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use chrono::Utc;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;

use crate::events::{CatchupEvent, HEARTBEAT_INTERVAL_SECS, HeartbeatEvent, LexiconEvent};
use crate::state::AppState;

// ============================================================================
// SSE Endpoint
// ============================================================================

/// SSE `event:` name for an event.
fn event_name(event: &LexiconEvent) -> &'static str {
    match event {
        LexiconEvent::Notification(_) => "notification",
        LexiconEvent::Linked(_) => "linked",
        LexiconEvent::Heartbeat(_) => "heartbeat",
        LexiconEvent::Catchup(_) => "catchup",
    }
}

/// Serializes an event into an SSE frame.
fn to_sse(event: &LexiconEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => Some(Event::default().event(event_name(event)).data(data)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize event");
            None
        }
    }
}

/// GET /events - Subscribe to real-time events.
///
/// Heartbeats are sent every 30 seconds to keep the connection alive.
///
/// # Backpressure
///
/// If a client falls behind (channel buffer overflows), a `catchup` event is
/// sent indicating how many events were missed.
async fn subscribe_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.broadcaster().subscribe();

    tracing::info!(
        subscribers = state.broadcaster().subscriber_count(),
        "Client subscribed to SSE events"
    );

    let stream = stream::unfold(receiver, |mut rx| async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(count)) => {
                    tracing::warn!(events_missed = count, "SSE client lagged, sending catchup event");
                    LexiconEvent::Catchup(CatchupEvent {
                        events_missed: count,
                        timestamp: Utc::now(),
                    })
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Event channel closed, ending SSE stream");
                    return None;
                }
            };

            if let Some(frame) = to_sse(&event) {
                return Some((Ok(frame), rx));
            }
        }
    });

    let heartbeat = LexiconEvent::Heartbeat(HeartbeatEvent {
        timestamp: Utc::now(),
    });
    let mut keep_alive = KeepAlive::new().interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    if let Some(frame) = to_sse(&heartbeat) {
        keep_alive = keep_alive.event(frame);
    }

    Sse::new(stream).keep_alive(keep_alive)
}

/// Build SSE event routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", get(subscribe_events))
}

// ============================================================================
// Tests
// ============================================================================
