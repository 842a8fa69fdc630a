//! The SSE event stream.
//!
//! `GET /jobs/{id}/events` attaches the single stream consumer of a run:
//! a `hello` event immediately, then every queued event in order, a
//! synthetic `heartbeat` whenever the channel stays idle for the full
//! idle window, and stream termination after an `end` or `error` is
//! forwarded.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::Stream;

use pyrowatch_core::types::JobId;
use pyrowatch_events::channel::{EventReceiver, RecvOutcome};
use pyrowatch_events::event::StreamEvent;

use crate::error::AppResult;
use crate::state::AppState;

/// Idle window with no real event before a heartbeat is emitted.
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new().route("/jobs/{id}/events", get(job_events))
}

/// GET /jobs/{id}/events -- subscribe to a run's event stream.
async fn job_events(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let receiver = state.registry.take_receiver(job_id).await?;
    tracing::info!(%job_id, "Event stream attached");
    Ok(Sse::new(event_stream(job_id, receiver)))
}

/// Phase of the subscriber stream.
enum Phase {
    /// Greet, then start draining.
    Greeting(EventReceiver),
    /// Forward events until a terminal one (or channel closure).
    Draining(EventReceiver),
    Finished,
}

fn event_stream(
    job_id: JobId,
    receiver: EventReceiver,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(Phase::Greeting(receiver), move |phase| async move {
        match phase {
            Phase::Greeting(rx) => Some((
                sse_event(&StreamEvent::Hello { job_id }),
                Phase::Draining(rx),
            )),
            Phase::Draining(mut rx) => match rx.recv_idle(STREAM_IDLE_TIMEOUT).await {
                RecvOutcome::Event(event) => {
                    let next = if event.is_terminal() {
                        Phase::Finished
                    } else {
                        Phase::Draining(rx)
                    };
                    Some((sse_event(&event), next))
                }
                RecvOutcome::Idle => Some((
                    sse_event(&StreamEvent::Heartbeat { job_id }),
                    Phase::Draining(rx),
                )),
                RecvOutcome::Closed => {
                    // Producer gone without a terminal event: the run was
                    // superseded by a restart. Close the transport.
                    tracing::debug!(%job_id, "Event channel closed, ending stream");
                    None
                }
            },
            Phase::Finished => None,
        }
    })
}

fn sse_event(event: &StreamEvent) -> Result<Event, Infallible> {
    let sse = Event::default().json_data(event).unwrap_or_else(|e| {
        // StreamEvent serialization cannot fail; keep the transport alive
        // if it somehow does.
        tracing::error!(error = %e, "Failed to serialize stream event");
        Event::default().data("{}")
    });
    Ok(sse)
}
