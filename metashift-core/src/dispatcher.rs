use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::pipeline::{RequestHandler, RequestOutcome, GUIDANCE_MESSAGE};
use crate::request::InboundRequest;
use crate::transport::{ChatTransport, InboundEvent, UpdateSource};

const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(3);

/// What the dispatcher does with one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    Process(InboundRequest),
    Guide { chat_id: i64 },
    Ignore,
}

impl From<InboundEvent> for EventAction {
    fn from(event: InboundEvent) -> Self {
        if let Some(command) = event.command() {
            if matches!(command, "start" | "help") {
                return EventAction::Guide {
                    chat_id: event.chat_id,
                };
            }
        }
        match event.into_request() {
            Some(request) => EventAction::Process(request),
            None => EventAction::Ignore,
        }
    }
}

/// Counts spawned request tasks, including those still waiting for a permit.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(tracker: &Arc<InFlight>) -> Self {
        tracker.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(tracker))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Fans inbound events out to one task per request.
pub struct Dispatcher<T: ?Sized> {
    handler: Arc<RequestHandler<T>>,
    limiter: Arc<Semaphore>,
    in_flight: Arc<InFlight>,
    error_backoff: Duration,
}

impl<T> Dispatcher<T>
where
    T: ChatTransport + ?Sized + 'static,
{
    pub fn new(handler: Arc<RequestHandler<T>>, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            handler,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
            in_flight: Arc::default(),
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Number of spawned requests that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Starts work for one event; returns the task handle when a request was spawned.
    /// Never waits for a concurrency slot: the spawned task does.
    pub async fn dispatch(&self, event: InboundEvent) -> Option<JoinHandle<RequestOutcome>> {
        match EventAction::from(event) {
            EventAction::Process(request) => {
                let guard = InFlightGuard::enter(&self.in_flight);
                let limiter = Arc::clone(&self.limiter);
                let handler = Arc::clone(&self.handler);
                Some(tokio::spawn(async move {
                    let _guard = guard;
                    let _permit = limiter.acquire_owned().await;
                    let outcome = handler.handle(&request).await;
                    debug!(request_id = %request.request_id(), ?outcome, "request finished");
                    outcome
                }))
            }
            EventAction::Guide { chat_id } => {
                if let Err(err) = self
                    .handler
                    .transport()
                    .send_text(chat_id, GUIDANCE_MESSAGE)
                    .await
                {
                    warn!(chat_id, error = %err, "failed to send guidance");
                }
                None
            }
            EventAction::Ignore => None,
        }
    }

    /// Pulls events from `source` until `shutdown` resolves, then waits for
    /// in-flight requests so their transient files are cleaned up.
    pub async fn run<S, F>(&self, source: &mut S, shutdown: F)
    where
        S: UpdateSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, draining in-flight requests");
                    break;
                }
                batch = source.next_events() => match batch {
                    Ok(events) => {
                        for event in events {
                            self.dispatch(event).await;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, wait = ?self.error_backoff, "failed to fetch updates");
                        sleep(self.error_backoff).await;
                    }
                }
            }
        }
        self.drain().await;
    }

    /// Waits until every spawned request, queued or running, has finished.
    pub async fn drain(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                break;
            }
            idle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DocumentRef;

    fn event(text: Option<&str>, mime: Option<&str>) -> InboundEvent {
        InboundEvent {
            chat_id: 3,
            message_id: 4,
            text: text.map(str::to_string),
            document: mime.map(|mime| DocumentRef {
                file_ref: "file".into(),
                mime_type: Some(mime.into()),
                file_name: None,
            }),
        }
    }

    #[test]
    fn start_and_help_get_guidance() {
        assert_eq!(
            EventAction::from(event(Some("/start"), None)),
            EventAction::Guide { chat_id: 3 }
        );
        assert_eq!(
            EventAction::from(event(Some("/help"), None)),
            EventAction::Guide { chat_id: 3 }
        );
    }

    #[test]
    fn plain_text_is_ignored() {
        assert_eq!(EventAction::from(event(Some("hi"), None)), EventAction::Ignore);
        assert_eq!(EventAction::from(event(Some("/unknown"), None)), EventAction::Ignore);
    }

    #[test]
    fn any_document_goes_to_the_pipeline() {
        for mime in ["video/mp4", "image/png"] {
            match EventAction::from(event(None, Some(mime))) {
                EventAction::Process(request) => {
                    assert_eq!(request.mime_type.as_deref(), Some(mime))
                }
                other => panic!("unexpected action {other:?}"),
            }
        }
    }
}
