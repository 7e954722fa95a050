use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::event::Event;
use crate::registry::{SubscriberId, SubscriberRegistry, Subscription};

/// Client-facing side of a stream: anything that can take one event at a time.
#[async_trait]
pub trait EventSink: Send {
    /// Write one event. An error ends the session.
    async fn send(&mut self, event: &Event) -> Result<()>;
}

#[async_trait]
impl EventSink for mpsc::Sender<Event> {
    async fn send(&mut self, event: &Event) -> Result<()> {
        mpsc::Sender::send(self, event.clone())
            .await
            .map_err(|_| SyncError::TransportClosed)
    }
}

/// Session lifecycle — linear progression, no backwards transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Closed,
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The connection's cancellation token fired (client gone or shutdown).
    Cancelled,
    /// A write to the transport failed.
    TransportClosed,
    /// The subscriber was removed from the registry from outside.
    Evicted,
}

/// Per-connection relay loop: one mailbox in, one transport out.
pub struct StreamSession {
    subscription: Subscription,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
}

impl StreamSession {
    /// Register a mailbox for a new connection. The subscriber is visible
    /// to publishers as soon as this returns.
    pub fn open(
        registry: &Arc<SubscriberRegistry>,
        origin: Option<&str>,
        cancel: CancellationToken,
    ) -> Self {
        let subscription = match origin {
            Some(origin) => registry.register_from(origin),
            None => registry.register(),
        };
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            subscription,
            cancel,
            state,
        }
    }

    pub fn id(&self) -> &SubscriberId {
        self.subscription.id()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Follow state transitions after `run` has taken the session.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Drive the session to completion. Deregistration runs on every exit
    /// path before this returns.
    pub async fn run<S: EventSink>(mut self, mut sink: S) -> SessionOutcome {
        let outcome = self.relay(&mut sink).await;
        self.subscription.deregister();
        self.state.send_replace(SessionState::Closed);
        info!(subscriber = %self.id(), outcome = ?outcome, "stream session closed");
        outcome
    }

    async fn relay<S: EventSink>(&mut self, sink: &mut S) -> SessionOutcome {
        if let Err(outcome) = self.write(sink, &Event::connected()).await {
            return outcome;
        }
        self.state.send_replace(SessionState::Streaming);
        debug!(subscriber = %self.id(), "stream session live");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,

                next = self.subscription.recv() => match next {
                    Some(event) => {
                        if let Err(outcome) = self.write(sink, &event).await {
                            return outcome;
                        }
                    }
                    None => return SessionOutcome::Evicted,
                },
            }
        }
    }

    /// One transport write. A stalled client must not hold the session
    /// past cancellation, so the write races the token too.
    async fn write<S: EventSink>(
        &self,
        sink: &mut S,
        event: &Event,
    ) -> std::result::Result<(), SessionOutcome> {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(SessionOutcome::Cancelled),

            sent = sink.send(event) => sent.map_err(|e| {
                debug!(subscriber = %self.id(), error = %e, "write failed");
                SessionOutcome::TransportClosed
            }),
        }
    }
}
