//! The environment that owns execution contexts.
//!
//! The bridge never spawns the privileged context itself; it asks a
//! [`ContextHost`]. [`TaskHost`] runs each context as a tokio task with its
//! own registry and render service, connected only through channels.

use super::offscreen;
use super::protocol::{Envelope, Inbound};
use crate::config::InlinerConfig;
use crate::error::BridgeError;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Where messages from a context are delivered.
pub type Outbox = mpsc::UnboundedSender<Inbound>;

/// Creates, addresses and destroys privileged contexts.
#[async_trait]
pub trait ContextHost: Send + Sync {
    /// Route every message from any context to `outbox`, replacing the
    /// previous listener.
    fn connect(&self, outbox: Outbox);

    /// Whether a context for `document_url` is running.
    async fn context_exists(&self, document_url: &str) -> bool;

    /// Start a context for `document_url`. Returns once the context has
    /// been launched, not once it is ready.
    async fn create_context(&self, document_url: &str) -> Result<(), BridgeError>;

    /// Deliver a request to the running context.
    fn post(&self, document_url: &str, envelope: Envelope) -> Result<(), BridgeError>;

    /// Destroy the context, if any.
    async fn close_context(&self, document_url: &str);
}

/// Fan-in point for messages leaving a context.
///
/// Outlives any single listener: a reconnecting bridge keeps receiving from
/// contexts created before it existed.
#[derive(Debug, Clone, Default)]
pub struct Relay {
    outbox: Arc<Mutex<Option<Outbox>>>,
}

impl Relay {
    pub fn connect(&self, outbox: Outbox) {
        *self.outbox.lock().unwrap_or_else(PoisonError::into_inner) = Some(outbox);
    }

    /// Deliver `message`. False when nobody is listening.
    pub fn send(&self, message: Inbound) -> bool {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| tx.send(message).is_ok())
    }
}

/// Body of a context task: consumes requests, answers through the relay.
pub type ContextMain =
    Arc<dyn Fn(mpsc::UnboundedReceiver<Envelope>, Relay) -> BoxFuture<'static, ()> + Send + Sync>;

struct RunningContext {
    requests: mpsc::UnboundedSender<Envelope>,
    task: JoinHandle<()>,
}

/// Counters for observing context churn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub created: usize,
    pub closed: usize,
}

/// Runs privileged contexts as tokio tasks.
pub struct TaskHost {
    relay: Relay,
    main: ContextMain,
    contexts: Mutex<HashMap<String, RunningContext>>,
    created: AtomicUsize,
    closed: AtomicUsize,
}

impl std::fmt::Debug for TaskHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHost")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl TaskHost {
    /// Contexts run the standard offscreen renderer.
    pub fn new(inliner: InlinerConfig) -> Self {
        Self::with_main(Arc::new(
            move |requests: mpsc::UnboundedReceiver<Envelope>, relay: Relay| {
                offscreen::run(requests, relay, inliner.clone()).boxed()
            },
        ))
    }

    /// Contexts run `main`.
    pub fn with_main(main: ContextMain) -> Self {
        Self {
            relay: Relay::default(),
            main,
            contexts: Mutex::new(HashMap::new()),
            created: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    pub fn stats(&self) -> HostStats {
        HostStats {
            created: self.created.load(Ordering::SeqCst),
            closed: self.closed.load(Ordering::SeqCst),
        }
    }

    fn contexts(&self) -> std::sync::MutexGuard<'_, HashMap<String, RunningContext>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContextHost for TaskHost {
    fn connect(&self, outbox: Outbox) {
        self.relay.connect(outbox);
    }

    async fn context_exists(&self, document_url: &str) -> bool {
        self.contexts()
            .get(document_url)
            .is_some_and(|c| !c.task.is_finished())
    }

    async fn create_context(&self, document_url: &str) -> Result<(), BridgeError> {
        let mut contexts = self.contexts();
        if contexts
            .get(document_url)
            .is_some_and(|c| !c.task.is_finished())
        {
            return Err(BridgeError::ContextCreationFailed(format!(
                "a context for '{document_url}' is already running"
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn((self.main)(rx, self.relay.clone()));
        contexts.insert(
            document_url.to_string(),
            RunningContext { requests: tx, task },
        );
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Launched rendering context '{}' (#{})", document_url, n);
        Ok(())
    }

    fn post(&self, document_url: &str, envelope: Envelope) -> Result<(), BridgeError> {
        let contexts = self.contexts();
        let context = contexts
            .get(document_url)
            .ok_or(BridgeError::ContextClosed)?;
        debug!("→ {} {}", envelope.request.action(), envelope.id);
        context
            .requests
            .send(envelope)
            .map_err(|_| BridgeError::ContextClosed)
    }

    async fn close_context(&self, document_url: &str) {
        let removed = self.contexts().remove(document_url);
        if let Some(context) = removed {
            context.task.abort();
            self.closed.fetch_add(1, Ordering::SeqCst);
            info!("Closed rendering context '{}'", document_url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_ready() -> ContextMain {
        Arc::new(|mut requests: mpsc::UnboundedReceiver<Envelope>, relay: Relay| {
            async move {
                relay.send(Inbound::OffscreenReady);
                while requests.recv().await.is_some() {}
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn created_context_signals_through_relay() {
        let host = TaskHost::with_main(echo_ready());
        let (tx, mut rx) = mpsc::unbounded_channel();
        host.connect(tx);

        host.create_context("doc").await.unwrap();
        assert_eq!(rx.recv().await, Some(Inbound::OffscreenReady));
        assert!(host.context_exists("doc").await);
        assert!(!host.context_exists("other").await);
    }

    #[tokio::test]
    async fn second_creation_for_same_document_is_refused() {
        let host = TaskHost::with_main(echo_ready());
        host.create_context("doc").await.unwrap();
        assert!(matches!(
            host.create_context("doc").await,
            Err(BridgeError::ContextCreationFailed(_))
        ));
        assert_eq!(host.stats().created, 1);
    }

    #[tokio::test]
    async fn closed_context_rejects_posts() {
        let host = TaskHost::with_main(echo_ready());
        host.create_context("doc").await.unwrap();
        host.close_context("doc").await;

        assert!(!host.context_exists("doc").await);
        let env = Envelope::new(super::super::protocol::Request::SupportedFormats);
        assert_eq!(host.post("doc", env), Err(BridgeError::ContextClosed));
        assert_eq!(host.stats(), HostStats { created: 1, closed: 1 });
    }

    #[test]
    fn relay_without_listener_reports_undelivered() {
        assert!(!Relay::default().send(Inbound::OffscreenReady));
    }
}
