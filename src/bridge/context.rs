//! Lifecycle of the privileged rendering context.
//!
//! ```text
//!            ensure_ready                 OffscreenReady
//!   Absent ───────────────▶ Creating ─────────────────────▶ Ready
//!     ▲                        │ failure / ready timeout      │
//!     └────────────────────────┘                              │
//!     └───────────────── idle timeout / teardown ─────────────┘
//! ```
//!
//! Creation runs on its own task and is shared: every caller arriving while
//! a creation is in flight awaits the same future. Each successful
//! [`RenderingContextManager::ensure_ready`] re-arms the idle timer.

use super::host::ContextHost;
use super::protocol::Reply;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Creation = Shared<BoxFuture<'static, Result<(), BridgeError>>>;

enum ContextState {
    Absent,
    Creating { generation: u64, done: Creation },
    Ready { generation: u64 },
}

impl ContextState {
    fn name(&self) -> &'static str {
        match self {
            ContextState::Absent => "absent",
            ContextState::Creating { .. } => "creating",
            ContextState::Ready { .. } => "ready",
        }
    }
}

impl std::fmt::Debug for ContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextState::Absent => f.write_str("Absent"),
            ContextState::Creating { generation, .. } => {
                f.debug_struct("Creating").field("generation", generation).finish()
            }
            ContextState::Ready { generation } => {
                f.debug_struct("Ready").field("generation", generation).finish()
            }
        }
    }
}

// ── Pending requests ─────────────────────────────────────────────────────

type Waiter = oneshot::Sender<Result<Reply, BridgeError>>;

/// Requests posted to the context and still awaiting a reply, by id.
#[derive(Debug, Default)]
pub struct PendingRequests {
    waiters: Mutex<HashMap<Uuid, Waiter>>,
}

impl PendingRequests {
    fn waiters(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, id: Uuid) -> oneshot::Receiver<Result<Reply, BridgeError>> {
        let (tx, rx) = oneshot::channel();
        self.waiters().insert(id, tx);
        rx
    }

    /// Hand `reply` to whoever is waiting on `id`. False for unknown ids.
    pub fn complete(&self, id: Uuid, reply: Reply) -> bool {
        match self.waiters().remove(&id) {
            Some(tx) => tx.send(Ok(reply)).is_ok(),
            None => false,
        }
    }

    pub fn remove(&self, id: Uuid) {
        self.waiters().remove(&id);
    }

    pub fn fail_all(&self, error: BridgeError) {
        let drained: Vec<_> = self.waiters().drain().collect();
        if !drained.is_empty() {
            debug!("Failing {} pending request(s): {}", drained.len(), error);
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(error.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.waiters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Manager ──────────────────────────────────────────────────────────────

struct IdleTimer {
    token: u64,
    task: JoinHandle<()>,
}

struct Inner {
    host: Arc<dyn ContextHost>,
    config: BridgeConfig,
    state: tokio::sync::Mutex<ContextState>,
    ready_gate: Mutex<Option<oneshot::Sender<()>>>,
    idle: Mutex<Option<IdleTimer>>,
    generations: AtomicU64,
    idle_tokens: AtomicU64,
    pending: Arc<PendingRequests>,
}

/// Owns the privileged context: creates it on demand, shares in-flight
/// creations, and tears it down when idle.
#[derive(Clone)]
pub struct RenderingContextManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RenderingContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingContextManager")
            .field("document_url", &self.inner.config.document_url)
            .field("pending", &self.inner.pending.len())
            .finish_non_exhaustive()
    }
}

impl RenderingContextManager {
    /// `pending` is failed with [`BridgeError::ContextClosed`] whenever the
    /// context is torn down.
    pub fn new(
        host: Arc<dyn ContextHost>,
        config: BridgeConfig,
        pending: Arc<PendingRequests>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                config,
                state: tokio::sync::Mutex::new(ContextState::Absent),
                ready_gate: Mutex::new(None),
                idle: Mutex::new(None),
                generations: AtomicU64::new(0),
                idle_tokens: AtomicU64::new(0),
                pending,
            }),
        }
    }

    /// Make sure a ready context exists, creating it if needed.
    ///
    /// Concurrent callers share one creation. A failed creation is reported
    /// to every caller awaiting it and leaves the manager `Absent`, so the
    /// next call retries.
    pub async fn ensure_ready(&self) -> Result<(), BridgeError> {
        let inner = &self.inner;
        let url = inner.config.document_url.as_str();

        let creation = {
            let mut state = inner.state.lock().await;
            match &*state {
                ContextState::Ready { .. } => {
                    if inner.host.context_exists(url).await {
                        inner.touch();
                        return Ok(());
                    }
                    warn!("Rendering context '{}' disappeared; recreating", url);
                    inner.pending.fail_all(BridgeError::ContextClosed);
                    inner.start_creation(&mut state)
                }
                ContextState::Creating { done, .. } => {
                    debug!("Joining in-flight context creation");
                    done.clone()
                }
                ContextState::Absent => {
                    if inner.host.context_exists(url).await {
                        let generation = inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
                        info!("Adopting existing rendering context '{}'", url);
                        *state = ContextState::Ready { generation };
                        inner.touch();
                        return Ok(());
                    }
                    inner.start_creation(&mut state)
                }
            }
        };

        creation.await?;

        let state = inner.state.lock().await;
        if matches!(*state, ContextState::Ready { .. }) {
            inner.touch();
        }
        Ok(())
    }

    /// Close the context now.
    ///
    /// Not allowed while a creation is in flight. Pending requests fail with
    /// [`BridgeError::ContextClosed`].
    pub async fn teardown(&self) -> Result<(), BridgeError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        if let ContextState::Creating { .. } = *state {
            return Err(BridgeError::IllegalTransition {
                state: state.name(),
                action: "tear down",
            });
        }
        inner.cancel_idle();
        let present = matches!(*state, ContextState::Ready { .. })
            || inner.host.context_exists(&inner.config.document_url).await;
        if present {
            inner.close(&mut state).await;
        }
        Ok(())
    }

    pub async fn is_ready(&self) -> bool {
        matches!(*self.inner.state.lock().await, ContextState::Ready { .. })
    }

    /// `"absent"`, `"creating"` or `"ready"`.
    pub async fn state(&self) -> &'static str {
        self.inner.state.lock().await.name()
    }

    /// Deliver an `OffscreenReady` signal to the armed ready gate.
    ///
    /// Returns false when no creation is waiting for one, i.e. the signal is
    /// stale.
    pub fn signal_ready(&self) -> bool {
        let gate = self
            .inner
            .ready_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        gate.is_some_and(|tx| tx.send(()).is_ok())
    }
}

impl Inner {
    fn start_creation(self: &Arc<Self>, state: &mut ContextState) -> Creation {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Context state {} → creating (#{})", state.name(), generation);

        let inner = Arc::clone(self);
        let done = tokio::spawn(async move { inner.create(generation).await })
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(BridgeError::ContextCreationFailed(format!(
                        "creation task failed: {e}"
                    )))
                })
            })
            .boxed()
            .shared();

        *state = ContextState::Creating {
            generation,
            done: done.clone(),
        };
        done
    }

    async fn create(self: Arc<Self>, generation: u64) -> Result<(), BridgeError> {
        let url = self.config.document_url.as_str();
        let ready = self.arm_ready_gate();

        let result = match self.host.create_context(url).await {
            Err(e) => Err(e),
            Ok(()) => match tokio::time::timeout(self.config.ready_timeout, ready).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(BridgeError::ContextCreationFailed(
                    "ready gate replaced before the context signalled".into(),
                )),
                Err(_) => {
                    self.host.close_context(url).await;
                    Err(BridgeError::ContextInitializationTimeout {
                        ms: self.config.ready_timeout.as_millis() as u64,
                    })
                }
            },
        };

        let mut state = self.state.lock().await;
        if matches!(*state, ContextState::Creating { generation: g, .. } if g == generation) {
            *state = match &result {
                Ok(()) => {
                    info!("Rendering context ready (#{})", generation);
                    ContextState::Ready { generation }
                }
                Err(e) => {
                    warn!("Rendering context creation failed: {}", e);
                    self.ready_gate
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    ContextState::Absent
                }
            };
        }
        result
    }

    /// A fresh gate per attempt; any sender from an earlier attempt is
    /// dropped so its signal can no longer be consumed.
    fn arm_ready_gate(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.ready_gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Restart the idle timer. Caller holds the state lock.
    fn touch(self: &Arc<Self>) {
        let token = self.idle_tokens.fetch_add(1, Ordering::SeqCst) + 1;
        let weak: Weak<Self> = Arc::downgrade(self);
        let idle = self.config.idle_timeout;
        let task = tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if let Some(inner) = weak.upgrade() {
                inner.idle_expired(token).await;
            }
        });
        let previous = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(IdleTimer { token, task });
        if let Some(previous) = previous {
            previous.task.abort();
        }
    }

    fn cancel_idle(&self) {
        let timer = self.idle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(timer) = timer {
            timer.task.abort();
        }
    }

    async fn idle_expired(self: Arc<Self>, token: u64) {
        let mut state = self.state.lock().await;
        {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            if idle.as_ref().map(|timer| timer.token) != Some(token) {
                return;
            }
            // Detach without aborting: this is the running timer task.
            idle.take();
        }

        match *state {
            ContextState::Ready { .. } => {}
            // The creation's own ensure_ready re-arms the timer.
            ContextState::Creating { .. } => {
                debug!("Idle timer fired during creation; skipping teardown");
                return;
            }
            ContextState::Absent => return,
        }

        if !self.pending.is_empty() {
            debug!("Idle timer fired with {} request(s) in flight", self.pending.len());
            self.touch();
            return;
        }

        info!(
            "Rendering context idle for {:?}; tearing down",
            self.config.idle_timeout
        );
        self.close(&mut state).await;
    }

    async fn close(&self, state: &mut ContextState) {
        self.host.close_context(&self.config.document_url).await;
        self.pending.fail_all(BridgeError::ContextClosed);
        debug!("Context state {} → absent", state.name());
        *state = ContextState::Absent;
    }
}
