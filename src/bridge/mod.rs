//! Cross-context bridge to the privileged rendering context.
//!
//! ```text
//!  content context                      privileged context
//!  ───────────────                      ──────────────────
//!  Bridge::request ──Envelope{id}──▶ offscreen::serve ─▶ registry / renderer
//!        ▲                                   │
//!        └──── dispatcher ◀──Inbound─────────┘
//!              (OffscreenReady → ready gate, Response → pending[id])
//! ```
//!
//! The bridge implements [`RenderService`], so converters running in the
//! content context render through it exactly as they would in-process.

pub mod context;
pub mod host;
pub mod offscreen;
pub mod protocol;

pub use context::{PendingRequests, RenderingContextManager};
pub use host::{ContextHost, ContextMain, HostStats, Outbox, Relay, TaskHost};
pub use protocol::{Envelope, Inbound, Reply, Request};

use crate::config::{BridgeConfig, RenderOptions, ServiceConfig};
use crate::error::{BridgeError, ConvertError};
use crate::file::SerializedFile;
use crate::service::RenderService;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Typed RPC client for the privileged rendering context.
///
/// Must be created inside a tokio runtime: it spawns the task that routes
/// inbound messages.
pub struct Bridge {
    manager: RenderingContextManager,
    pending: Arc<PendingRequests>,
    host: Arc<dyn ContextHost>,
    config: BridgeConfig,
    dispatcher: JoinHandle<()>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    pub fn new(host: Arc<dyn ContextHost>, config: BridgeConfig) -> Self {
        let pending = Arc::new(PendingRequests::default());
        let manager = RenderingContextManager::new(host.clone(), config.clone(), pending.clone());

        let (outbox, inbound) = mpsc::unbounded_channel();
        host.connect(outbox);
        let dispatcher = tokio::spawn(dispatch(inbound, manager.clone(), pending.clone()));

        Self {
            manager,
            pending,
            host,
            config,
            dispatcher,
        }
    }

    /// A bridge whose contexts run as local tasks.
    pub fn local(config: &ServiceConfig) -> Self {
        Self::new(
            Arc::new(TaskHost::new(config.inliner.clone())),
            config.bridge.clone(),
        )
    }

    pub fn manager(&self) -> &RenderingContextManager {
        &self.manager
    }

    /// Convert a whole file inside the privileged context.
    ///
    /// Conversion failures come back as a [`SerializedFile`] carrying the
    /// error; only transport failures are `Err`.
    pub async fn file_to_image(&self, file: SerializedFile) -> Result<SerializedFile, BridgeError> {
        let request = Request::FileToImage { file };
        let action = request.action();
        match self.request(request).await? {
            Reply::File { file } => Ok(file),
            _ => Err(unexpected(action)),
        }
    }

    pub async fn convert_html_to_image(
        &self,
        html: &str,
        options: &RenderOptions,
    ) -> Result<Option<String>, BridgeError> {
        let request = Request::ConvertHtmlToImage {
            html: html.to_string(),
            options: options.clone(),
        };
        let action = request.action();
        match self.request(request).await? {
            Reply::Image { data_url } => Ok(data_url),
            _ => Err(unexpected(action)),
        }
    }

    pub async fn render_markdown_to_html(&self, markdown: &str) -> Result<String, BridgeError> {
        let request = Request::RenderMarkdownToHtml {
            markdown: markdown.to_string(),
        };
        let action = request.action();
        match self.request(request).await? {
            Reply::Html { html } => Ok(html),
            _ => Err(unexpected(action)),
        }
    }

    /// Extensions the privileged context's registry claims, with dots.
    pub async fn supported_formats(&self) -> Result<Vec<String>, BridgeError> {
        let request = Request::SupportedFormats;
        let action = request.action();
        match self.request(request).await? {
            Reply::Formats { extensions } => Ok(extensions),
            _ => Err(unexpected(action)),
        }
    }

    pub async fn teardown(&self) -> Result<(), BridgeError> {
        self.manager.teardown().await
    }

    pub async fn is_ready(&self) -> bool {
        self.manager.is_ready().await
    }

    async fn request(&self, request: Request) -> Result<Reply, BridgeError> {
        self.manager.ensure_ready().await?;

        let envelope = Envelope::new(request);
        let id = envelope.id;
        let action = envelope.request.action();
        let reply = self.pending.insert(id);
        if let Err(e) = self.host.post(&self.config.document_url, envelope) {
            self.pending.remove(id);
            return Err(e);
        }

        let outcome = match tokio::time::timeout(self.config.request_timeout, reply).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(BridgeError::ContextClosed),
            Err(_) => {
                self.pending.remove(id);
                Err(BridgeError::RequestTimeout {
                    action: action.to_string(),
                    ms: self.config.request_timeout.as_millis() as u64,
                })
            }
        };

        match outcome? {
            Reply::Error { message } => Err(BridgeError::Remote {
                action: action.to_string(),
                message,
            }),
            reply => Ok(reply),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

#[async_trait]
impl RenderService for Bridge {
    async fn html_to_image(
        &self,
        html: &str,
        options: &RenderOptions,
    ) -> Result<Option<String>, ConvertError> {
        Ok(self.convert_html_to_image(html, options).await?)
    }

    async fn markdown_to_html(&self, markdown: &str) -> Result<String, ConvertError> {
        Ok(self.render_markdown_to_html(markdown).await?)
    }
}

fn unexpected(action: &str) -> BridgeError {
    BridgeError::UnexpectedReply {
        action: action.to_string(),
    }
}

async fn dispatch(
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    manager: RenderingContextManager,
    pending: Arc<PendingRequests>,
) {
    while let Some(message) = inbound.recv().await {
        match message {
            Inbound::OffscreenReady => {
                if !manager.signal_ready() {
                    debug!("Ignoring stale OffscreenReady");
                }
            }
            Inbound::Response { id, reply } => {
                if !pending.complete(id, reply) {
                    debug!("Dropping reply to unknown or abandoned request {}", id);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::converters::testing::RecordingService;
    use futures::future::FutureExt;

    /// A host whose contexts serve requests with `service`.
    pub(crate) fn serving(service: Arc<dyn RenderService>) -> Arc<TaskHost> {
        Arc::new(TaskHost::with_main(Arc::new(
            move |requests: mpsc::UnboundedReceiver<Envelope>, relay: Relay| {
                offscreen::serve(requests, relay, service.clone()).boxed()
            },
        )))
    }

    /// A host whose contexts render through a [`RecordingService`].
    pub(crate) fn recording() -> Arc<TaskHost> {
        serving(Arc::new(RecordingService::default()))
    }
}
