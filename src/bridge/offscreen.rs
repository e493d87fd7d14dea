//! The privileged rendering context.
//!
//! Owns the only real [`RenderService`] and a registry built over it. Every
//! request is handled on its own task so a slow rendering never blocks a
//! quick `supportedFormats`. Those tasks belong to the context: closing it
//! cancels whatever is still in flight.

use super::host::Relay;
use super::protocol::{Envelope, Inbound, Reply, Request};
use crate::config::InlinerConfig;
use crate::file::SerializedFile;
use crate::registry::ConverterRegistry;
use crate::service::{LocalRenderService, RenderService};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Entry point of a context launched by [`super::TaskHost`].
pub async fn run(requests: mpsc::UnboundedReceiver<Envelope>, relay: Relay, inliner: InlinerConfig) {
    match LocalRenderService::new(inliner) {
        Ok(service) => serve(requests, relay, Arc::new(service)).await,
        // Never signals ready; the bridge times the creation out.
        Err(e) => error!("Rendering context failed to start: {}", e),
    }
}

/// Install handlers, announce readiness, then answer requests until the
/// channel closes. Requests still running when it closes are finished;
/// dropping the future aborts them instead.
pub async fn serve(
    mut requests: mpsc::UnboundedReceiver<Envelope>,
    relay: Relay,
    service: Arc<dyn RenderService>,
) {
    let registry = match ConverterRegistry::with_rendering(service.clone()) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            error!("Rendering context registry failed to load: {}", e);
            return;
        }
    };

    if !relay.send(Inbound::OffscreenReady) {
        warn!("Rendering context ready but nobody is listening");
    }

    let mut handlers = JoinSet::new();
    loop {
        tokio::select! {
            envelope = requests.recv() => {
                let Some(Envelope { id, request }) = envelope else {
                    break;
                };
                let registry = registry.clone();
                let service = service.clone();
                let relay = relay.clone();
                handlers.spawn(async move {
                    let action = request.action();
                    let reply = handle(&registry, service.as_ref(), request).await;
                    debug!("← {} {}", action, id);
                    if !relay.send(Inbound::Response { id, reply }) {
                        warn!("Dropped reply to '{}': no listener", action);
                    }
                });
            }
            Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = finished {
                    error!("Request handler failed: {}", e);
                }
            }
        }
    }

    debug!(
        "Rendering context request channel closed, {} requests in flight",
        handlers.len()
    );
    while let Some(finished) = handlers.join_next().await {
        if let Err(e) = finished {
            error!("Request handler failed: {}", e);
        }
    }
}

async fn handle(registry: &ConverterRegistry, service: &dyn RenderService, request: Request) -> Reply {
    match request {
        Request::FileToImage { file } => {
            let result = match file.into_file() {
                Ok(file) => registry.convert(file).await,
                Err(e) => Err(e),
            };
            Reply::File {
                file: SerializedFile::from_result(result),
            }
        }
        Request::ConvertHtmlToImage { html, options } => {
            match service.html_to_image(&html, &options).await {
                Ok(data_url) => Reply::Image { data_url },
                Err(e) => Reply::Error {
                    message: e.to_string(),
                },
            }
        }
        Request::RenderMarkdownToHtml { markdown } => {
            match service.markdown_to_html(&markdown).await {
                Ok(html) => Reply::Html { html },
                Err(e) => Reply::Error {
                    message: e.to_string(),
                },
            }
        }
        Request::SupportedFormats => Reply::Formats {
            extensions: registry.supported_extensions(false, true),
        },
    }
}
