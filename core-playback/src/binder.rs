//! # Resource Binder
//!
//! Sole owner of the active render resource, its presentation surface and
//! the observer task forwarding its events.
//!
//! ## Ordering
//!
//! ```text
//! attach:  present on surface ──> subscribe ──> forward events
//! detach:  cancel observers ──> cancel seeks / pause ──> release ──> clear surface
//! ```
//!
//! At most one resource is attached at a time; attaching while another is
//! active detaches the old one first.

use crate::error::PlaybackError;
use crate::traits::{PresentationSurface, RenderResource, ResourceEvent};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, Instrument};

struct Binding {
    resource: Arc<dyn RenderResource>,
    surface: Arc<dyn PresentationSurface>,
    observers: CancellationToken,
}

#[derive(Default)]
pub(crate) struct ResourceBinder {
    active: Option<Binding>,
}

impl ResourceBinder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Present `resource` on `surface` and start forwarding its events.
    ///
    /// `forward` runs on a background task and returns `false` once nobody
    /// listens anymore. Without a surface the resource is released and the
    /// attach fails with [`PlaybackError::NoPresentationSurface`].
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn attach<F>(
        &mut self,
        resource: Arc<dyn RenderResource>,
        surface: Option<Arc<dyn PresentationSurface>>,
        mut forward: F,
    ) -> Result<(), PlaybackError>
    where
        F: FnMut(ResourceEvent) -> bool + Send + 'static,
    {
        self.detach();

        let Some(surface) = surface else {
            debug!("No presentation surface supplied; releasing resource");
            resource.release();
            return Err(PlaybackError::NoPresentationSurface);
        };

        surface.present(resource.clone());

        let observers = CancellationToken::new();
        let token = observers.clone();
        let mut events = resource.subscribe();
        tokio::spawn(
            async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        event = events.next() => match event {
                            Some(event) => {
                                trace!(?event, "Resource event");
                                if !forward(event) {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
            .in_current_span(),
        );

        self.active = Some(Binding {
            resource,
            surface,
            observers,
        });
        Ok(())
    }

    /// Tear down the active binding. Safe to call repeatedly.
    pub(crate) fn detach(&mut self) {
        let Some(binding) = self.active.take() else {
            return;
        };

        binding.observers.cancel();
        binding.resource.cancel_pending_seeks();
        binding.resource.pause();
        binding.resource.release();
        binding.surface.clear();
        debug!("Render resource detached");
    }

    pub(crate) fn resource(&self) -> Option<&Arc<dyn RenderResource>> {
        self.active.as_ref().map(|binding| &binding.resource)
    }

    #[cfg(test)]
    pub(crate) fn is_attached(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for ResourceBinder {
    fn drop(&mut self) {
        self.detach();
    }
}
