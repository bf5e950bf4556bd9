//! Tenant Events
//!
//! Facts published by a tenancy when a tenant is identified, loaded or
//! swapped, and the sinks that deliver them.

use crate::tenant::SharedTenant;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// What happened
#[derive(Debug, Clone)]
pub enum TenantEventKind {
    /// A resolver produced an identifier that the provider found
    Identified {
        tenant: SharedTenant,
        resolver: String,
    },

    /// A tenant was retrieved by key
    Loaded { tenant: SharedTenant },

    /// The current tenant is about to change
    Changed {
        previous: Option<SharedTenant>,
        current: Option<SharedTenant>,
    },
}

/// Event published by a tenancy
#[derive(Debug, Clone)]
pub struct TenantEvent {
    /// Unique event ID
    pub id: Uuid,

    /// When the event was raised
    pub occurred_at: DateTime<Utc>,

    /// Name of the tenancy that raised it
    pub tenancy: String,

    pub kind: TenantEventKind,
}

impl TenantEvent {
    /// Create a new event
    pub fn new(tenancy: impl Into<String>, kind: TenantEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            tenancy: tenancy.into(),
            kind,
        }
    }

    /// Short event name, used in logs
    pub fn name(&self) -> &'static str {
        match self.kind {
            TenantEventKind::Identified { .. } => "tenant.identified",
            TenantEventKind::Loaded { .. } => "tenant.loaded",
            TenantEventKind::Changed { .. } => "tenant.changed",
        }
    }
}

/// Event sink
///
/// Publishing is fire-and-forget: sinks must not fail the caller.
pub trait TenantEventSink: Send + Sync {
    fn publish(&self, event: TenantEvent);
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TenantEventSink for NullSink {
    fn publish(&self, _event: TenantEvent) {}
}

/// Listener errors
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Listener failed: {0}")]
    Failed(String),
}

/// Tenant event listener
pub trait TenantListener: Send + Sync {
    fn handle(&self, event: &TenantEvent) -> Result<(), ListenerError>;
}

impl<F> TenantListener for F
where
    F: Fn(&TenantEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn handle(&self, event: &TenantEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Synchronous in-process dispatcher
///
/// Listeners run in registration order. A failing listener is logged and
/// the remaining listeners still run.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<RwLock<Vec<Arc<dyn TenantListener>>>>,
}

impl EventDispatcher {
    /// Create a dispatcher with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener
    pub fn listen<L: TenantListener + 'static>(&self, listener: L) {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Number of listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl TenantEventSink for EventDispatcher {
    fn publish(&self, event: TenantEvent) {
        let listeners = self.listeners.read().clone();

        debug!(
            event = event.name(),
            id = %event.id,
            tenancy = %event.tenancy,
            listeners = listeners.len(),
            "Publishing tenant event"
        );

        for listener in listeners {
            if let Err(e) = listener.handle(&event) {
                warn!(event = event.name(), id = %event.id, "Tenant listener failed: {}", e);
            }
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Sink that fans events out over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<TenantEvent>,
}

impl BroadcastSink {
    /// Create a sink with a bounded channel
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to published events
    pub fn subscribe(&self) -> broadcast::Receiver<TenantEvent> {
        self.sender.subscribe()
    }
}

impl TenantEventSink for BroadcastSink {
    fn publish(&self, event: TenantEvent) {
        if self.sender.send(event).is_err() {
            debug!("No subscribers for tenant event");
        }
    }
}

/// Sink that records every event, for inspection in tests
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<RwLock<Vec<TenantEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far
    pub fn events(&self) -> Vec<TenantEvent> {
        self.events.read().clone()
    }

    /// Names of everything published so far
    pub fn names(&self) -> Vec<&'static str> {
        self.events.read().iter().map(TenantEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl TenantEventSink for RecordingSink {
    fn publish(&self, event: TenantEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::GenericTenant;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn loaded() -> TenantEvent {
        TenantEvent::new(
            "primary",
            TenantEventKind::Loaded {
                tenant: Arc::new(GenericTenant::new(7, "acme")),
            },
        )
    }

    #[test]
    fn test_event_metadata() {
        let a = loaded();
        let b = loaded();
        assert_ne!(a.id, b.id);
        assert_eq!(a.tenancy, "primary");
        assert_eq!(a.name(), "tenant.loaded");
    }

    #[test]
    fn test_dispatcher_continues_after_failure() {
        let dispatcher = EventDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));

        dispatcher.listen(|_: &TenantEvent| -> Result<(), ListenerError> {
            Err(ListenerError::Failed("boom".to_string()))
        });
        let counter = Arc::clone(&calls);
        dispatcher.listen(move |_: &TenantEvent| -> Result<(), ListenerError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher.publish(loaded());
        dispatcher.publish(loaded());

        assert_eq!(dispatcher.listener_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_broadcast_sink() {
        let sink = BroadcastSink::new(8);
        sink.publish(loaded());

        let mut receiver = sink.subscribe();
        sink.publish(loaded());

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name(), "tenant.loaded");
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.publish(loaded());
        assert_eq!(sink.names(), vec!["tenant.loaded"]);
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
