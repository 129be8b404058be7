//! Event capture for assertions.

use std::sync::{Arc, Mutex, PoisonError};
use storefront_core::event::{DomainEvent, DomainObserver, EventPublisher};

/// Observer that keeps every event it sees.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events observed so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Event type names observed so far, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::event_type).collect()
    }
}

impl DomainObserver for RecordingObserver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn observe(&self, event: &DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Publisher that records synchronously instead of queueing.
///
/// Lets service tests assert on emitted events without running the audit worker.
#[derive(Clone, Debug, Default)]
pub struct RecordingPublisher {
    recorder: RecordingObserver,
}

impl RecordingPublisher {
    /// Create an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.recorder.events()
    }

    /// Event type names published so far, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.recorder.event_types()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: DomainEvent) {
        self.recorder.observe(&event);
    }
}
