//! Best-effort audit trail for domain events.
//!
//! Services publish into a bounded channel with `try_send`, so publishing
//! never blocks and never fails the business operation. A single worker task
//! hands each event to every registered observer. When the channel is full the
//! event is dropped with a warning and a metric.

use crate::metrics::AuditMetrics;
use std::sync::Arc;
use storefront_core::event::{DomainEvent, DomainObserver, EventPublisher};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Tracing target of audit records.
pub const AUDIT_TARGET: &str = "storefront::audit";

/// Publisher side of the audit queue. Cheap to clone.
///
/// The worker stops once every clone has been dropped and the channel drained.
#[derive(Clone, Debug)]
pub struct AuditQueue {
    sender: mpsc::Sender<DomainEvent>,
}

impl AuditQueue {
    /// Start the worker and return the publisher plus the worker handle.
    ///
    /// The handle resolves to the number of events delivered.
    #[must_use]
    pub fn spawn(
        observers: Vec<Arc<dyn DomainObserver>>,
        capacity: usize,
    ) -> (Self, JoinHandle<u64>) {
        let (sender, mut receiver) = mpsc::channel::<DomainEvent>(capacity.max(1));

        let worker = tokio::spawn(async move {
            let mut delivered = 0_u64;
            while let Some(event) = receiver.recv().await {
                for observer in &observers {
                    observer.observe(&event);
                }
                delivered += 1;
            }
            tracing::debug!(delivered, "Audit worker stopped");
            delivered
        });

        (Self { sender }, worker)
    }
}

impl EventPublisher for AuditQueue {
    fn publish(&self, event: DomainEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                AuditMetrics::record_dropped("full");
                tracing::warn!(event = event.event_type(), "Audit queue full, event dropped");
            }
            Err(TrySendError::Closed(event)) => {
                AuditMetrics::record_dropped("closed");
                tracing::warn!(event = event.event_type(), "Audit queue closed, event dropped");
            }
        }
    }
}

/// Writes every event to the audit log target with structured fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuditLogObserver;

impl DomainObserver for AuditLogObserver {
    fn name(&self) -> &'static str {
        "audit-log"
    }

    fn observe(&self, event: &DomainEvent) {
        let kind = event.event_type();
        match event {
            DomainEvent::CartItemAdded {
                user_id,
                item_id,
                product_id,
                quantity,
                line_quantity,
                at,
            } => tracing::info!(
                target: AUDIT_TARGET,
                event = kind,
                %user_id,
                %item_id,
                %product_id,
                quantity,
                line_quantity,
                %at,
                "Cart item added"
            ),
            DomainEvent::CartItemUpdated {
                user_id,
                item_id,
                product_id,
                old_quantity,
                new_quantity,
                at,
            } => tracing::info!(
                target: AUDIT_TARGET,
                event = kind,
                %user_id,
                %item_id,
                %product_id,
                old_quantity,
                new_quantity,
                %at,
                "Cart item updated"
            ),
            DomainEvent::CartItemRemoved {
                user_id,
                item_id,
                product_id,
                quantity,
                at,
            } => tracing::info!(
                target: AUDIT_TARGET,
                event = kind,
                %user_id,
                %item_id,
                %product_id,
                quantity,
                %at,
                "Cart item removed"
            ),
            DomainEvent::CartCleared {
                user_id,
                removed,
                at,
            } => tracing::info!(
                target: AUDIT_TARGET,
                event = kind,
                %user_id,
                removed,
                %at,
                "Cart cleared"
            ),
            DomainEvent::OrderPlaced {
                order_id,
                order_number,
                user_id,
                total,
                item_count,
                at,
            } => tracing::info!(
                target: AUDIT_TARGET,
                event = kind,
                %order_id,
                %order_number,
                %user_id,
                total_cents = total.cents(),
                item_count,
                %at,
                "Order placed"
            ),
            DomainEvent::OrderCancelled {
                order_id,
                order_number,
                user_id,
                reason,
                restored_units,
                at,
            } => tracing::info!(
                target: AUDIT_TARGET,
                event = kind,
                %order_id,
                %order_number,
                %user_id,
                reason = reason.as_deref().unwrap_or(""),
                restored_units,
                %at,
                "Order cancelled"
            ),
            DomainEvent::OrderStatusChanged {
                order_id,
                order_number,
                from,
                to,
                at,
            } => tracing::info!(
                target: AUDIT_TARGET,
                event = kind,
                %order_id,
                %order_number,
                %from,
                %to,
                %at,
                "Order status changed"
            ),
            DomainEvent::PaymentStatusChanged {
                order_id,
                order_number,
                from,
                to,
                at,
            } => tracing::info!(
                target: AUDIT_TARGET,
                event = kind,
                %order_id,
                %order_number,
                %from,
                %to,
                %at,
                "Payment status changed"
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use storefront_core::UserId;
    use storefront_core::environment::Clock;
    use storefront_testing::{RecordingObserver, test_clock};

    fn cleared(removed: u64) -> DomainEvent {
        DomainEvent::CartCleared {
            user_id: UserId::new(),
            removed,
            at: test_clock().now(),
        }
    }

    #[tokio::test]
    async fn worker_delivers_to_every_observer_in_order() {
        let first = RecordingObserver::new();
        let second = RecordingObserver::new();
        let (queue, worker) = AuditQueue::spawn(
            vec![
                Arc::new(first.clone()),
                Arc::new(second.clone()),
                Arc::new(AuditLogObserver),
            ],
            16,
        );

        queue.publish(cleared(1));
        queue.publish(cleared(2));
        drop(queue);

        assert_eq!(worker.await.unwrap(), 2);
        assert_eq!(first.events(), second.events());
        assert!(matches!(first.events()[1], DomainEvent::CartCleared { removed: 2, .. }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops_without_blocking() {
        let recorder = RecordingObserver::new();
        let (queue, worker) = AuditQueue::spawn(vec![Arc::new(recorder.clone())], 1);

        // The worker cannot run until this task yields, so the second publish
        // finds the single slot taken.
        queue.publish(cleared(1));
        queue.publish(cleared(2));
        drop(queue);

        assert_eq!(worker.await.unwrap(), 1);
        assert_eq!(recorder.events().len(), 1);
    }

    #[tokio::test]
    async fn publishing_after_worker_exit_is_harmless() {
        let (queue, worker) = AuditQueue::spawn(vec![], 4);
        worker.abort();
        let _ = worker.await;
        queue.publish(cleared(0));
    }
}
