//! Best-effort audit trail.
//!
//! Handlers emit events without waiting; a listener task appends them
//! through an [`AuditSink`]. A failed append is logged and dropped, never
//! surfaced to the operation that produced it.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use deptledger_shared::AppError;

use super::event::AuditEvent;

/// Persistent destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// Appends one event.
    async fn append(&self, event: &AuditEvent) -> Result<(), AppError>;
}

/// Handle used to emit audit events.
#[derive(Debug, Clone)]
pub struct AuditTrail {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl AuditTrail {
    /// Spawns the listener task draining events into `sink`.
    ///
    /// The task ends once every `AuditTrail` clone has been dropped and the
    /// queue is drained. Must be called inside a Tokio runtime.
    pub fn spawn<S: AuditSink>(sink: S) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEvent>();

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = sink.append(&event).await {
                    tracing::error!(
                        action = event.action.as_str(),
                        entity_type = %event.entity_type,
                        entity_id = ?event.entity_id,
                        error = %e,
                        "Failed to persist audit event"
                    );
                }
            }
            tracing::debug!("Audit listener stopped");
        });

        (Self { tx }, handle)
    }

    /// Queues an event. Never fails.
    pub fn emit(&self, event: AuditEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            tracing::error!(
                action = event.action.as_str(),
                entity_id = ?event.entity_id,
                "Audit listener is not running, event dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::AuditAction;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct CollectingSink {
        events: Arc<Mutex<Vec<AuditEvent>>>,
    }

    #[async_trait]
    impl AuditSink for CollectingSink {
        async fn append(&self, event: &AuditEvent) -> Result<(), AppError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// Fails every other append.
    #[derive(Clone, Default)]
    struct FlakySink {
        calls: Arc<Mutex<u32>>,
        stored: Arc<Mutex<Vec<AuditAction>>>,
    }

    #[async_trait]
    impl AuditSink for FlakySink {
        async fn append(&self, event: &AuditEvent) -> Result<(), AppError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls % 2 == 1 {
                return Err(AppError::Database("connection reset".into()));
            }
            self.stored.lock().unwrap().push(event.action);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_events_are_persisted_in_order() {
        let sink = CollectingSink::default();
        let (trail, handle) = AuditTrail::spawn(sink.clone());

        trail.emit(AuditEvent::new(AuditAction::ExpenseCreate, Some(Uuid::now_v7())));
        trail.emit(AuditEvent::new(AuditAction::ExpenseApprove, Some(Uuid::now_v7())));
        drop(trail);
        handle.await.unwrap();

        let events = sink.events.lock().unwrap();
        let actions: Vec<_> = events.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::ExpenseCreate, AuditAction::ExpenseApprove]
        );
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_listener() {
        let sink = FlakySink::default();
        let (trail, handle) = AuditTrail::spawn(sink.clone());

        trail.emit(AuditEvent::new(AuditAction::BudgetCreate, None));
        trail.emit(AuditEvent::new(AuditAction::BudgetUpdate, None));
        trail.emit(AuditEvent::new(AuditAction::BudgetDelete, None));
        drop(trail);
        handle.await.unwrap();

        assert_eq!(*sink.calls.lock().unwrap(), 3);
        assert_eq!(*sink.stored.lock().unwrap(), vec![AuditAction::BudgetUpdate]);
    }

    #[tokio::test]
    async fn test_emit_after_listener_gone_does_not_panic() {
        let (trail, handle) = AuditTrail::spawn(CollectingSink::default());
        handle.abort();
        let _ = handle.await;

        trail.emit(AuditEvent::new(AuditAction::AuthDenied, None));
    }
}
