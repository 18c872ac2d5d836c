use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Who performed a transition and from where, as reported by the calling
/// surface. The engine records it verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    pub staff_id: Option<Uuid>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Emitted after every successful transition, and only then. Failed or
/// rolled-back transitions leave no audit trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub entity: String,
    pub entity_id: Uuid,
    pub details: Value,
    pub actor: Actor,
}

/// Sink for audit events. Delivery mechanics (queueing, retention) belong
/// to the collaborator behind this trait.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Reference sink: emits audit events as structured log lines.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        tracing::info!(
            action = %event.action,
            entity = %event.entity,
            entity_id = %event.entity_id,
            details = %event.details,
            staff_id = ?event.actor.staff_id,
            "audit event"
        );
    }
}

/// Captures events in memory so tests can assert on the audit trail.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) {
        self.events.lock().await.push(event);
    }
}
