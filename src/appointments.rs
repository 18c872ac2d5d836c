use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::FlowError;

/// Scheduling status of the appointment record owned by the scheduling
/// collaborator. The flow engine only reads it and flips it to InProgress
/// on seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

/// The slice of the appointment record this engine consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: Uuid,
    pub status: AppointmentStatus,
    pub duration_minutes: Option<i64>,
    pub chair_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Narrow seam over the scheduling system. Read for the treatment duration
/// default; written once, on seat.
#[async_trait]
pub trait AppointmentDirectory: Send + Sync {
    async fn get(&self, appointment_id: Uuid) -> Option<AppointmentRecord>;

    /// Marks the appointment in progress on the given chair with the seat
    /// timestamp.
    async fn mark_in_progress(
        &self,
        appointment_id: Uuid,
        chair_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), FlowError>;

    /// Undoes `mark_in_progress` during a compensating rollback.
    async fn revert_in_progress(
        &self,
        appointment_id: Uuid,
        previous: AppointmentRecord,
    ) -> Result<(), FlowError>;
}

/// In-memory directory used in tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryAppointmentDirectory {
    records: Mutex<HashMap<Uuid, AppointmentRecord>>,
}

impl InMemoryAppointmentDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn upsert(&self, record: AppointmentRecord) {
        self.records.lock().await.insert(record.id, record);
    }
}

#[async_trait]
impl AppointmentDirectory for InMemoryAppointmentDirectory {
    async fn get(&self, appointment_id: Uuid) -> Option<AppointmentRecord> {
        self.records.lock().await.get(&appointment_id).cloned()
    }

    async fn mark_in_progress(
        &self,
        appointment_id: Uuid,
        chair_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), FlowError> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(&appointment_id).ok_or(FlowError::NotFound {
            entity: "appointment",
            id: appointment_id,
        })?;
        record.status = AppointmentStatus::InProgress;
        record.chair_id = Some(chair_id);
        record.started_at = Some(started_at);
        Ok(())
    }

    async fn revert_in_progress(
        &self,
        appointment_id: Uuid,
        previous: AppointmentRecord,
    ) -> Result<(), FlowError> {
        let mut records = self.records.lock().await;
        records.insert(appointment_id, previous);
        Ok(())
    }
}
