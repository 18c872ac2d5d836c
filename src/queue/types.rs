use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flow::{FlowStage, PatientFlowState, Priority};

/// Wait-time bucket shown on the queue dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStatus {
    Normal,
    Warning,
    Critical,
}

impl fmt::Display for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WaitStatus::Normal => "normal",
            WaitStatus::Warning => "warning",
            WaitStatus::Critical => "critical",
        };
        write!(f, "{}", label)
    }
}

/// One patient in the live queue view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub flow_state_id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub stage: FlowStage,
    pub priority: Priority,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub wait_minutes: i64,
    pub wait_status: WaitStatus,
}

/// Queue entries grouped by stage bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueBuckets {
    pub checked_in: Vec<QueueEntry>,
    pub waiting: Vec<QueueEntry>,
    pub called: Vec<QueueEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSummary {
    pub total: usize,
    pub checked_in_count: usize,
    pub waiting_count: usize,
    pub called_count: usize,
    pub average_wait_minutes: f64,
    pub longest_wait_minutes: i64,
    pub urgent_count: usize,
    pub high_priority_count: usize,
}

/// Full dashboard payload: ordered queue, stage buckets, summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueProjection {
    pub queue: Vec<QueueEntry>,
    pub grouped: QueueBuckets,
    pub summary: QueueSummary,
}

/// Flow listing row with the computed live wait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStateView {
    #[serde(flatten)]
    pub state: PatientFlowState,
    pub current_wait_minutes: Option<i64>,
}

/// Filters for the day's flow listing.
#[derive(Debug, Clone, Default)]
pub struct FlowListFilter {
    pub date: Option<chrono::NaiveDate>,
    pub stage: Option<FlowStage>,
    pub provider_id: Option<Uuid>,
    pub chair_id: Option<Uuid>,
}
