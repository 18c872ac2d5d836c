use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step in a patient visit's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStage {
    CheckedIn,
    Waiting,
    Called,
    InChair,
    Completed,
    CheckedOut,
}

impl FlowStage {
    /// Stages a flow state may start in at check-in.
    pub fn is_initial(self) -> bool {
        matches!(self, FlowStage::CheckedIn | FlowStage::Waiting)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FlowStage::CheckedOut)
    }

    /// The single forward edge in the stage graph.
    pub fn next(self) -> Option<FlowStage> {
        match self {
            FlowStage::CheckedIn => Some(FlowStage::Waiting),
            FlowStage::Waiting => Some(FlowStage::Called),
            FlowStage::Called => Some(FlowStage::InChair),
            FlowStage::InChair => Some(FlowStage::Completed),
            FlowStage::Completed => Some(FlowStage::CheckedOut),
            FlowStage::CheckedOut => None,
        }
    }

    /// Whether a patient in this stage may be seated in a chair. Seating
    /// skips intermediate stages: front desk can seat straight from
    /// check-in when the chair is ready.
    pub fn can_seat(self) -> bool {
        matches!(
            self,
            FlowStage::CheckedIn | FlowStage::Waiting | FlowStage::Called
        )
    }

    /// Stages that appear in the live waiting-room queue.
    pub fn is_queued(self) -> bool {
        matches!(
            self,
            FlowStage::CheckedIn | FlowStage::Waiting | FlowStage::Called
        )
    }

    /// Chair linkage is only meaningful once the patient has been seated.
    pub fn carries_chair(self) -> bool {
        matches!(
            self,
            FlowStage::InChair | FlowStage::Completed | FlowStage::CheckedOut
        )
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FlowStage::CheckedIn => "CHECKED_IN",
            FlowStage::Waiting => "WAITING",
            FlowStage::Called => "CALLED",
            FlowStage::InChair => "IN_CHAIR",
            FlowStage::Completed => "COMPLETED",
            FlowStage::CheckedOut => "CHECKED_OUT",
        };
        write!(f, "{}", label)
    }
}

/// Priority tiers for queue ordering. Higher values jump the queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Urgent = 3,
}

impl Priority {
    pub fn value(self) -> u32 {
        self as u32
    }

    pub fn is_elevated(self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Urgent => "URGENT",
            Priority::High => "HIGH",
            Priority::Normal => "NORMAL",
            Priority::Low => "LOW",
        };
        write!(f, "{}", label)
    }
}

/// Live flow record: one per active appointment per day. Created at
/// check-in, mutated only by the transition coordinator, retained after
/// checkout for wait-time analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientFlowState {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub chair_id: Option<Uuid>,
    pub stage: FlowStage,
    pub priority: Priority,
    pub scheduled_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub current_wait_started_at: Option<DateTime<Utc>>,
    pub seated_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Optimistic concurrency token; bumped on every committed transition.
    pub version: u64,
}

impl PatientFlowState {
    /// Invariant check: chair linkage set iff the stage carries a chair.
    pub fn chair_linkage_consistent(&self) -> bool {
        self.chair_id.is_some() == self.stage.carries_chair()
    }
}

/// Append-only stage ledger row. A transition closes the open row and opens
/// exactly one new row; at most one row per flow state has `exited_at` unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStageHistory {
    pub id: Uuid,
    pub flow_state_id: Uuid,
    pub stage: FlowStage,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl FlowStageHistory {
    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_graph_is_linear() {
        assert_eq!(FlowStage::CheckedIn.next(), Some(FlowStage::Waiting));
        assert_eq!(FlowStage::Waiting.next(), Some(FlowStage::Called));
        assert_eq!(FlowStage::Called.next(), Some(FlowStage::InChair));
        assert_eq!(FlowStage::InChair.next(), Some(FlowStage::Completed));
        assert_eq!(FlowStage::Completed.next(), Some(FlowStage::CheckedOut));
        assert_eq!(FlowStage::CheckedOut.next(), None);
    }

    #[test]
    fn test_seatable_stages() {
        assert!(FlowStage::CheckedIn.can_seat());
        assert!(FlowStage::Waiting.can_seat());
        assert!(FlowStage::Called.can_seat());
        assert!(!FlowStage::InChair.can_seat());
        assert!(!FlowStage::Completed.can_seat());
        assert!(!FlowStage::CheckedOut.can_seat());
    }

    #[test]
    fn test_chair_linkage_stages() {
        assert!(!FlowStage::Called.carries_chair());
        assert!(FlowStage::InChair.carries_chair());
        assert!(FlowStage::Completed.carries_chair());
        assert!(FlowStage::CheckedOut.carries_chair());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(Priority::Urgent.to_string(), "URGENT");
        assert_eq!(Priority::High.to_string(), "HIGH");
        assert_eq!(Priority::Normal.to_string(), "NORMAL");
        assert_eq!(Priority::Low.to_string(), "LOW");
    }
}
