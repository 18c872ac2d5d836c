use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current holder class of a treatment chair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccupancyStatus {
    Free,
    Occupied,
    Blocked,
    Maintenance,
    Cleaning,
}

impl OccupancyStatus {
    /// Non-patient reservations: cleaning, maintenance, ad-hoc blocks.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            OccupancyStatus::Blocked | OccupancyStatus::Maintenance | OccupancyStatus::Cleaning
        )
    }
}

impl fmt::Display for OccupancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OccupancyStatus::Free => "FREE",
            OccupancyStatus::Occupied => "OCCUPIED",
            OccupancyStatus::Blocked => "BLOCKED",
            OccupancyStatus::Maintenance => "MAINTENANCE",
            OccupancyStatus::Cleaning => "CLEANING",
        };
        write!(f, "{}", label)
    }
}

/// Kind of non-patient reservation placed on a chair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Cleaning,
    Maintenance,
    Blocked,
}

impl BlockType {
    pub fn status(self) -> OccupancyStatus {
        match self {
            BlockType::Cleaning => OccupancyStatus::Cleaning,
            BlockType::Maintenance => OccupancyStatus::Maintenance,
            BlockType::Blocked => OccupancyStatus::Blocked,
        }
    }
}

/// Where an occupied chair is within the treatment activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivitySubStage {
    Setup,
    Treatment,
    Teardown,
}

/// Exclusive-use record asserting which appointment, if any, currently
/// holds a treatment chair. One row per chair; current state only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOccupancy {
    pub chair_id: Uuid,
    pub clinic_id: Uuid,
    pub status: OccupancyStatus,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub occupied_at: Option<DateTime<Utc>>,
    pub expected_free_at: Option<DateTime<Utc>>,
    pub block_reason: Option<String>,
    pub blocked_until: Option<DateTime<Utc>>,
    pub activity_sub_stage: Option<ActivitySubStage>,
    pub sub_stage_started_at: Option<DateTime<Utc>>,
    pub assigned_staff_id: Option<Uuid>,
    pub version: u64,
}

impl ResourceOccupancy {
    pub fn free(chair_id: Uuid, clinic_id: Uuid) -> Self {
        Self {
            chair_id,
            clinic_id,
            status: OccupancyStatus::Free,
            appointment_id: None,
            patient_id: None,
            occupied_at: None,
            expected_free_at: None,
            block_reason: None,
            blocked_until: None,
            activity_sub_stage: None,
            sub_stage_started_at: None,
            assigned_staff_id: None,
            version: 0,
        }
    }

    /// A block whose `blocked_until` has passed no longer binds. Storage is
    /// not proactively swept; every read must apply this.
    pub fn block_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status.is_block()
            && self
                .blocked_until
                .map(|until| until <= now)
                .unwrap_or(false)
    }

    /// Occupied rows must carry their patient linkage; blocks must not.
    pub fn linkage_consistent(&self) -> bool {
        match self.status {
            OccupancyStatus::Occupied => {
                self.appointment_id.is_some() && self.patient_id.is_some()
            }
            OccupancyStatus::Blocked
            | OccupancyStatus::Maintenance
            | OccupancyStatus::Cleaning => self.appointment_id.is_none(),
            OccupancyStatus::Free => true,
        }
    }
}

/// Dashboard-facing view of a chair's state after a block or release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancySummary {
    pub chair_id: Uuid,
    pub status: OccupancyStatus,
    pub block_reason: Option<String>,
    pub blocked_until: Option<DateTime<Utc>>,
    pub expected_free_at: Option<DateTime<Utc>>,
}

impl From<&ResourceOccupancy> for OccupancySummary {
    fn from(occupancy: &ResourceOccupancy) -> Self {
        Self {
            chair_id: occupancy.chair_id,
            status: occupancy.status,
            block_reason: occupancy.block_reason.clone(),
            blocked_until: occupancy.blocked_until,
            expected_free_at: occupancy.expected_free_at,
        }
    }
}
