use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::FlowError;
use crate::occupancy::types::{
    ActivitySubStage, BlockType, OccupancyStatus, ResourceOccupancy,
};

/// Parameters for claiming a chair on behalf of an appointment.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub chair_id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub expected_free_at: DateTime<Utc>,
    pub assigned_staff_id: Option<Uuid>,
}

/// Result of a successful claim: the committed row plus the pre-claim
/// snapshot, kept so a failed later step can roll the claim back.
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub occupancy: ResourceOccupancy,
    pub previous: Option<ResourceOccupancy>,
}

/// Single source of truth for chair state, independent of flow semantics.
/// One row per (clinic, chair); every write is a compare-and-swap under the
/// row map's lock, so two concurrent claims for different appointments
/// resolve to exactly one winner.
pub struct ResourceOccupancyManager {
    rows: Mutex<HashMap<Uuid, ResourceOccupancy>>,
}

impl ResourceOccupancyManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(HashMap::new()),
        })
    }

    /// Current occupancy, normalized for lazy expiry: a lapsed block reads
    /// as FREE even though storage still carries the block row.
    pub async fn get(&self, chair_id: Uuid, now: DateTime<Utc>) -> Option<ResourceOccupancy> {
        let rows = self.rows.lock().await;
        rows.get(&chair_id).map(|row| Self::normalized(row, now))
    }

    fn normalized(row: &ResourceOccupancy, now: DateTime<Utc>) -> ResourceOccupancy {
        if row.block_lapsed(now) {
            let mut freed = ResourceOccupancy::free(row.chair_id, row.clinic_id);
            freed.version = row.version;
            freed
        } else {
            row.clone()
        }
    }

    /// A chair is available unless held (OCCUPIED/BLOCKED/MAINTENANCE/
    /// CLEANING after lazy expiry). A chair already occupied by the
    /// requesting appointment itself counts as available (re-entrant seat).
    pub async fn is_available(
        &self,
        chair_id: Uuid,
        now: DateTime<Utc>,
        for_appointment: Option<Uuid>,
    ) -> bool {
        let rows = self.rows.lock().await;
        match rows.get(&chair_id) {
            None => true,
            Some(row) => Self::row_available(row, now, for_appointment),
        }
    }

    fn row_available(
        row: &ResourceOccupancy,
        now: DateTime<Utc>,
        for_appointment: Option<Uuid>,
    ) -> bool {
        let row = Self::normalized(row, now);
        match row.status {
            OccupancyStatus::Free => true,
            OccupancyStatus::Occupied => row.appointment_id == for_appointment,
            OccupancyStatus::Blocked
            | OccupancyStatus::Maintenance
            | OccupancyStatus::Cleaning => false,
        }
    }

    /// Claims the chair for an appointment. Availability is checked and the
    /// OCCUPIED row written under one lock acquisition; a losing concurrent
    /// claim observes the winner's row and fails with no side effects.
    pub async fn claim(
        &self,
        request: ClaimRequest,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, FlowError> {
        let mut rows = self.rows.lock().await;
        let previous = rows.get(&request.chair_id).cloned();

        if let Some(row) = &previous {
            if !Self::row_available(row, now, Some(request.appointment_id)) {
                return Err(FlowError::ChairUnavailable {
                    chair_id: request.chair_id,
                });
            }
        }

        let version = previous.as_ref().map(|row| row.version).unwrap_or(0);
        let occupancy = ResourceOccupancy {
            chair_id: request.chair_id,
            clinic_id: request.clinic_id,
            status: OccupancyStatus::Occupied,
            appointment_id: Some(request.appointment_id),
            patient_id: Some(request.patient_id),
            occupied_at: Some(now),
            expected_free_at: Some(request.expected_free_at),
            // Claiming clears any stale block and staff linkage.
            block_reason: None,
            blocked_until: None,
            activity_sub_stage: Some(ActivitySubStage::Setup),
            sub_stage_started_at: Some(now),
            assigned_staff_id: request.assigned_staff_id,
            version: version + 1,
        };
        rows.insert(request.chair_id, occupancy.clone());
        Ok(ClaimOutcome {
            occupancy,
            previous,
        })
    }

    /// Compensating rollback: restores the pre-claim snapshot after a later
    /// step of the seat transaction fails. Only undoes the row the claim
    /// wrote; a row committed by someone else in between is left alone.
    pub async fn restore(
        &self,
        chair_id: Uuid,
        claimed_version: u64,
        previous: Option<ResourceOccupancy>,
    ) {
        let mut rows = self.rows.lock().await;
        let still_ours = rows
            .get(&chair_id)
            .map(|row| row.version == claimed_version)
            .unwrap_or(false);
        if !still_ours {
            return;
        }
        match previous {
            Some(row) => {
                rows.insert(chair_id, row);
            }
            None => {
                rows.remove(&chair_id);
            }
        }
    }

    /// Places a non-patient reservation on the chair. Fails when a patient
    /// currently holds it.
    pub async fn block(
        &self,
        chair_id: Uuid,
        clinic_id: Uuid,
        block_type: BlockType,
        reason: &str,
        blocked_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<ResourceOccupancy, FlowError> {
        let mut rows = self.rows.lock().await;
        let current = rows.get(&chair_id).map(|row| Self::normalized(row, now));
        if let Some(row) = &current {
            if row.status == OccupancyStatus::Occupied {
                return Err(FlowError::ChairOccupied { chair_id });
            }
        }

        let version = current.map(|row| row.version).unwrap_or(0);
        let occupancy = ResourceOccupancy {
            chair_id,
            clinic_id,
            status: block_type.status(),
            appointment_id: None,
            patient_id: None,
            occupied_at: None,
            expected_free_at: None,
            block_reason: Some(reason.to_string()),
            blocked_until,
            activity_sub_stage: None,
            sub_stage_started_at: None,
            assigned_staff_id: None,
            version: version + 1,
        };
        rows.insert(chair_id, occupancy.clone());
        debug_assert!(occupancy.linkage_consistent());
        Ok(occupancy)
    }

    /// Frees the chair. Used by the completion step and by explicit
    /// unblocking.
    pub async fn release(&self, chair_id: Uuid) -> Option<ResourceOccupancy> {
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(&chair_id)?;
        let clinic_id = row.clinic_id;
        let version = row.version;
        let mut freed = ResourceOccupancy::free(chair_id, clinic_id);
        freed.version = version + 1;
        *row = freed.clone();
        Some(freed)
    }

    /// Moves an occupied chair between SETUP / TREATMENT / TEARDOWN.
    pub async fn set_sub_stage(
        &self,
        chair_id: Uuid,
        sub_stage: ActivitySubStage,
        now: DateTime<Utc>,
    ) -> Result<ResourceOccupancy, FlowError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(&chair_id)
            .ok_or_else(|| FlowError::chair_not_found(chair_id))?;
        if row.status != OccupancyStatus::Occupied {
            return Err(FlowError::Validation(format!(
                "chair {} is {}, not OCCUPIED",
                chair_id, row.status
            )));
        }
        row.activity_sub_stage = Some(sub_stage);
        row.sub_stage_started_at = Some(now);
        row.version += 1;
        Ok(row.clone())
    }
}
