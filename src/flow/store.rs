use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::FlowError;
use crate::flow::types::{FlowStage, FlowStageHistory, PatientFlowState, Priority};

/// Flow state created externally at the check-in surface.
#[derive(Debug, Clone)]
pub struct CheckInRequest {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub priority: Priority,
    pub initial_stage: FlowStage,
    pub notes: Option<String>,
}

#[derive(Debug)]
struct FlowRecord {
    state: PatientFlowState,
    history: Vec<FlowStageHistory>,
}

impl FlowRecord {
    fn open_row_index(&self) -> Option<usize> {
        self.history.iter().position(|row| row.is_open())
    }

    /// Closes the open ledger row and opens exactly one row for the new
    /// stage. Called only while holding the store lock, so the one-open-row
    /// invariant cannot be observed broken.
    fn transition(&mut self, new_stage: FlowStage, now: DateTime<Utc>, notes: Option<&str>) {
        if let Some(idx) = self.open_row_index() {
            self.history[idx].exited_at = Some(now);
        }
        self.history.push(FlowStageHistory {
            id: Uuid::new_v4(),
            flow_state_id: self.state.id,
            stage: new_stage,
            entered_at: now,
            exited_at: None,
            notes: notes.map(str::to_string),
        });
        self.state.stage = new_stage;
        self.state.version += 1;
    }
}

/// Owns `PatientFlowState` records and their stage-history ledger, keyed by
/// appointment. Commit operations re-validate stage preconditions under the
/// store lock so a check-then-act caller cannot race past them.
pub struct FlowStateStore {
    records: Mutex<HashMap<Uuid, FlowRecord>>,
}

impl FlowStateStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(HashMap::new()),
        })
    }

    /// Creates the flow state for a freshly checked-in appointment and opens
    /// the first ledger row. At most one non-terminal flow state may exist
    /// per appointment.
    pub async fn check_in(
        &self,
        request: CheckInRequest,
        now: DateTime<Utc>,
    ) -> Result<PatientFlowState, FlowError> {
        if !request.initial_stage.is_initial() {
            return Err(FlowError::Validation(format!(
                "check-in cannot start at stage {}",
                request.initial_stage
            )));
        }

        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(&request.appointment_id) {
            if !existing.state.stage.is_terminal() {
                return Err(FlowError::Validation(format!(
                    "appointment {} already has an active flow state",
                    request.appointment_id
                )));
            }
        }

        let state = PatientFlowState {
            id: Uuid::new_v4(),
            appointment_id: request.appointment_id,
            patient_id: request.patient_id,
            provider_id: request.provider_id,
            chair_id: None,
            stage: request.initial_stage,
            priority: request.priority,
            scheduled_at: request.scheduled_at,
            checked_in_at: Some(now),
            current_wait_started_at: Some(now),
            seated_at: None,
            checked_out_at: None,
            notes: request.notes.clone(),
            version: 1,
        };
        let first_row = FlowStageHistory {
            id: Uuid::new_v4(),
            flow_state_id: state.id,
            stage: request.initial_stage,
            entered_at: now,
            exited_at: None,
            notes: request.notes,
        };
        records.insert(
            request.appointment_id,
            FlowRecord {
                state: state.clone(),
                history: vec![first_row],
            },
        );
        Ok(state)
    }

    pub async fn get(&self, appointment_id: Uuid) -> Option<PatientFlowState> {
        let records = self.records.lock().await;
        records.get(&appointment_id).map(|r| r.state.clone())
    }

    pub async fn history(&self, appointment_id: Uuid) -> Vec<FlowStageHistory> {
        let records = self.records.lock().await;
        records
            .get(&appointment_id)
            .map(|r| r.history.clone())
            .unwrap_or_default()
    }

    /// Snapshot of every flow state, for read-only projections.
    pub async fn snapshot(&self) -> Vec<PatientFlowState> {
        let records = self.records.lock().await;
        records.values().map(|r| r.state.clone()).collect()
    }

    /// Commits the seat transition. Preconditions are re-validated here,
    /// inside the lock, against the live record: the stage read by the
    /// coordinator may have moved underneath it.
    pub async fn commit_seat(
        &self,
        appointment_id: Uuid,
        expected_version: u64,
        chair_id: Uuid,
        now: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<PatientFlowState, FlowError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&appointment_id)
            .ok_or_else(|| FlowError::flow_not_found(appointment_id))?;

        if !record.state.stage.can_seat() {
            return Err(FlowError::InvalidStage {
                from: record.state.stage,
                action: "seat",
            });
        }
        if record.state.version != expected_version {
            return Err(FlowError::Internal(format!(
                "flow state for appointment {} changed concurrently",
                appointment_id
            )));
        }

        record.state.chair_id = Some(chair_id);
        record.state.seated_at = Some(now);
        record.state.current_wait_started_at = None;
        if let Some(notes) = notes {
            record.state.notes = Some(notes.to_string());
        }
        record.transition(FlowStage::InChair, now, notes);
        Ok(record.state.clone())
    }

    /// Commits the checkout transition; only valid from `Completed`.
    pub async fn commit_check_out(
        &self,
        appointment_id: Uuid,
        now: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<PatientFlowState, FlowError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&appointment_id)
            .ok_or_else(|| FlowError::flow_not_found(appointment_id))?;

        if record.state.stage != FlowStage::Completed {
            return Err(FlowError::InvalidStage {
                from: record.state.stage,
                action: "check_out",
            });
        }

        record.state.checked_out_at = Some(now);
        if let Some(notes) = notes {
            record.state.notes = Some(notes.to_string());
        }
        record.transition(FlowStage::CheckedOut, now, notes);
        Ok(record.state.clone())
    }

    /// Advances a queued or in-treatment flow state one step along the stage
    /// graph (CheckedIn→Waiting→Called, InChair→Completed). Seating and
    /// checkout have their own commit paths with wider effects.
    pub async fn commit_advance(
        &self,
        appointment_id: Uuid,
        target: FlowStage,
        now: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<PatientFlowState, FlowError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&appointment_id)
            .ok_or_else(|| FlowError::flow_not_found(appointment_id))?;

        let allowed = record.state.stage.next() == Some(target)
            && !matches!(target, FlowStage::InChair | FlowStage::CheckedOut);
        if !allowed {
            return Err(FlowError::InvalidStage {
                from: record.state.stage,
                action: "advance",
            });
        }

        // Entering a new waiting point restarts the wait timer.
        if target.is_queued() {
            record.state.current_wait_started_at = Some(now);
        }
        record.transition(target, now, notes);
        Ok(record.state.clone())
    }
}
