use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::appointments::{AppointmentDirectory, AppointmentStatus};
use crate::audit::{Actor, AuditEvent, AuditSink};
use crate::chairs::ChairRegistry;
use crate::clock::Clock;
use crate::config::ClinicConfig;
use crate::error::FlowError;
use crate::flow::{FlowStage, FlowStateStore, PatientFlowState};
use crate::occupancy::{
    ActivitySubStage, BlockType, ClaimRequest, OccupancySummary, ResourceOccupancyManager,
};
use crate::queue::{FlowListFilter, FlowStateView, QueueProjection, QueueProjector};
use crate::telemetry::{create_transition_span, generate_correlation_id};

/// When a chair block lapses.
#[derive(Debug, Clone, Copy)]
pub enum BlockUntil {
    /// Absolute expiry instant.
    At(DateTime<Utc>),
    /// Relative expiry, resolved as now + minutes.
    Minutes(i64),
    /// No expiry; the block holds until explicitly cleared.
    Indefinite,
}

impl BlockUntil {
    fn resolve(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            BlockUntil::At(instant) => Some(instant),
            BlockUntil::Minutes(minutes) => Some(now + Duration::minutes(minutes)),
            BlockUntil::Indefinite => None,
        }
    }
}

/// Orchestrates stage transitions across the flow store and the occupancy
/// manager. Every stage-changing operation updates the flow record, closes
/// the open ledger row and opens the new one as one unit; the occupancy row
/// is the serialization point for who may hold a chair.
///
/// Transaction shape for seat: claim the chair (CAS), write the appointment
/// record, then commit the flow mutation. The flow commit re-validates its
/// preconditions under the store lock and is the point of no return; any
/// failure before or at that point rolls the earlier writes back, so a
/// half-applied seat is never observable.
pub struct TransitionCoordinator {
    clinic_id: Uuid,
    flow_store: Arc<FlowStateStore>,
    occupancy: Arc<ResourceOccupancyManager>,
    chairs: Arc<dyn ChairRegistry>,
    appointments: Arc<dyn AppointmentDirectory>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    clinic: ClinicConfig,
}

impl TransitionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clinic_id: Uuid,
        flow_store: Arc<FlowStateStore>,
        occupancy: Arc<ResourceOccupancyManager>,
        chairs: Arc<dyn ChairRegistry>,
        appointments: Arc<dyn AppointmentDirectory>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        clinic: ClinicConfig,
    ) -> Self {
        Self {
            clinic_id,
            flow_store,
            occupancy,
            chairs,
            appointments,
            audit,
            clock,
            clinic,
        }
    }

    /// Seats a patient in a treatment chair.
    ///
    /// Re-entrancy: a repeat seat for the same appointment on the same chair
    /// is an idempotent success; moving an already-seated patient to a
    /// different chair is rejected with InvalidStage.
    pub async fn seat(
        &self,
        appointment_id: Uuid,
        chair_id: Uuid,
        notes: Option<String>,
        actor: Actor,
    ) -> Result<PatientFlowState, FlowError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(
            "seat",
            Some(appointment_id),
            Some(chair_id),
            Some(&correlation_id),
        );
        async move {
            self.seat_inner(appointment_id, chair_id, notes, actor)
                .await
        }
        .instrument(span)
        .await
    }

    async fn seat_inner(
        &self,
        appointment_id: Uuid,
        chair_id: Uuid,
        notes: Option<String>,
        actor: Actor,
    ) -> Result<PatientFlowState, FlowError> {
        let now = self.clock.now();

        let flow = self
            .flow_store
            .get(appointment_id)
            .await
            .ok_or_else(|| FlowError::flow_not_found(appointment_id))?;

        if flow.stage == FlowStage::InChair {
            if flow.chair_id == Some(chair_id) {
                info!(
                    appointment_id = %appointment_id,
                    chair_id = %chair_id,
                    "Re-entrant seat, appointment already holds this chair"
                );
                return Ok(flow);
            }
            return Err(FlowError::InvalidStage {
                from: flow.stage,
                action: "seat",
            });
        }
        if !flow.stage.can_seat() {
            return Err(FlowError::InvalidStage {
                from: flow.stage,
                action: "seat",
            });
        }

        let chair = self
            .chairs
            .get(chair_id)
            .await
            .ok_or_else(|| FlowError::chair_not_found(chair_id))?;
        if chair.clinic_id != self.clinic_id || !chair.active {
            return Err(FlowError::InvalidChair {
                chair_id,
                clinic_id: self.clinic_id,
            });
        }

        let appointment =
            self.appointments
                .get(appointment_id)
                .await
                .ok_or(FlowError::NotFound {
                    entity: "appointment",
                    id: appointment_id,
                })?;
        let duration_minutes = appointment
            .duration_minutes
            .unwrap_or(self.clinic.default_appointment_minutes);
        let expected_free_at = now + Duration::minutes(duration_minutes);

        // Serialization point: exactly one of two racing seats gets past
        // this claim; the loser observes the winner's committed row.
        let claim = self
            .occupancy
            .claim(
                ClaimRequest {
                    chair_id,
                    clinic_id: self.clinic_id,
                    appointment_id,
                    patient_id: flow.patient_id,
                    expected_free_at,
                    assigned_staff_id: actor.staff_id,
                },
                now,
            )
            .await?;

        if let Err(err) = self
            .appointments
            .mark_in_progress(appointment_id, chair_id, now)
            .await
        {
            self.occupancy
                .restore(chair_id, claim.occupancy.version, claim.previous)
                .await;
            return Err(err);
        }

        let seated = match self
            .flow_store
            .commit_seat(appointment_id, flow.version, chair_id, now, notes.as_deref())
            .await
        {
            Ok(state) => state,
            Err(err) => {
                // The record moved underneath us. A duplicate request for
                // this same appointment and chair may have won; that is the
                // re-entrant case and the committed state stands.
                let committed = self.flow_store.get(appointment_id).await;
                if let Some(current) = &committed {
                    if current.stage == FlowStage::InChair && current.chair_id == Some(chair_id) {
                        return Ok(current.clone());
                    }
                }
                warn!(
                    appointment_id = %appointment_id,
                    chair_id = %chair_id,
                    error = %err,
                    "Seat commit failed, rolling back chair claim"
                );
                // Undo the appointment write only if it is still ours. When
                // a racing seat for this same appointment committed onto
                // another chair, its mark is the one that must survive, so
                // re-apply that mark instead of the pre-race snapshot.
                if let Some(current) = self.appointments.get(appointment_id).await {
                    if current.status == AppointmentStatus::InProgress
                        && current.chair_id == Some(chair_id)
                    {
                        match committed {
                            Some(winner) if winner.stage == FlowStage::InChair => {
                                if let (Some(winner_chair), Some(seated_at)) =
                                    (winner.chair_id, winner.seated_at)
                                {
                                    let _ = self
                                        .appointments
                                        .mark_in_progress(appointment_id, winner_chair, seated_at)
                                        .await;
                                }
                            }
                            _ => {
                                let _ = self
                                    .appointments
                                    .revert_in_progress(appointment_id, appointment)
                                    .await;
                            }
                        }
                    }
                }
                self.occupancy
                    .restore(chair_id, claim.occupancy.version, claim.previous)
                    .await;
                return Err(err);
            }
        };

        info!(
            appointment_id = %appointment_id,
            chair_id = %chair_id,
            patient_id = %seated.patient_id,
            expected_free_at = %expected_free_at,
            "Patient seated"
        );
        self.audit
            .record(AuditEvent {
                action: "flow.seat".to_string(),
                entity: "patient_flow_state".to_string(),
                entity_id: seated.id,
                details: json!({
                    "appointment_id": appointment_id,
                    "chair_id": chair_id,
                    "from_stage": flow.stage.to_string(),
                    "to_stage": seated.stage.to_string(),
                    "expected_free_at": expected_free_at,
                }),
                actor,
            })
            .await;
        Ok(seated)
    }

    /// Completes treatment: the flow advances to `Completed`, the chair is
    /// released and goes through a turnover cleaning block sized by clinic
    /// policy.
    pub async fn finish_treatment(
        &self,
        appointment_id: Uuid,
        notes: Option<String>,
        actor: Actor,
    ) -> Result<PatientFlowState, FlowError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(
            "finish_treatment",
            Some(appointment_id),
            None,
            Some(&correlation_id),
        );
        async move {
            let now = self.clock.now();
            let completed = self
                .flow_store
                .commit_advance(appointment_id, FlowStage::Completed, now, notes.as_deref())
                .await?;

            if let Some(chair_id) = completed.chair_id {
                self.occupancy.release(chair_id).await;
                if let Some(chair) = self.chairs.get(chair_id).await {
                    let cleaning_until =
                        now + Duration::minutes(self.clinic.default_cleaning_minutes);
                    self.occupancy
                        .block(
                            chair_id,
                            chair.clinic_id,
                            BlockType::Cleaning,
                            "post-treatment turnover",
                            Some(cleaning_until),
                            now,
                        )
                        .await?;
                }
            }

            info!(
                appointment_id = %appointment_id,
                patient_id = %completed.patient_id,
                "Treatment completed, chair released for turnover"
            );
            self.audit
                .record(AuditEvent {
                    action: "flow.complete".to_string(),
                    entity: "patient_flow_state".to_string(),
                    entity_id: completed.id,
                    details: json!({
                        "appointment_id": appointment_id,
                        "chair_id": completed.chair_id,
                    }),
                    actor,
                })
                .await;
            Ok(completed)
        }
        .instrument(span)
        .await
    }

    /// Checks a completed patient out. The chair is left untouched; the
    /// completion step frees it separately.
    pub async fn check_out(
        &self,
        appointment_id: Uuid,
        notes: Option<String>,
        actor: Actor,
    ) -> Result<PatientFlowState, FlowError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(
            "check_out",
            Some(appointment_id),
            None,
            Some(&correlation_id),
        );
        async move {
            let now = self.clock.now();
            let checked_out = self
                .flow_store
                .commit_check_out(appointment_id, now, notes.as_deref())
                .await?;

            info!(
                appointment_id = %appointment_id,
                patient_id = %checked_out.patient_id,
                "Patient checked out"
            );
            self.audit
                .record(AuditEvent {
                    action: "flow.check_out".to_string(),
                    entity: "patient_flow_state".to_string(),
                    entity_id: checked_out.id,
                    details: json!({
                        "appointment_id": appointment_id,
                        "checked_out_at": checked_out.checked_out_at,
                    }),
                    actor,
                })
                .await;
            Ok(checked_out)
        }
        .instrument(span)
        .await
    }

    /// Places a cleaning/maintenance/ad-hoc block on a chair.
    pub async fn block_chair(
        &self,
        chair_id: Uuid,
        reason: &str,
        block_type: BlockType,
        until: BlockUntil,
        actor: Actor,
    ) -> Result<OccupancySummary, FlowError> {
        let correlation_id = generate_correlation_id();
        let span =
            create_transition_span("block_chair", None, Some(chair_id), Some(&correlation_id));
        async move {
            if reason.trim().is_empty() {
                return Err(FlowError::Validation(
                    "block reason must not be empty".to_string(),
                ));
            }
            if let BlockUntil::Minutes(minutes) = until {
                if minutes <= 0 {
                    return Err(FlowError::Validation(
                        "block duration must be positive".to_string(),
                    ));
                }
            }
            let chair = self
                .chairs
                .get(chair_id)
                .await
                .ok_or_else(|| FlowError::chair_not_found(chair_id))?;

            let now = self.clock.now();
            let blocked_until = until.resolve(now);
            let occupancy = self
                .occupancy
                .block(chair_id, chair.clinic_id, block_type, reason, blocked_until, now)
                .await?;

            info!(
                chair_id = %chair_id,
                status = %occupancy.status,
                blocked_until = ?blocked_until,
                reason = %reason,
                "Chair blocked"
            );
            let summary = OccupancySummary::from(&occupancy);
            self.audit
                .record(AuditEvent {
                    action: "chair.block".to_string(),
                    entity: "resource_occupancy".to_string(),
                    entity_id: chair_id,
                    details: json!({
                        "status": occupancy.status.to_string(),
                        "reason": reason,
                        "blocked_until": blocked_until,
                    }),
                    actor,
                })
                .await;
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Clears a block before it lapses. Fails if a patient holds the chair.
    pub async fn unblock_chair(
        &self,
        chair_id: Uuid,
        actor: Actor,
    ) -> Result<OccupancySummary, FlowError> {
        let now = self.clock.now();
        let current = self
            .occupancy
            .get(chair_id, now)
            .await
            .ok_or_else(|| FlowError::chair_not_found(chair_id))?;
        if current.status == crate::occupancy::OccupancyStatus::Occupied {
            return Err(FlowError::ChairOccupied { chair_id });
        }

        let freed = self
            .occupancy
            .release(chair_id)
            .await
            .ok_or_else(|| FlowError::chair_not_found(chair_id))?;
        info!(chair_id = %chair_id, "Chair unblocked");
        let summary = OccupancySummary::from(&freed);
        self.audit
            .record(AuditEvent {
                action: "chair.unblock".to_string(),
                entity: "resource_occupancy".to_string(),
                entity_id: chair_id,
                details: json!({ "status": freed.status.to_string() }),
                actor,
            })
            .await;
        Ok(summary)
    }

    /// Moves an occupied chair between SETUP / TREATMENT / TEARDOWN.
    pub async fn set_chair_sub_stage(
        &self,
        chair_id: Uuid,
        sub_stage: ActivitySubStage,
        actor: Actor,
    ) -> Result<OccupancySummary, FlowError> {
        let now = self.clock.now();
        let updated = self.occupancy.set_sub_stage(chair_id, sub_stage, now).await?;
        info!(
            chair_id = %chair_id,
            sub_stage = ?sub_stage,
            "Chair activity sub-stage updated"
        );
        let summary = OccupancySummary::from(&updated);
        self.audit
            .record(AuditEvent {
                action: "chair.sub_stage".to_string(),
                entity: "resource_occupancy".to_string(),
                entity_id: chair_id,
                details: json!({
                    "sub_stage": sub_stage,
                    "appointment_id": updated.appointment_id,
                }),
                actor,
            })
            .await;
        Ok(summary)
    }

    fn projector(&self) -> QueueProjector {
        QueueProjector::new(
            self.flow_store.clone(),
            self.clock.clone(),
            self.clinic.wait_thresholds,
        )
    }

    /// Live queue view for the dashboards. Defaults to today.
    pub async fn list_queue(
        &self,
        date: Option<chrono::NaiveDate>,
        stages: Option<&[FlowStage]>,
    ) -> QueueProjection {
        self.projector().list_queue(date, stages).await
    }

    /// The day's flow states with computed waits.
    pub async fn list_flow(&self, filter: FlowListFilter) -> Vec<FlowStateView> {
        self.projector().list_flow(filter).await
    }
}
