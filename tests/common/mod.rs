// Shared fixture wiring for the integration suites: in-memory collaborator
// seams, a pinned manual clock and a recording audit sink.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use chairflow::{
    AppointmentRecord, AppointmentStatus, ChairflowConfig, CheckInRequest, Clock, FlowStage,
    FlowStateStore, InMemoryAppointmentDirectory, InMemoryChairRegistry, ManualClock, Priority,
    RecordingAuditSink, ResourceOccupancyManager, TransitionCoordinator, TreatmentChair,
};

pub fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

pub struct Harness {
    pub clinic_id: Uuid,
    pub flow_store: Arc<FlowStateStore>,
    pub occupancy: Arc<ResourceOccupancyManager>,
    pub chairs: Arc<InMemoryChairRegistry>,
    pub appointments: Arc<InMemoryAppointmentDirectory>,
    pub audit: Arc<RecordingAuditSink>,
    pub clock: ManualClock,
    pub coordinator: TransitionCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        let clinic_id = Uuid::new_v4();
        let flow_store = FlowStateStore::new();
        let occupancy = ResourceOccupancyManager::new();
        let chairs = InMemoryChairRegistry::new();
        let appointments = InMemoryAppointmentDirectory::new();
        let audit = RecordingAuditSink::new();
        let clock = ManualClock::new(start_of_day());

        let coordinator = TransitionCoordinator::new(
            clinic_id,
            flow_store.clone(),
            occupancy.clone(),
            chairs.clone(),
            appointments.clone(),
            audit.clone(),
            Arc::new(clock.clone()),
            ChairflowConfig::default().clinic,
        );

        Self {
            clinic_id,
            flow_store,
            occupancy,
            chairs,
            appointments,
            audit,
            clock,
            coordinator,
        }
    }

    pub async fn add_chair(&self) -> Uuid {
        self.add_chair_in_clinic(self.clinic_id).await
    }

    pub async fn add_chair_in_clinic(&self, clinic_id: Uuid) -> Uuid {
        let chair_id = Uuid::new_v4();
        self.chairs
            .register(TreatmentChair {
                id: chair_id,
                clinic_id,
                label: format!("Chair {}", &chair_id.to_string()[..8]),
                active: true,
            })
            .await;
        chair_id
    }

    /// Creates the appointment record and checks the patient in at the
    /// current clock time.
    pub async fn check_in(&self, priority: Priority) -> Uuid {
        self.check_in_with_duration(priority, None).await
    }

    pub async fn check_in_with_duration(
        &self,
        priority: Priority,
        duration_minutes: Option<i64>,
    ) -> Uuid {
        let appointment_id = Uuid::new_v4();
        self.appointments
            .upsert(AppointmentRecord {
                id: appointment_id,
                status: AppointmentStatus::Scheduled,
                duration_minutes,
                chair_id: None,
                started_at: None,
            })
            .await;
        self.flow_store
            .check_in(
                CheckInRequest {
                    appointment_id,
                    patient_id: Uuid::new_v4(),
                    provider_id: Uuid::new_v4(),
                    scheduled_at: self.clock.now(),
                    priority,
                    initial_stage: FlowStage::CheckedIn,
                    notes: None,
                },
                self.clock.now(),
            )
            .await
            .unwrap();
        appointment_id
    }

    /// Drives a seated appointment to Completed so checkout can run.
    pub async fn complete_treatment(&self, appointment_id: Uuid) {
        self.flow_store
            .commit_advance(appointment_id, FlowStage::Completed, self.clock.now(), None)
            .await
            .unwrap();
    }
}
