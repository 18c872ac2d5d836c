// Chairflow - Clinic Operational-Flow Engine
// Tracks patient progression through points of care and coordinates
// exclusive assignment of treatment chairs to appointments.

pub mod appointments;
pub mod audit;
pub mod chairs;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod flow;
pub mod occupancy;
pub mod queue;
pub mod telemetry;

// Re-export key types for easy access
pub use appointments::{
    AppointmentDirectory, AppointmentRecord, AppointmentStatus, InMemoryAppointmentDirectory,
};
pub use audit::{Actor, AuditEvent, AuditSink, RecordingAuditSink, TracingAuditSink};
pub use chairs::{ChairRegistry, InMemoryChairRegistry, TreatmentChair};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    config, init_config, ChairflowConfig, ClinicConfig, ObservabilityConfig, WaitThresholds,
};
pub use coordinator::{BlockUntil, TransitionCoordinator};
pub use error::FlowError;
pub use flow::{CheckInRequest, FlowStage, FlowStageHistory, FlowStateStore, PatientFlowState, Priority};
pub use occupancy::{
    ActivitySubStage, BlockType, OccupancyStatus, OccupancySummary, ResourceOccupancy,
    ResourceOccupancyManager,
};
pub use queue::{
    FlowListFilter, FlowStateView, QueueBuckets, QueueEntry, QueueProjection, QueueProjector,
    QueueSummary, WaitStatus,
};
pub use telemetry::{create_transition_span, generate_correlation_id, init_telemetry};
