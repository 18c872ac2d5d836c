// Patient flow leaf: flow-state records plus the append-only stage ledger.

pub mod store;
pub mod types;

pub use store::{CheckInRequest, FlowStateStore};
pub use types::{FlowStage, FlowStageHistory, PatientFlowState, Priority};
