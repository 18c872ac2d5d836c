// Queue projection: read-only dashboard views over the flow store.

pub mod projector;
pub mod types;

pub use projector::QueueProjector;
pub use types::{
    FlowListFilter, FlowStateView, QueueBuckets, QueueEntry, QueueProjection, QueueSummary,
    WaitStatus,
};
