// Chair occupancy leaf: exclusive-use records, blocking, availability.

pub mod manager;
pub mod types;

pub use manager::{ClaimOutcome, ClaimRequest, ResourceOccupancyManager};
pub use types::{
    ActivitySubStage, BlockType, OccupancyStatus, OccupancySummary, ResourceOccupancy,
};
