pub mod pipeline;
pub mod stage;

pub use pipeline::UpdatePipeline;
pub use stage::{UpdateObserver, UpdateOutcome, UpdateStage};
