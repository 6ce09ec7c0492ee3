pub mod adapters;
pub mod coverage;
pub mod govern;
pub mod pipeline;
pub mod writer;

pub use govern::{RateGovernor, ServiceKind};
pub use pipeline::{CampaignSummary, PipelineExecutor};
