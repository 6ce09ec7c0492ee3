pub mod config;
pub mod pricing;
pub mod retry;
pub mod types;

pub use config::Config;
pub use types::{
    email_source_rank, Campaign, CampaignStatus, CoverageProfile, EmailQualityTier, EmailSource,
    GeneratedCopy, ProfessionalEnrichment, ProfileParams, SocialEnrichment, VerificationRecord,
    VerificationStatus,
};
