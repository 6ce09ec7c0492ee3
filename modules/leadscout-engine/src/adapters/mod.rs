pub mod map;
pub mod professional;
pub mod social;
pub mod verifier;
pub mod website;

pub use map::MapScraper;
pub use professional::ProfessionalScraper;
pub use social::SocialScraper;
pub use verifier::EmailVerifier;
pub use website::WebsiteScraper;
