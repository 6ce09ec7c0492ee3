pub mod analyzer;
pub mod catalog;
pub mod spatial;

pub use analyzer::{classify_location, CoverageAnalysis, CoverageAnalyzer, LocationKind, SelectedZip};
pub use catalog::{haversine_miles, ZipCatalog, ZipInfo};
pub use spatial::{select_spaced, select_with_relaxation, spacing_for_density, ScoredZip};
