//! Temporal context of an observation
//!
//! - **crop**: crop types and name parsing
//! - **zscore**: all-history and seasonal anomaly scores
//! - **phenology**: reference curves, phases and status

pub mod crop;
pub mod phenology;
pub mod zscore;

pub use crop::CropType;
pub use phenology::{
    assess, expected_ndvi, phase, reference_curve, stage_at, PhenoStage, PhenoStatus,
    PhenologyAssessment,
};
pub use zscore::{
    all_history_zscore, doy_distance, seasonal_zscore, SeasonalContext, SeasonalParams, TimePoint,
};
