//! Statistical reductions for raster data
//!
//! - **region**: mean/stddev/percentiles over an ROI, stress area
//! - **zonal**: statistics by integer zones

pub mod region;
pub mod zonal;

pub use region::{
    area_where, mean_std, percentile, region_stats, sample_stats, stress_area, RegionStats,
    StressArea,
};
pub use zonal::{zonal_statistics, ZonalResult};
