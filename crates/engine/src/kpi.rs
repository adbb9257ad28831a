//! KPI record and per-scene time series.

use chrono::{Datelike, NaiveDate};
use orbita_algorithms::imagery::{Composite, IndexSet};
use orbita_algorithms::statistics::{region_stats, stress_area, RegionStats};
use orbita_algorithms::temporal::{
    all_history_zscore, assess, seasonal_zscore, CropType, PhenoStatus, SeasonalParams, TimePoint,
};
use orbita_core::{Raster, Roi};
use serde::{Deserialize, Serialize};

use crate::acquisition::Scene;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// ROI summary of one scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    pub date: NaiveDate,
    pub doy: u32,
    pub sensor: String,
    pub ndvi: f64,
    pub ndwi: Option<f64>,
    pub evi: Option<f64>,
    pub ndvi_p10: f64,
    pub ndvi_p50: f64,
    pub ndvi_p90: f64,
    pub ndvi_std: f64,
}

/// Row for `scene`, or `None` when no ROI pixel was clear.
pub fn time_series_row(
    scene: &Scene,
    indices: &IndexSet,
    mask: &Raster<u8>,
) -> Result<Option<TimeSeriesRow>> {
    let Some(ndvi) = region_stats(&indices.ndvi, Some(mask))? else {
        return Ok(None);
    };
    let mean_of = |r: &Raster<f64>| -> Result<Option<f64>> {
        Ok(region_stats(r, Some(mask))?.map(|s| s.mean))
    };
    let date = scene.date();
    Ok(Some(TimeSeriesRow {
        date,
        doy: date.ordinal(),
        sensor: scene.sensor.to_string(),
        ndvi: ndvi.mean,
        ndwi: mean_of(&indices.ndwi)?,
        evi: mean_of(&indices.evi)?,
        ndvi_p10: ndvi.p10,
        ndvi_p50: ndvi.p50,
        ndvi_p90: ndvi.p90,
        ndvi_std: ndvi.std_dev,
    }))
}

/// Indicators of one analysis. Flat so it exports as a single table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub job_id: String,
    pub crop: CropType,
    pub analysis_type: String,
    pub observation_date: NaiveDate,
    pub doy: u32,
    pub scene_count: usize,

    pub ndvi_mean: f64,
    pub ndvi_std: f64,
    pub ndvi_p10: f64,
    pub ndvi_p50: f64,
    pub ndvi_p90: f64,
    pub ndwi_mean: Option<f64>,
    pub ndwi_std: Option<f64>,
    pub ndwi_p10: Option<f64>,
    pub ndwi_p50: Option<f64>,
    pub ndwi_p90: Option<f64>,
    pub evi_mean: Option<f64>,
    pub evi_std: Option<f64>,
    pub evi_p10: Option<f64>,
    pub evi_p50: Option<f64>,
    pub evi_p90: Option<f64>,
    pub ndci_mean: Option<f64>,
    pub savi_mean: Option<f64>,
    pub osavi_mean: Option<f64>,
    /// NDCI fell back to NDVI for at least one scene
    pub ndci_fallback: bool,

    pub area_ha: f64,
    pub stress_ha: f64,
    pub stress_pct: Option<f64>,

    pub zscore: Option<f64>,
    pub seasonal_zscore: Option<f64>,
    pub seasonal_count: usize,
    pub seasonal_mean: Option<f64>,
    pub seasonal_std: Option<f64>,

    pub expected_ndvi: Option<f64>,
    pub deviation: Option<f64>,
    pub deviation_pct: Option<f64>,
    pub phase: String,
    pub status: PhenoStatus,

    pub bbox_min_lon: f64,
    pub bbox_min_lat: f64,
    pub bbox_max_lon: f64,
    pub bbox_max_lat: f64,
}

/// What [`build_kpis`] reads.
pub struct KpiInputs<'a> {
    pub job_id: &'a str,
    pub crop: CropType,
    pub analysis_type: &'a str,
    pub roi: &'a Roi,
    /// Composite already clipped to the ROI
    pub composite: &'a Composite,
    pub mask: &'a Raster<u8>,
    /// Date of the latest scene in the window
    pub observation_date: NaiveDate,
    /// Whole series, history included
    pub series: &'a [TimeSeriesRow],
    pub config: &'a EngineConfig,
}

/// Reduce the composite and place it in its temporal context.
///
/// Fails with `NoImagery` when the composite has no clear NDVI pixel inside
/// the ROI.
pub fn build_kpis(inputs: &KpiInputs<'_>) -> Result<KpiRecord> {
    let indices = &inputs.composite.indices;
    let stats = |r: &Raster<f64>| region_stats(r, Some(inputs.mask));

    let ndvi = stats(&indices.ndvi)?.ok_or_else(|| {
        EngineError::NoImagery(format!(
            "{} scene(s) in the window but no clear pixel inside the ROI",
            inputs.composite.scene_count
        ))
    })?;
    let ndwi = stats(&indices.ndwi)?;
    let evi = stats(&indices.evi)?;
    let mean = |s: Option<RegionStats>| s.map(|s| s.mean);

    let stress = stress_area(&indices.ndvi, inputs.config.stress_threshold, inputs.roi.area_ha())?;

    let history: Vec<f64> = inputs.series.iter().map(|r| r.ndvi).collect();
    let zscore = all_history_zscore(&history, ndvi.mean);

    let points: Vec<TimePoint> = inputs
        .series
        .iter()
        .map(|r| TimePoint {
            date: r.date,
            value: r.ndvi,
        })
        .collect();
    let seasonal = seasonal_zscore(
        &points,
        ndvi.mean,
        inputs.observation_date,
        SeasonalParams {
            window_days: inputs.config.seasonal_window_days,
            min_samples: inputs.config.seasonal_min_samples,
            min_std: inputs.config.seasonal_min_std,
        },
    );

    let doy = inputs.observation_date.ordinal();
    let pheno = assess(inputs.crop, doy, Some(ndvi.mean), seasonal.zscore);
    let bounds = inputs.roi.bounds();

    Ok(KpiRecord {
        job_id: inputs.job_id.to_string(),
        crop: inputs.crop,
        analysis_type: inputs.analysis_type.to_string(),
        observation_date: inputs.observation_date,
        doy,
        scene_count: inputs.composite.scene_count,

        ndvi_mean: ndvi.mean,
        ndvi_std: ndvi.std_dev,
        ndvi_p10: ndvi.p10,
        ndvi_p50: ndvi.p50,
        ndvi_p90: ndvi.p90,
        ndwi_mean: ndwi.map(|s| s.mean),
        ndwi_std: ndwi.map(|s| s.std_dev),
        ndwi_p10: ndwi.map(|s| s.p10),
        ndwi_p50: ndwi.map(|s| s.p50),
        ndwi_p90: ndwi.map(|s| s.p90),
        evi_mean: evi.map(|s| s.mean),
        evi_std: evi.map(|s| s.std_dev),
        evi_p10: evi.map(|s| s.p10),
        evi_p50: evi.map(|s| s.p50),
        evi_p90: evi.map(|s| s.p90),
        ndci_mean: mean(stats(&indices.ndci)?),
        savi_mean: mean(stats(&indices.savi)?),
        osavi_mean: mean(stats(&indices.osavi)?),
        ndci_fallback: indices.ndci_fallback,

        area_ha: stress.area_ha,
        stress_ha: stress.stress_ha,
        stress_pct: stress.stress_pct,

        zscore,
        seasonal_zscore: seasonal.zscore,
        seasonal_count: seasonal.count,
        seasonal_mean: seasonal.mean,
        seasonal_std: seasonal.std,

        expected_ndvi: pheno.expected_ndvi,
        deviation: pheno.deviation,
        deviation_pct: pheno.deviation_pct,
        phase: pheno.phase,
        status: pheno.status,

        bbox_min_lon: bounds.min_lon,
        bbox_min_lat: bounds.min_lat,
        bbox_max_lon: bounds.max_lon,
        bbox_max_lat: bounds.max_lat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use orbita_algorithms::imagery::{median_composite, CompositeParams};
    use orbita_core::AnalysisGrid;

    fn roi() -> Roi {
        Roi::from_ring(
            vec![[-4.0, 37.0], [-3.995, 37.0], [-3.995, 37.005], [-4.0, 37.005]],
            0.0,
        )
        .unwrap()
    }

    fn uniform_indices(grid: &AnalysisGrid, ndvi: f64) -> IndexSet {
        let r = |v: f64| grid.empty_raster().map(|_| v);
        IndexSet {
            ndvi: r(ndvi),
            ndwi: r(0.1),
            evi: r(0.3),
            ndci: r(ndvi),
            savi: r(0.4),
            osavi: r(0.45),
            ndci_fallback: true,
        }
    }

    fn row(date: NaiveDate, ndvi: f64) -> TimeSeriesRow {
        TimeSeriesRow {
            date,
            doy: date.ordinal(),
            sensor: "sentinel2".into(),
            ndvi,
            ndwi: None,
            evi: None,
            ndvi_p10: ndvi,
            ndvi_p50: ndvi,
            ndvi_p90: ndvi,
            ndvi_std: 0.0,
        }
    }

    #[test]
    fn olive_in_june_below_curve_is_critical() {
        let roi = roi();
        let grid = AnalysisGrid::for_roi(&roi, 50.0, 1_000_000).unwrap();
        let mask = grid.rasterize(&roi);
        let composite = median_composite(&[uniform_indices(&grid, 0.30)], CompositeParams::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 18).unwrap(); // DOY 170
        let series = vec![row(date, 0.30)];
        let config = EngineConfig::default();

        let kpis = build_kpis(&KpiInputs {
            job_id: "j1",
            crop: CropType::Olive,
            analysis_type: "baseline",
            roi: &roi,
            composite: &composite,
            mask: &mask,
            observation_date: date,
            series: &series,
            config: &config,
        })
        .unwrap();

        assert_eq!(kpis.doy, 170);
        assert_relative_eq!(kpis.ndvi_mean, 0.30, epsilon = 1e-12);
        assert_eq!(kpis.expected_ndvi, Some(0.62));
        assert_relative_eq!(kpis.deviation_pct.unwrap(), -51.6129, epsilon = 1e-3);
        assert_eq!(kpis.status, PhenoStatus::Critico);
        assert_eq!(kpis.phase, "Floracion y cuajado");
        assert_eq!(kpis.zscore, Some(0.0));
        assert_eq!(kpis.seasonal_zscore, None);
        assert!(kpis.ndci_fallback);
        // NDVI 0.30 < 0.35 everywhere: the whole ROI is stressed
        assert!(kpis.stress_pct.unwrap() > 90.0);
        assert!(kpis.stress_pct.unwrap() <= 100.0);
    }

    #[test]
    fn fully_masked_composite_is_no_imagery() {
        let roi = roi();
        let grid = AnalysisGrid::for_roi(&roi, 50.0, 1_000_000).unwrap();
        let mask = grid.rasterize(&roi);
        let composite =
            median_composite(&[uniform_indices(&grid, f64::NAN)], CompositeParams::default()).unwrap();
        let config = EngineConfig::default();
        let err = build_kpis(&KpiInputs {
            job_id: "j1",
            crop: CropType::Other,
            analysis_type: "baseline",
            roi: &roi,
            composite: &composite,
            mask: &mask,
            observation_date: NaiveDate::from_ymd_opt(2024, 6, 18).unwrap(),
            series: &[],
            config: &config,
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::NoImagery(_)));
    }
}
