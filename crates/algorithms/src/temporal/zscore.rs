//! Anomaly scores of the current observation against its history

use crate::statistics::mean_std;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One scene's ROI mean of an index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// `(current - mean) / std` over the whole series.
///
/// `None` for an empty series, `0.0` when the series has no spread.
pub fn all_history_zscore(series: &[f64], current: f64) -> Option<f64> {
    let finite: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    let (mean, std) = mean_std(&finite)?;
    if !current.is_finite() {
        return None;
    }
    if std == 0.0 {
        return Some(0.0);
    }
    Some((current - mean) / std)
}

/// Parameters for the seasonal comparison
#[derive(Debug, Clone, Copy)]
pub struct SeasonalParams {
    /// Half-width of the day-of-year window (default: 21)
    pub window_days: u32,
    /// Minimum prior-season samples (default: 3)
    pub min_samples: usize,
    /// Minimum standard deviation of those samples (default: 0.001)
    pub min_std: f64,
}

impl Default for SeasonalParams {
    fn default() -> Self {
        Self {
            window_days: 21,
            min_samples: 3,
            min_std: 0.001,
        }
    }
}

/// Prior-season sample statistics and the resulting z-score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SeasonalContext {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    /// `None` unless `count >= min_samples` and `std > min_std`
    pub zscore: Option<f64>,
}

/// Circular distance between two days of the year
pub fn doy_distance(a: u32, b: u32) -> u32 {
    let d = a.abs_diff(b);
    d.min(365u32.saturating_sub(d))
}

/// Compare `current` against observations from earlier years that fall within
/// `window_days` of the same day of year.
pub fn seasonal_zscore(
    series: &[TimePoint],
    current: f64,
    current_date: NaiveDate,
    params: SeasonalParams,
) -> SeasonalContext {
    let doy = current_date.ordinal();
    let samples: Vec<f64> = series
        .iter()
        .filter(|p| p.value.is_finite())
        .filter(|p| p.date.year() < current_date.year())
        .filter(|p| doy_distance(p.date.ordinal(), doy) <= params.window_days)
        .map(|p| p.value)
        .collect();

    let Some((mean, std)) = mean_std(&samples) else {
        return SeasonalContext::default();
    };

    let zscore = (samples.len() >= params.min_samples && std > params.min_std && current.is_finite())
        .then(|| (current - mean) / std);

    SeasonalContext {
        count: samples.len(),
        mean: Some(mean),
        std: Some(std),
        zscore,
    }
}
