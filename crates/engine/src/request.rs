//! Input and output of `Engine::execute`.

use chrono::NaiveDate;
use orbita_algorithms::temporal::CropType;
use orbita_core::Bounds;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::export::{ExportTask, JobFolders};
use crate::job::{validate_job_id, AnalysisWindow};
use crate::kpi::{KpiRecord, TimeSeriesRow};
use crate::zonation::ZoneSummary;

fn default_analysis_type() -> String {
    "baseline".to_string()
}

/// One analysis to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub job_id: String,
    /// Polygon, MultiPolygon, Feature, FeatureCollection or bare coordinates
    pub roi_geojson: Value,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_crop")]
    pub crop_type: CropType,
    #[serde(default)]
    pub buffer_m: f64,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
}

fn default_crop() -> CropType {
    CropType::Other
}

impl AnalysisRequest {
    pub fn new(
        job_id: impl Into<String>,
        roi_geojson: Value,
        start_date: NaiveDate,
        end_date: NaiveDate,
        crop_type: CropType,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            roi_geojson,
            start_date,
            end_date,
            crop_type,
            buffer_m: 0.0,
            analysis_type: default_analysis_type(),
        }
    }

    pub fn with_buffer(mut self, buffer_m: f64) -> Self {
        self.buffer_m = buffer_m;
        self
    }

    pub fn with_analysis_type(mut self, analysis_type: impl Into<String>) -> Self {
        self.analysis_type = analysis_type.into();
        self
    }

    pub fn window(&self) -> AnalysisWindow {
        AnalysisWindow {
            start: self.start_date,
            end: self.end_date,
            crop: self.crop_type,
        }
    }

    /// Reject requests that cannot name a job or describe an empty window.
    pub fn validate(&self) -> Result<()> {
        validate_job_id(&self.job_id)?;
        if self.start_date > self.end_date {
            return Err(EngineError::InvalidRequest(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if !self.buffer_m.is_finite() || self.buffer_m < 0.0 {
            return Err(EngineError::InvalidRequest(format!(
                "buffer must be a non-negative distance in meters, got {}",
                self.buffer_m
            )));
        }
        Ok(())
    }
}

/// What a successful `execute` returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub job_id: String,
    pub kpis: KpiRecord,
    pub vra_stats: Option<Vec<ZoneSummary>>,
    /// Why zoning was skipped, when it was
    pub vra_error: Option<String>,
    pub bounds: Bounds,
    pub tasks: Vec<ExportTask>,
    pub time_series: Vec<TimeSeriesRow>,
    pub folders: JobFolders,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            "job-1",
            json!({"type": "Polygon", "coordinates": []}),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            CropType::Olive,
        )
    }

    #[test]
    fn accepts_a_plain_request() {
        assert!(request().validate().is_ok());
        assert!(request().with_buffer(10.0).validate().is_ok());
    }

    #[test]
    fn rejects_reversed_window_and_negative_buffer() {
        let mut reversed = request();
        reversed.end_date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(matches!(reversed.validate(), Err(EngineError::InvalidRequest(_))));
        assert!(matches!(
            request().with_buffer(-1.0).validate(),
            Err(EngineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn rejects_unusable_job_ids() {
        let mut r = request();
        r.job_id = "  ".into();
        assert!(r.validate().is_err());
        r.job_id = "a/b".into();
        assert!(r.validate().is_err());
    }

    #[test]
    fn defaults_when_deserializing() {
        let r: AnalysisRequest = serde_json::from_value(json!({
            "job_id": "j",
            "roi_geojson": {"coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]},
            "start_date": "2024-06-01",
            "end_date": "2024-06-30",
            "crop_type": "olivar"
        }))
        .unwrap();
        assert_eq!(r.crop_type, CropType::Olive);
        assert_eq!(r.analysis_type, "baseline");
        assert_eq!(r.buffer_m, 0.0);
    }
}
