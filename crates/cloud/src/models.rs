//! Wire models exchanged with the compute platform.
//!
//! Rasters travel as row-major `Option<f64>` arrays (JSON has no NaN;
//! masked cells are `null`) together with their grid.

use chrono::{DateTime, NaiveDate, Utc};
use orbita_core::geometry::AnalysisGrid;
use orbita_core::raster::{Raster, RasterElement};
use orbita_core::{GeoTransform, CRS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CloudError, Result};

// ---------------------------------------------------------------------------
// Rasters
// ---------------------------------------------------------------------------

/// A raster on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterPayload {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsg: Option<u32>,
    pub data: Vec<Option<f64>>,
}

impl RasterPayload {
    pub fn from_raster<T: RasterElement>(raster: &Raster<T>) -> Self {
        let data = raster
            .data()
            .iter()
            .map(|v| if raster.is_nodata(*v) { None } else { v.to_f64() })
            .collect();
        Self {
            rows: raster.rows(),
            cols: raster.cols(),
            transform: *raster.transform(),
            epsg: raster.crs().map(CRS::epsg),
            data,
        }
    }

    /// Decode into a float raster, `null` cells become NaN
    pub fn to_raster(&self) -> Result<Raster<f64>> {
        if self.data.len() != self.rows * self.cols {
            return Err(CloudError::Protocol(format!(
                "raster payload has {} cells, expected {}x{}",
                self.data.len(),
                self.rows,
                self.cols
            )));
        }
        let values = self.data.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        let raster = Raster::from_vec(values, self.rows, self.cols)?
            .with_geo(self.transform, self.epsg.map(CRS::from_epsg));
        Ok(raster)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

// ---------------------------------------------------------------------------
// Scene search
// ---------------------------------------------------------------------------

/// Catalog query for one sensor collection, delivered on a fixed grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneQuery {
    pub collection: String,
    /// `[west, south, east, north]`
    pub bbox: [f64; 4],
    /// Inclusive date range
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Metadata property holding scene cloud cover, percent
    pub cloud_property: String,
    pub max_cloud_pct: f64,
    /// Bands to deliver, native names
    pub bands: Vec<String>,
    pub grid: AnalysisGrid,
}

impl SceneQuery {
    pub fn new(collection: &str, grid: AnalysisGrid, start: NaiveDate, end: NaiveDate) -> Self {
        let (min_x, min_y, max_x, max_y) = grid.transform.bounds(grid.cols, grid.rows);
        Self {
            collection: collection.to_string(),
            bbox: [min_x, min_y, max_x, max_y],
            start,
            end,
            cloud_property: "CLOUD_COVER".to_string(),
            max_cloud_pct: 100.0,
            bands: Vec::new(),
            grid,
        }
    }

    /// Keep scenes whose `property` is below `max_pct`
    pub fn cloud_filter(mut self, property: &str, max_pct: f64) -> Self {
        self.cloud_property = property.to_string();
        self.max_cloud_pct = max_pct;
        self
    }

    pub fn bands(mut self, bands: &[&str]) -> Self {
        self.bands = bands.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// One catalog scene as delivered by the platform (raw DNs, native band names)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScene {
    pub id: String,
    pub collection: String,
    pub acquired: DateTime<Utc>,
    #[serde(default)]
    pub cloud_cover: Option<f64>,
    pub bands: BTreeMap<String, RasterPayload>,
}

impl RawScene {
    pub fn band(&self, name: &str) -> Result<&RasterPayload> {
        self.bands.get(name).ok_or_else(|| {
            CloudError::Protocol(format!("scene {} is missing band {}", self.id, name))
        })
    }
}

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

/// What an export task produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Rendered PNG
    Image,
    /// Cloud-optimized GeoTIFF
    Raster,
    /// Shapefile of polygonized zones
    Vector,
    /// CSV table
    Table,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Image => "png",
            ArtifactKind::Raster => "tif",
            ArtifactKind::Vector => "shp",
            ArtifactKind::Table => "csv",
        }
    }
}

/// Min/max stretch and palette for rendered images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub min: f64,
    pub max: f64,
    /// Hex colours without `#`, low to high
    pub palette: Vec<String>,
}

/// Content of an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportPayload {
    Image {
        raster: RasterPayload,
        visualization: Visualization,
    },
    Raster {
        raster: RasterPayload,
        cloud_optimized: bool,
    },
    Vector {
        raster: RasterPayload,
        label_property: String,
    },
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
    },
}

impl ExportPayload {
    /// Table from serializable records; columns follow the first record's fields
    pub fn table_from_records<T: Serialize>(records: &[T]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let value = serde_json::to_value(record)?;
            let object = value.as_object().ok_or_else(|| {
                CloudError::Protocol("table records must serialize to objects".into())
            })?;
            if columns.is_empty() {
                columns = object.keys().cloned().collect();
            }
            rows.push(
                columns
                    .iter()
                    .map(|c| object.get(c).cloned().unwrap_or(serde_json::Value::Null))
                    .collect(),
            );
        }
        Ok(ExportPayload::Table { columns, rows })
    }
}

/// One export submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Correlation key, unique per artifact and job
    pub description: String,
    /// Destination folder, e.g. `Orbita_Output/job-1/WEB`
    pub folder: String,
    pub file_name_prefix: String,
    pub kind: ArtifactKind,
    /// GeoJSON geometry bounding the export
    pub region: serde_json::Value,
    pub scale_m: f64,
    pub crs: String,
    pub payload: ExportPayload,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Remote task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    #[serde(alias = "CREATED")]
    Unsubmitted,
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Unsubmitted => "UNSUBMITTED",
            TaskState::Ready => "READY",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "COMPLETED",
            TaskState::Failed => "FAILED",
            TaskState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }

    pub fn is_failure(self) -> bool {
        matches!(self, TaskState::Failed | TaskState::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch task as reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    pub description: String,
    pub state: TaskState,
    #[serde(default)]
    pub kind: Option<ArtifactKind>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Which tasks to list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    /// Tasks whose description contains this text
    DescriptionContains(String),
    /// Tasks with these ids
    Ids(Vec<String>),
}

impl TaskFilter {
    pub fn matches(&self, task: &RemoteTask) -> bool {
        match self {
            TaskFilter::DescriptionContains(needle) => task.description.contains(needle.as_str()),
            TaskFilter::Ids(ids) => ids.iter().any(|id| id == &task.id),
        }
    }
}
