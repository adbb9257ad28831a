//! Export orchestration: one remote task per artifact.
//!
//! Each artifact is submitted with the description `<NAME>_<job_id>`, which
//! is the correlation key used to find the job's tasks again. Submission is
//! fire-and-forget; [`crate::status`] tracks the tasks afterwards.

use chrono::{DateTime, Utc};
use orbita_algorithms::imagery::{IndexSet, SpectralIndex};
use orbita_cloud::{
    ArtifactKind, ComputePlatform, ExportPayload, ExportRequest, RasterPayload, RemoteTask,
    TaskFilter, TaskState, Visualization,
};
use orbita_colormap::Ramp;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::kpi::{KpiRecord, TimeSeriesRow};
use crate::zonation::Zonation;

// ---------------------------------------------------------------------------
// Folders
// ---------------------------------------------------------------------------

/// Sub-folder of a job's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFolder {
    Web,
    Tiff,
    Data,
    Vra,
}

impl OutputFolder {
    pub const ALL: [OutputFolder; 4] = [
        OutputFolder::Web,
        OutputFolder::Tiff,
        OutputFolder::Data,
        OutputFolder::Vra,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFolder::Web => "WEB",
            OutputFolder::Tiff => "TIFF",
            OutputFolder::Data => "DATA",
            OutputFolder::Vra => "VRA",
        }
    }

    /// Folder an artifact lands in, from its name prefix
    pub fn for_artifact(name: &str) -> Self {
        if name.starts_with("PNG_") {
            OutputFolder::Web
        } else if name.starts_with("TIFF_") {
            OutputFolder::Tiff
        } else if name.starts_with("VRA_") {
            OutputFolder::Vra
        } else {
            OutputFolder::Data
        }
    }
}

/// Kind of an artifact, from its name
pub fn kind_for_artifact(name: &str) -> ArtifactKind {
    if name.starts_with("PNG_") {
        ArtifactKind::Image
    } else if name.starts_with("TIFF_") || name == "VRA_ZONES_RASTER" {
        ArtifactKind::Raster
    } else if name == "VRA_ZONES_VECTOR" {
        ArtifactKind::Vector
    } else {
        ArtifactKind::Table
    }
}

/// `{base}/{job_id}/{WEB|TIFF|DATA|VRA}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFolders {
    pub base: String,
    pub web: String,
    pub tiff: String,
    pub data: String,
    pub vra: String,
}

impl JobFolders {
    pub fn new(output_base: &str, job_id: &str) -> Self {
        let base = format!("{}/{}", output_base.trim_end_matches('/'), job_id);
        let sub = |f: OutputFolder| format!("{}/{}", base, f.as_str());
        Self {
            web: sub(OutputFolder::Web),
            tiff: sub(OutputFolder::Tiff),
            data: sub(OutputFolder::Data),
            vra: sub(OutputFolder::Vra),
            base,
        }
    }

    pub fn path(&self, folder: OutputFolder) -> &str {
        match folder {
            OutputFolder::Web => &self.web,
            OutputFolder::Tiff => &self.tiff,
            OutputFolder::Data => &self.data,
            OutputFolder::Vra => &self.vra,
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest entries
// ---------------------------------------------------------------------------

/// Correlation key of an artifact
pub fn description(name: &str, job_id: &str) -> String {
    format!("{name}_{job_id}")
}

/// Whether `name` is one of the artifacts [`plan_artifacts`] can produce
pub fn is_artifact_name(name: &str) -> bool {
    const FIXED: [&str; 6] = [
        "PNG_VRA",
        "VRA_ZONES_RASTER",
        "VRA_ZONES_VECTOR",
        "VRA_STATS",
        "KPIS",
        "TIME_SERIES",
    ];
    if FIXED.contains(&name) {
        return true;
    }
    if let Some(index) = name.strip_prefix("PNG_") {
        return [SpectralIndex::NDVI, SpectralIndex::NDWI, SpectralIndex::EVI]
            .iter()
            .any(|i| i.name() == index);
    }
    name.strip_prefix("TIFF_")
        .is_some_and(|index| SpectralIndex::ALL.iter().any(|i| i.name() == index))
}

/// Artifact name back from a description, if it belongs to `job_id`.
///
/// The suffix alone is ambiguous (`KPIS_job_1` ends in `_1`), so the
/// remaining prefix must be a known artifact name.
pub fn artifact_name<'a>(description: &'a str, job_id: &str) -> Option<&'a str> {
    description
        .strip_suffix(job_id)
        .and_then(|rest| rest.strip_suffix('_'))
        .filter(|name| is_artifact_name(name))
}

/// One artifact on a job's manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTask {
    pub name: String,
    pub description: String,
    /// `None` when submission itself failed
    pub remote_task_id: Option<String>,
    pub folder: String,
    pub kind: ArtifactKind,
    pub file_name: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub state: TaskState,
    pub error: Option<String>,
}

impl ExportTask {
    fn from_remote(name: &str, folder: &str, kind: ArtifactKind, remote: &RemoteTask) -> Self {
        Self {
            name: name.to_string(),
            description: remote.description.clone(),
            remote_task_id: Some(remote.id.clone()),
            folder: remote.folder.clone().unwrap_or_else(|| folder.to_string()),
            kind,
            file_name: remote
                .file_name
                .clone()
                .unwrap_or_else(|| format!("{}.{}", remote.description, kind.extension())),
            submitted_at: Some(remote.created_at),
            state: remote.state,
            error: remote.error_message.clone(),
        }
    }

    /// Entry for a task found by description scan, with no manifest to go by
    pub fn discovered(job_id: &str, remote: &RemoteTask) -> Option<Self> {
        let name = artifact_name(&remote.description, job_id)?;
        let kind = remote.kind.unwrap_or_else(|| kind_for_artifact(name));
        Some(Self::from_remote(name, "", kind, remote))
    }

    /// Refresh state and error from the platform's view of the task
    pub fn update_from(&mut self, remote: &RemoteTask) {
        self.state = remote.state;
        self.error = remote.error_message.clone();
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// An artifact ready to submit
#[derive(Debug, Clone)]
pub struct PlannedArtifact {
    pub name: String,
    pub folder: OutputFolder,
    pub kind: ArtifactKind,
    pub payload: ExportPayload,
}

impl PlannedArtifact {
    fn new(name: impl Into<String>, kind: ArtifactKind, payload: ExportPayload) -> Self {
        let name = name.into();
        Self {
            folder: OutputFolder::for_artifact(&name),
            name,
            kind,
            payload,
        }
    }
}

fn visualization(ramp: Ramp) -> Visualization {
    Visualization {
        min: ramp.min,
        max: ramp.max,
        palette: ramp.palette_hex(),
    }
}

/// Everything a job exports.
pub struct ExportInputs<'a> {
    /// Composite clipped to the ROI
    pub composite: &'a IndexSet,
    pub zonation: Option<&'a Zonation>,
    pub kpis: &'a KpiRecord,
    pub series: &'a [TimeSeriesRow],
}

/// Plan the job's artifacts, in submission order.
///
/// WEB previews, TIFF layers, VRA outputs (only with zones), then DATA tables.
pub fn plan_artifacts(inputs: &ExportInputs<'_>) -> Result<Vec<PlannedArtifact>> {
    let mut plan = Vec::new();

    for (index, ramp) in [
        (SpectralIndex::NDVI, Ramp::ndvi()),
        (SpectralIndex::NDWI, Ramp::ndwi()),
        (SpectralIndex::EVI, Ramp::evi()),
    ] {
        plan.push(PlannedArtifact::new(
            format!("PNG_{}", index.name()),
            ArtifactKind::Image,
            ExportPayload::Image {
                raster: RasterPayload::from_raster(inputs.composite.get(index)),
                visualization: visualization(ramp),
            },
        ));
    }

    let zones = inputs.zonation.map(|z| RasterPayload::from_raster(&z.export_raster()));
    if let Some(zones) = &zones {
        plan.push(PlannedArtifact::new(
            "PNG_VRA",
            ArtifactKind::Image,
            ExportPayload::Image {
                raster: zones.clone(),
                visualization: visualization(Ramp::vra_zones()),
            },
        ));
    }

    for index in SpectralIndex::ALL {
        plan.push(PlannedArtifact::new(
            format!("TIFF_{}", index.name()),
            ArtifactKind::Raster,
            ExportPayload::Raster {
                raster: RasterPayload::from_raster(inputs.composite.get(index)),
                cloud_optimized: true,
            },
        ));
    }

    if let (Some(zonation), Some(zones)) = (inputs.zonation, zones) {
        plan.push(PlannedArtifact::new(
            "VRA_ZONES_RASTER",
            ArtifactKind::Raster,
            ExportPayload::Raster {
                raster: zones.clone(),
                cloud_optimized: true,
            },
        ));
        plan.push(PlannedArtifact::new(
            "VRA_ZONES_VECTOR",
            ArtifactKind::Vector,
            ExportPayload::Vector {
                raster: zones,
                label_property: "zone".to_string(),
            },
        ));
        plan.push(PlannedArtifact::new(
            "VRA_STATS",
            ArtifactKind::Table,
            ExportPayload::table_from_records(&zonation.summaries)?,
        ));
    }

    plan.push(PlannedArtifact::new(
        "KPIS",
        ArtifactKind::Table,
        ExportPayload::table_from_records(std::slice::from_ref(inputs.kpis))?,
    ));
    plan.push(PlannedArtifact::new(
        "TIME_SERIES",
        ArtifactKind::Table,
        ExportPayload::table_from_records(inputs.series)?,
    ));

    Ok(plan)
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Where and how a job's artifacts are exported.
pub struct ExportTarget<'a> {
    pub job_id: &'a str,
    pub folders: &'a JobFolders,
    /// GeoJSON geometry of the ROI
    pub region: serde_json::Value,
    pub scale_m: f64,
}

/// Submit planned artifacts, reusing live tasks from an earlier run.
///
/// A task whose description already exists remotely in a non-failed state is
/// reused. A rejected submission is recorded as a `FAILED` entry and the
/// remaining artifacts are still submitted. Only the initial task listing can
/// fail the call.
pub async fn submit_artifacts(
    platform: &dyn ComputePlatform,
    target: &ExportTarget<'_>,
    plan: Vec<PlannedArtifact>,
) -> Result<Vec<ExportTask>> {
    let existing = platform
        .list_tasks(&TaskFilter::DescriptionContains(target.job_id.to_string()))
        .await?;

    let mut manifest = Vec::with_capacity(plan.len());
    let mut reused = 0usize;
    let mut rejected = 0usize;

    for artifact in plan {
        let description = description(&artifact.name, target.job_id);
        let folder = target.folders.path(artifact.folder).to_string();

        if let Some(remote) = existing
            .iter()
            .find(|t| t.description == description && !t.state.is_failure())
        {
            reused += 1;
            manifest.push(ExportTask::from_remote(&artifact.name, &folder, artifact.kind, remote));
            continue;
        }

        let request = ExportRequest {
            description: description.clone(),
            folder: folder.clone(),
            file_name_prefix: description.clone(),
            kind: artifact.kind,
            region: target.region.clone(),
            scale_m: target.scale_m,
            crs: "EPSG:4326".to_string(),
            payload: artifact.payload,
        };

        match platform.submit_task(&request).await {
            Ok(remote) => {
                manifest.push(ExportTask::from_remote(&artifact.name, &folder, artifact.kind, &remote));
            }
            Err(e) => {
                warn!(artifact = %artifact.name, error = %e, "export submission failed");
                rejected += 1;
                manifest.push(ExportTask {
                    name: artifact.name,
                    file_name: format!("{}.{}", description, artifact.kind.extension()),
                    description,
                    remote_task_id: None,
                    folder,
                    kind: artifact.kind,
                    submitted_at: None,
                    state: TaskState::Failed,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    info!(
        job_id = target.job_id,
        tasks = manifest.len(),
        reused,
        rejected,
        "exports submitted"
    );
    Ok(manifest)
}
