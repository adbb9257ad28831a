//! Task status tracking, download readiness and queued-task start.
//!
//! Nothing here polls on its own: callers decide the cadence and any retry.

use orbita_cloud::{ArtifactKind, ComputePlatform, TaskFilter, TaskState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::Result;
use crate::export::{ExportTask, JobFolders, OutputFolder};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Aggregate state of a job's export tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub job_id: String,
    pub tasks: Vec<ExportTask>,
    pub completed: usize,
    pub running: usize,
    pub failed: usize,
    pub pending: usize,
    pub total: usize,
    pub all_complete: bool,
    pub png_complete: bool,
    pub any_failed: bool,
    pub progress_pct: u32,
}

impl StatusReport {
    /// Classify `tasks` and derive the readiness gates.
    pub fn from_tasks(job_id: &str, tasks: Vec<ExportTask>) -> Self {
        let (mut completed, mut running, mut failed, mut pending) = (0, 0, 0, 0);
        for task in &tasks {
            match task.state {
                TaskState::Completed => completed += 1,
                TaskState::Running => running += 1,
                TaskState::Failed | TaskState::Cancelled => failed += 1,
                TaskState::Unsubmitted | TaskState::Ready => pending += 1,
            }
        }
        let total = tasks.len();

        let mut images = tasks.iter().filter(|t| t.kind == ArtifactKind::Image).peekable();
        let png_complete =
            images.peek().is_some() && images.all(|t| t.state == TaskState::Completed);

        let progress_pct = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u32
        };

        Self {
            job_id: job_id.to_string(),
            completed,
            running,
            failed,
            pending,
            total,
            all_complete: total > 0 && completed == total,
            png_complete,
            any_failed: failed > 0,
            progress_pct,
            tasks,
        }
    }

    /// Every task reached a final state and at least one of them failed
    pub fn terminal_with_failures(&self) -> bool {
        self.any_failed && self.tasks.iter().all(|t| t.state.is_terminal())
    }
}

/// Whether results can be fetched, and where they are
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadReport {
    pub job_id: String,
    /// `"waiting"` or `"ready"`
    pub status: String,
    pub download_ready: bool,
    /// File names keyed by output folder (`WEB`, `TIFF`, `DATA`, `VRA`)
    pub files: BTreeMap<String, Vec<String>>,
    pub base_folder: Option<String>,
    pub progress_pct: u32,
}

impl DownloadReport {
    pub fn from_status(status: &StatusReport, folders: &JobFolders) -> Self {
        if !status.all_complete {
            return Self {
                job_id: status.job_id.clone(),
                status: "waiting".to_string(),
                download_ready: false,
                files: BTreeMap::new(),
                base_folder: None,
                progress_pct: status.progress_pct,
            };
        }

        let mut files: BTreeMap<String, Vec<String>> = OutputFolder::ALL
            .iter()
            .map(|f| (f.as_str().to_string(), Vec::new()))
            .collect();
        for task in &status.tasks {
            let folder = OutputFolder::for_artifact(&task.name).as_str().to_string();
            files.entry(folder).or_default().push(task.file_name.clone());
        }

        Self {
            job_id: status.job_id.clone(),
            status: "ready".to_string(),
            download_ready: true,
            files,
            base_folder: Some(folders.base.clone()),
            progress_pct: status.progress_pct,
        }
    }
}

/// Outcome of [`start_ready`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReport {
    pub started: usize,
}

// ---------------------------------------------------------------------------
// Remote queries
// ---------------------------------------------------------------------------

/// Current view of a job's tasks.
///
/// With a manifest, the recorded task ids are queried directly and entries
/// that never reached the platform are kept as they are. Without one, every
/// remote task whose description is `<NAME>_<job_id>` is returned.
pub async fn fetch_tasks(
    platform: &dyn ComputePlatform,
    job_id: &str,
    manifest: Option<&[ExportTask]>,
) -> Result<Vec<ExportTask>> {
    match manifest {
        Some(manifest) if !manifest.is_empty() => {
            let ids: Vec<String> = manifest
                .iter()
                .filter_map(|t| t.remote_task_id.clone())
                .collect();
            let remote = if ids.is_empty() {
                Vec::new()
            } else {
                platform.list_tasks(&TaskFilter::Ids(ids)).await?
            };

            let mut tasks = manifest.to_vec();
            for task in &mut tasks {
                let Some(id) = task.remote_task_id.as_deref() else {
                    continue;
                };
                match remote.iter().find(|r| r.id == id) {
                    Some(r) => task.update_from(r),
                    None => debug!(job_id, task_id = id, "task not reported by the platform"),
                }
            }
            Ok(tasks)
        }
        _ => {
            let remote = platform
                .list_tasks(&TaskFilter::DescriptionContains(job_id.to_string()))
                .await?;
            Ok(remote
                .iter()
                .filter_map(|r| ExportTask::discovered(job_id, r))
                .collect())
        }
    }
}

/// Fold freshly fetched task states into a stored manifest.
///
/// Entries are matched by remote task id and the manifest keeps its length,
/// so a partial view of the job never drops tasks from it. An empty manifest
/// adopts `fetched` as it is.
pub fn merge_manifest(manifest: &mut Vec<ExportTask>, fetched: &[ExportTask]) {
    if manifest.is_empty() {
        manifest.extend_from_slice(fetched);
        return;
    }
    for task in manifest.iter_mut() {
        let Some(id) = task.remote_task_id.as_deref() else {
            continue;
        };
        if let Some(fresh) = fetched
            .iter()
            .find(|f| f.remote_task_id.as_deref() == Some(id))
        {
            task.state = fresh.state;
            task.error = fresh.error.clone();
        }
    }
}

/// Start every task that is waiting in `READY`.
pub async fn start_ready(
    platform: &dyn ComputePlatform,
    job_id: &str,
    tasks: &[ExportTask],
) -> Result<StartReport> {
    let mut started = 0;
    for task in tasks.iter().filter(|t| t.state == TaskState::Ready) {
        let Some(id) = task.remote_task_id.as_deref() else {
            continue;
        };
        platform.start_task(id).await?;
        started += 1;
    }
    info!(job_id, started, "queued tasks started");
    Ok(StartReport { started })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::description;

    fn task(name: &str, kind: ArtifactKind, state: TaskState) -> ExportTask {
        ExportTask {
            name: name.to_string(),
            description: description(name, "j1"),
            remote_task_id: Some(format!("T-{name}")),
            folder: String::new(),
            kind,
            file_name: format!("{}.{}", description(name, "j1"), kind.extension()),
            submitted_at: None,
            state,
            error: None,
        }
    }

    #[test]
    fn counts_add_up() {
        let report = StatusReport::from_tasks(
            "j1",
            vec![
                task("PNG_NDVI", ArtifactKind::Image, TaskState::Completed),
                task("PNG_NDWI", ArtifactKind::Image, TaskState::Running),
                task("TIFF_NDVI", ArtifactKind::Raster, TaskState::Cancelled),
                task("KPIS", ArtifactKind::Table, TaskState::Ready),
                task("TIME_SERIES", ArtifactKind::Table, TaskState::Unsubmitted),
            ],
        );
        assert_eq!(report.total, 5);
        assert_eq!(
            report.completed + report.running + report.failed + report.pending,
            report.total
        );
        assert_eq!(report.failed, 1);
        assert_eq!(report.pending, 2);
        assert!(report.any_failed);
        assert!(!report.png_complete);
        assert!(!report.all_complete);
        assert!(!report.terminal_with_failures());
        assert_eq!(report.progress_pct, 20);
    }

    #[test]
    fn progress_rounds_to_nearest() {
        let mut tasks = vec![task("KPIS", ArtifactKind::Table, TaskState::Completed)];
        tasks.push(task("TIME_SERIES", ArtifactKind::Table, TaskState::Completed));
        tasks.push(task("VRA_STATS", ArtifactKind::Table, TaskState::Running));
        let report = StatusReport::from_tasks("j1", tasks);
        assert_eq!(report.progress_pct, 67);
    }

    #[test]
    fn empty_job_is_not_complete() {
        let report = StatusReport::from_tasks("j1", Vec::new());
        assert!(!report.all_complete);
        assert!(!report.png_complete);
        assert_eq!(report.progress_pct, 0);
    }

    #[test]
    fn png_gate_ignores_other_kinds() {
        let report = StatusReport::from_tasks(
            "j1",
            vec![
                task("PNG_NDVI", ArtifactKind::Image, TaskState::Completed),
                task("TIFF_NDVI", ArtifactKind::Raster, TaskState::Running),
            ],
        );
        assert!(report.png_complete);
        assert!(!report.all_complete);
    }

    #[test]
    fn partial_view_does_not_shrink_the_manifest() {
        let mut manifest = vec![
            task("PNG_NDVI", ArtifactKind::Image, TaskState::Ready),
            task("TIFF_NDVI", ArtifactKind::Raster, TaskState::Ready),
            task("KPIS", ArtifactKind::Table, TaskState::Ready),
        ];
        let fresh = task("PNG_NDVI", ArtifactKind::Image, TaskState::Completed);
        merge_manifest(&mut manifest, &[fresh]);

        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest[0].state, TaskState::Completed);
        assert_eq!(manifest[2].state, TaskState::Ready);
        let report = StatusReport::from_tasks("j1", manifest);
        assert!(!report.all_complete);
        assert_eq!(report.progress_pct, 33);
    }

    #[test]
    fn empty_manifest_adopts_the_scan() {
        let mut manifest = Vec::new();
        let scanned = [
            task("KPIS", ArtifactKind::Table, TaskState::Running),
            task("TIME_SERIES", ArtifactKind::Table, TaskState::Completed),
        ];
        merge_manifest(&mut manifest, &scanned);
        assert_eq!(manifest, scanned.to_vec());
    }

    #[test]
    fn download_waits_until_everything_completed() {
        let folders = JobFolders::new("Orbita_Output", "j1");
        let waiting = StatusReport::from_tasks(
            "j1",
            vec![task("KPIS", ArtifactKind::Table, TaskState::Running)],
        );
        let report = DownloadReport::from_status(&waiting, &folders);
        assert_eq!(report.status, "waiting");
        assert!(!report.download_ready);
        assert!(report.files.is_empty());

        let done = StatusReport::from_tasks(
            "j1",
            vec![
                task("PNG_NDVI", ArtifactKind::Image, TaskState::Completed),
                task("KPIS", ArtifactKind::Table, TaskState::Completed),
            ],
        );
        let report = DownloadReport::from_status(&done, &folders);
        assert_eq!(report.status, "ready");
        assert_eq!(report.base_folder.as_deref(), Some("Orbita_Output/j1"));
        assert_eq!(report.files["WEB"], vec!["PNG_NDVI_j1.png".to_string()]);
        assert_eq!(report.files["DATA"], vec!["KPIS_j1.csv".to_string()]);
        assert!(report.files["VRA"].is_empty());
    }
}
