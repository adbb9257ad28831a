//! The analysis engine: runs jobs and tracks their exports.

use orbita_algorithms::imagery::{clip_indices, compute_indices, median_composite, CompositeParams};
use orbita_cloud::ComputePlatform;
use orbita_core::{resolve_roi, AnalysisGrid};
use std::sync::Arc;
use tracing::{info, warn};

use crate::acquisition::acquire;
use crate::config::EngineConfig;
use crate::error::{EngineError, JobFailure, Result};
use crate::export::{plan_artifacts, submit_artifacts, ExportInputs, ExportTarget, JobFolders};
use crate::job::{validate_job_id, Job, JobRegistry, JobStatus};
use crate::kpi::{build_kpis, time_series_row, KpiInputs};
use crate::request::{AnalysisRequest, ExecutionReport};
use crate::status::{
    fetch_tasks, merge_manifest, start_ready, DownloadReport, StartReport, StatusReport,
};
use crate::zonation::zonate;

/// Runs analyses against a compute platform.
///
/// Steps of one job run strictly in order and remote calls are awaited one at
/// a time. Jobs share nothing but the [`JobRegistry`].
pub struct Engine {
    platform: Arc<dyn ComputePlatform>,
    config: EngineConfig,
    registry: JobRegistry,
}

impl Engine {
    /// Validates `config`; jobs are persisted when it names a manifest directory.
    pub fn new(platform: Arc<dyn ComputePlatform>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let registry = match &config.manifest_dir {
            Some(dir) => JobRegistry::persistent(dir),
            None => JobRegistry::new(),
        };
        Ok(Self {
            platform,
            config,
            registry,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn platform(&self) -> &dyn ComputePlatform {
        self.platform.as_ref()
    }

    // -----------------------------------------------------------------------
    // execute
    // -----------------------------------------------------------------------

    /// Run one analysis end to end and submit its exports.
    ///
    /// On failure the job record moves to `failed` and the reason comes back
    /// as a [`JobFailure`]. A failed zoning step is not a failure: the report
    /// carries `vra_error` and no VRA artifacts are exported.
    pub async fn execute(&self, request: AnalysisRequest) -> std::result::Result<ExecutionReport, JobFailure> {
        match self.run(&request).await {
            Ok(report) => Ok(report),
            Err(err) => {
                let failure = JobFailure::new(&request.job_id, &err);
                warn!(job_id = %request.job_id, kind = failure.kind.as_str(), error = %err, "job failed");
                if validate_job_id(&request.job_id).is_ok() {
                    let mut job = self
                        .registry
                        .get(&request.job_id)
                        .unwrap_or_else(|| Job::new(&request.job_id, request.window()));
                    job.fail(err.to_string());
                    self.registry.upsert(job);
                }
                Err(failure)
            }
        }
    }

    async fn run(&self, request: &AnalysisRequest) -> Result<ExecutionReport> {
        request.validate()?;
        let job_id = request.job_id.as_str();
        let config = &self.config;

        let mut job = self
            .registry
            .get(job_id)
            .unwrap_or_else(|| Job::new(job_id, request.window()));
        job.window = request.window();
        job.status = JobStatus::Processing;
        job.error = None;
        self.registry.upsert(job);
        info!(job_id, start = %request.start_date, end = %request.end_date, crop = %request.crop_type, "job started");

        let roi = resolve_roi(&request.roi_geojson, request.buffer_m)?;
        let grid = AnalysisGrid::for_roi(&roi, config.scale_m, config.max_pixels)?;
        let mask = grid.rasterize(&roi);
        info!(job_id, area_ha = roi.area_ha(), rows = grid.rows, cols = grid.cols, "roi resolved");

        let acquisition = acquire(
            self.platform.as_ref(),
            &config.sensors,
            &grid,
            request.start_date,
            request.end_date,
            config.history_years,
            config.cloud_threshold_pct,
        )
        .await?;
        let observation_date = acquisition.latest().map(|s| s.date()).ok_or_else(|| {
            EngineError::NoImagery(format!(
                "no scene between {} and {} below {}% cloud cover",
                request.start_date, request.end_date, config.cloud_threshold_pct
            ))
        })?;
        info!(
            job_id,
            scenes = acquisition.scenes.len(),
            window = acquisition.window_count(),
            "imagery acquired"
        );

        let mut series = Vec::new();
        let mut window = Vec::new();
        for scene in &acquisition.scenes {
            let indices = compute_indices(&scene.bands)?;
            if let Some(row) = time_series_row(scene, &indices, &mask)? {
                series.push(row);
            }
            if (acquisition.start..=acquisition.end).contains(&scene.date()) {
                window.push(indices);
            }
        }

        let mut composite = median_composite(
            &window,
            CompositeParams {
                min_observations: config.min_observations,
            },
        )?;
        clip_indices(&mut composite.indices, &mask)?;

        let kpis = build_kpis(&KpiInputs {
            job_id,
            crop: request.crop_type,
            analysis_type: &request.analysis_type,
            roi: &roi,
            composite: &composite,
            mask: &mask,
            observation_date,
            series: &series,
            config,
        })?;
        info!(
            job_id,
            ndvi = kpis.ndvi_mean,
            status = kpis.status.as_str(),
            series = series.len(),
            "indicators computed"
        );

        let (zonation, vra_error) = match zonate(&composite.indices, &mask, config) {
            Ok(z) => (Some(z), None),
            Err(e) => {
                warn!(job_id, error = %e, "zoning skipped");
                (None, Some(e.to_string()))
            }
        };

        let folders = JobFolders::new(&config.output_base, job_id);
        let plan = plan_artifacts(&ExportInputs {
            composite: &composite.indices,
            zonation: zonation.as_ref(),
            kpis: &kpis,
            series: &series,
        })?;
        let target = ExportTarget {
            job_id,
            folders: &folders,
            region: roi.to_geojson(),
            scale_m: config.scale_m,
        };
        let tasks = submit_artifacts(self.platform.as_ref(), &target, plan).await?;

        let vra_stats = zonation.map(|z| z.summaries);
        self.registry.update(job_id, |job| {
            job.roi = roi.ring();
            job.kpis = Some(kpis.clone());
            job.zones = vra_stats.clone();
            job.vra_error = vra_error.clone();
            job.manifest = tasks.clone();
            job.folders = Some(folders.clone());
        });
        info!(job_id, tasks = tasks.len(), "job submitted");

        Ok(ExecutionReport {
            job_id: job_id.to_string(),
            kpis,
            vra_stats,
            vra_error,
            bounds: roi.bounds(),
            tasks,
            time_series: series,
            folders,
        })
    }

    // -----------------------------------------------------------------------
    // Tracking
    // -----------------------------------------------------------------------

    /// Poll the job's tasks and update its record.
    ///
    /// A job this engine has never seen is looked up by description; if no
    /// task matches, the report is simply empty.
    pub async fn check_status(&self, job_id: &str) -> Result<StatusReport> {
        validate_job_id(job_id)?;
        let job = self.registry.get(job_id);
        let manifest = job.as_ref().map(|j| j.manifest.as_slice());
        let tasks = fetch_tasks(self.platform.as_ref(), job_id, manifest).await?;
        let mut report = StatusReport::from_tasks(job_id, tasks);

        if job.is_some() {
            // `execute` may have stored a fuller manifest while we were polling
            let stored = self.registry.update(job_id, |job| {
                merge_manifest(&mut job.manifest, &report.tasks);
                let merged = StatusReport::from_tasks(job_id, job.manifest.clone());
                if merged.all_complete {
                    job.status = JobStatus::Completed;
                    job.error = None;
                } else if merged.terminal_with_failures() {
                    let err = EngineError::RemoteTaskFailure(format!(
                        "{} of {} export task(s) failed",
                        merged.failed, merged.total
                    ));
                    job.fail(err.to_string());
                }
            });
            if let Some(stored) = stored {
                report = StatusReport::from_tasks(job_id, stored.manifest);
            }
        }
        info!(
            job_id,
            completed = report.completed,
            total = report.total,
            progress = report.progress_pct,
            "status checked"
        );
        Ok(report)
    }

    /// Report whether every artifact is ready and where the files are.
    pub async fn download_results(&self, job_id: &str) -> Result<DownloadReport> {
        let status = self.check_status(job_id).await?;
        let folders = self
            .registry
            .get(job_id)
            .and_then(|j| j.folders)
            .unwrap_or_else(|| JobFolders::new(&self.config.output_base, job_id));
        Ok(DownloadReport::from_status(&status, &folders))
    }

    /// Start the job's tasks that are queued in `READY`.
    pub async fn start_tasks(&self, job_id: &str) -> Result<StartReport> {
        validate_job_id(job_id)?;
        let job = self.registry.get(job_id);
        let manifest = job.as_ref().map(|j| j.manifest.as_slice());
        let tasks = fetch_tasks(self.platform.as_ref(), job_id, manifest).await?;
        start_ready(self.platform.as_ref(), job_id, &tasks).await
    }

    /// Snapshot of a job record
    pub fn job(&self, job_id: &str) -> Result<Job> {
        validate_job_id(job_id)?;
        self.registry
            .get(job_id)
            .ok_or_else(|| EngineError::UnknownJob(job_id.to_string()))
    }
}
