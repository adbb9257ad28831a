//! Blocking wrapper for callers without an async runtime.

use orbita_cloud::{CloudError, ComputePlatform};
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{EngineError, JobFailure, Result};
use crate::job::Job;
use crate::request::{AnalysisRequest, ExecutionReport};
use crate::status::{DownloadReport, StartReport, StatusReport};

/// [`Engine`] driven by its own current-thread runtime.
pub struct EngineBlocking {
    rt: Runtime,
    inner: Engine,
}

impl EngineBlocking {
    pub fn new(platform: Arc<dyn ComputePlatform>, config: EngineConfig) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EngineError::RemotePlatform(CloudError::Network(e.to_string())))?;
        let inner = Engine::new(platform, config)?;
        Ok(Self { rt, inner })
    }

    pub fn engine(&self) -> &Engine {
        &self.inner
    }

    pub fn execute(&self, request: AnalysisRequest) -> std::result::Result<ExecutionReport, JobFailure> {
        self.rt.block_on(self.inner.execute(request))
    }

    pub fn check_status(&self, job_id: &str) -> Result<StatusReport> {
        self.rt.block_on(self.inner.check_status(job_id))
    }

    pub fn download_results(&self, job_id: &str) -> Result<DownloadReport> {
        self.rt.block_on(self.inner.download_results(job_id))
    }

    pub fn start_tasks(&self, job_id: &str) -> Result<StartReport> {
        self.rt.block_on(self.inner.start_tasks(job_id))
    }

    pub fn job(&self, job_id: &str) -> Result<Job> {
        self.inner.job(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbita_cloud::InMemoryPlatform;

    #[test]
    fn unknown_job_without_tasks_reports_empty_status() {
        let engine =
            EngineBlocking::new(Arc::new(InMemoryPlatform::new()), EngineConfig::default()).unwrap();
        let status = engine.check_status("nobody").unwrap();
        assert_eq!(status.total, 0);
        assert!(!status.all_complete);
        assert!(matches!(engine.job("nobody"), Err(EngineError::UnknownJob(_))));

        let download = engine.download_results("nobody").unwrap();
        assert_eq!(download.status, "waiting");
        assert_eq!(engine.start_tasks("nobody").unwrap().started, 0);
    }
}
