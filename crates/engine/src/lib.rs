//! # Orbita Engine
//!
//! Runs a field analysis against a remote compute platform and tracks the
//! exports it submits.
//!
//! ## Pipeline
//!
//! 1. resolve the ROI and its analysis grid
//! 2. acquire and harmonize scenes from every configured sensor
//! 3. compute indices, the per-scene time series and the median composite
//! 4. KPIs with temporal and phenological context
//! 5. management zones (VRA), skipped with a reason when clustering degenerates
//! 6. one export task per artifact under `{base}/{job_id}/{WEB|TIFF|DATA|VRA}`
//!
//! Task progress is polled on demand with [`Engine::check_status`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use orbita_cloud::InMemoryPlatform;
//! use orbita_engine::{Engine, EngineConfig};
//!
//! # async fn run() -> orbita_engine::Result<()> {
//! let engine = Engine::new(Arc::new(InMemoryPlatform::new()), EngineConfig::default())?;
//! let status = engine.check_status("job-1").await?;
//! println!("{}% complete", status.progress_pct);
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod blocking;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod job;
pub mod kpi;
pub mod request;
pub mod status;
pub mod zonation;

pub use acquisition::Sensor;
pub use blocking::EngineBlocking;
pub use config::{ConfigError, ConfigLoader, EngineConfig, OrbitaConfig, PlatformConfig};
pub use engine::Engine;
pub use error::{EngineError, FailureKind, JobFailure, Result};
pub use export::{ExportTask, JobFolders, OutputFolder};
pub use job::{AnalysisWindow, Job, JobRegistry, JobStatus};
pub use kpi::{KpiRecord, TimeSeriesRow};
pub use request::{AnalysisRequest, ExecutionReport};
pub use status::{DownloadReport, StartReport, StatusReport};
pub use zonation::ZoneSummary;
