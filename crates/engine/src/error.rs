//! Error types for the analysis pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use orbita_cloud::CloudError;

use crate::config::ConfigError;

/// Errors produced by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no imagery: {0}")]
    NoImagery(String),

    #[error("zonation failed: {0}")]
    Zonation(String),

    #[error("remote task failure: {0}")]
    RemoteTaskFailure(String),

    #[error("remote platform error: {0}")]
    RemotePlatform(#[from] CloudError),

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("core error: {0}")]
    Core(orbita_core::Error),
}

impl From<orbita_core::Error> for EngineError {
    fn from(err: orbita_core::Error) -> Self {
        match err {
            orbita_core::Error::InvalidGeometry(msg) => EngineError::InvalidGeometry(msg),
            e @ orbita_core::Error::InvalidParameter { .. } => {
                EngineError::InvalidRequest(e.to_string())
            }
            other => EngineError::Core(other),
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EngineError::InvalidGeometry(_) => FailureKind::InvalidGeometry,
            EngineError::InvalidRequest(_) | EngineError::Config(_) => FailureKind::InvalidRequest,
            EngineError::NoImagery(_) => FailureKind::NoImagery,
            EngineError::Zonation(_) => FailureKind::ZonationFailure,
            EngineError::RemoteTaskFailure(_) => FailureKind::RemoteTaskFailure,
            EngineError::RemotePlatform(_) => FailureKind::RemotePlatform,
            EngineError::UnknownJob(_) => FailureKind::UnknownJob,
            EngineError::Core(_) => FailureKind::Internal,
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure category reported to callers of `execute`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidGeometry,
    InvalidRequest,
    NoImagery,
    ZonationFailure,
    RemoteTaskFailure,
    RemotePlatform,
    UnknownJob,
    Internal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::InvalidGeometry => "invalid_geometry",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::NoImagery => "no_imagery",
            FailureKind::ZonationFailure => "zonation_failure",
            FailureKind::RemoteTaskFailure => "remote_task_failure",
            FailureKind::RemotePlatform => "remote_platform",
            FailureKind::UnknownJob => "unknown_job",
            FailureKind::Internal => "internal",
        }
    }
}

/// Why a job could not be executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub job_id: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl JobFailure {
    pub fn new(job_id: &str, err: &EngineError) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} failed ({}): {}", self.job_id, self.kind.as_str(), self.reason)
    }
}

impl std::error::Error for JobFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_category() {
        let geom: EngineError = orbita_core::Error::InvalidGeometry("open ring".into()).into();
        assert_eq!(geom.kind(), FailureKind::InvalidGeometry);

        let param: EngineError = orbita_core::Error::InvalidParameter {
            name: "max_pixels",
            value: "2000000000".into(),
            reason: "too large".into(),
        }
        .into();
        assert_eq!(param.kind(), FailureKind::InvalidRequest);
    }

    #[test]
    fn failure_serializes_kind_in_snake_case() {
        let failure = JobFailure::new("j1", &EngineError::NoImagery("0 scenes".into()));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "no_imagery");
        assert!(failure.to_string().contains("no_imagery"));
    }
}
