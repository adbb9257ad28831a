//! # Orbita Cloud
//!
//! Access to the remote geospatial compute platform Orbita runs on.
//!
//! The engine only needs two things from the platform: a scene catalog that
//! delivers rasters on a requested grid, and a batch export queue. Both sit
//! behind the [`ComputePlatform`] trait.
//!
//! - [`HttpPlatform`]: REST/JSON gateway client (reqwest, bearer auth)
//! - [`InMemoryPlatform`]: in-process platform for tests and offline runs

pub mod auth;
pub mod error;
pub mod http;
pub mod memory;
pub mod models;
pub mod platform;

pub use auth::{BearerAuth, CloudAuth, NoAuth};
pub use error::{CloudError, Result};
pub use http::{HttpPlatform, HttpPlatformOptions};
pub use memory::InMemoryPlatform;
pub use models::{
    ArtifactKind, ExportPayload, ExportRequest, RasterPayload, RawScene, RemoteTask,
    SceneQuery, TaskFilter, TaskState, Visualization,
};
pub use platform::ComputePlatform;
