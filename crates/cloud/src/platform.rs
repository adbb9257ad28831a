//! The narrow interface Orbita needs from a geospatial compute platform.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ExportRequest, RawScene, RemoteTask, SceneQuery, TaskFilter};

/// Catalog search plus a batch export queue.
///
/// Implementations never retry; transport, auth and quota failures are
/// returned as [`CloudError`](crate::CloudError) and the caller decides.
#[async_trait]
pub trait ComputePlatform: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Scenes of one collection intersecting the query, on the query grid
    async fn search_scenes(&self, query: &SceneQuery) -> Result<Vec<RawScene>>;

    /// Queue an export. The returned task is usually `READY` or `RUNNING`.
    async fn submit_task(&self, request: &ExportRequest) -> Result<RemoteTask>;

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<RemoteTask>>;

    /// Start a task that is waiting in `READY`
    async fn start_task(&self, task_id: &str) -> Result<RemoteTask>;
}
