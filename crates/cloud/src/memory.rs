//! In-process platform used by tests and offline runs.
//!
//! Scenes are registered up front; exports are queued as tasks whose state
//! the caller advances by hand (`complete_all`, `set_task_state`).

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orbita_core::geometry::AnalysisGrid;
use orbita_core::Raster;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CloudError, Result};
use crate::models::{
    ExportRequest, RasterPayload, RawScene, RemoteTask, SceneQuery, TaskFilter, TaskState,
};
use crate::platform::ComputePlatform;

#[derive(Default)]
struct State {
    scenes: BTreeMap<String, Vec<RawScene>>,
    tasks: Vec<RemoteTask>,
    submitted: Vec<ExportRequest>,
    reject_descriptions: Vec<String>,
    search_failure: Option<String>,
    auto_start: bool,
}

/// A [`ComputePlatform`] held entirely in memory
#[derive(Default)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submitted tasks go straight to `RUNNING` instead of `READY`
    pub fn with_auto_start(self, auto_start: bool) -> Self {
        self.lock().auto_start = auto_start;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_scene(&self, scene: RawScene) {
        self.lock()
            .scenes
            .entry(scene.collection.clone())
            .or_default()
            .push(scene);
    }

    pub fn add_scenes(&self, scenes: impl IntoIterator<Item = RawScene>) {
        for scene in scenes {
            self.add_scene(scene);
        }
    }

    /// Make every catalog search fail with an API error
    pub fn fail_search(&self, message: &str) {
        self.lock().search_failure = Some(message.to_string());
    }

    /// Reject submissions whose description contains `needle`
    pub fn fail_submission_for(&self, needle: &str) {
        self.lock().reject_descriptions.push(needle.to_string());
    }

    pub fn set_task_state(&self, task_id: &str, state: TaskState) -> Result<()> {
        let mut guard = self.lock();
        let task = guard
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| CloudError::NotFound(format!("task {task_id}")))?;
        transition(task, state);
        Ok(())
    }

    /// Set the state of every task whose description contains `needle`;
    /// returns how many changed
    pub fn set_state_where(&self, needle: &str, state: TaskState) -> usize {
        let mut guard = self.lock();
        let mut n = 0;
        for task in guard.tasks.iter_mut().filter(|t| t.description.contains(needle)) {
            transition(task, state);
            n += 1;
        }
        n
    }

    pub fn complete_all(&self) {
        let mut guard = self.lock();
        for task in guard.tasks.iter_mut().filter(|t| !t.state.is_terminal()) {
            transition(task, TaskState::Completed);
        }
    }

    pub fn tasks(&self) -> Vec<RemoteTask> {
        self.lock().tasks.clone()
    }

    pub fn submitted_requests(&self) -> Vec<ExportRequest> {
        self.lock().submitted.clone()
    }
}

fn transition(task: &mut RemoteTask, state: TaskState) {
    task.state = state;
    task.updated_at = Some(Utc::now());
    if state.is_failure() && task.error_message.is_none() {
        task.error_message = Some(format!("task {}", state.as_str().to_lowercase()));
    }
}

fn scene_matches(scene: &RawScene, query: &SceneQuery) -> bool {
    let day = scene.acquired.date_naive();
    if day < query.start || day > query.end {
        return false;
    }
    scene
        .cloud_cover
        .map_or(true, |cc| cc < query.max_cloud_pct)
}

#[async_trait]
impl ComputePlatform for InMemoryPlatform {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search_scenes(&self, query: &SceneQuery) -> Result<Vec<RawScene>> {
        let guard = self.lock();
        if let Some(message) = &guard.search_failure {
            return Err(CloudError::Api {
                status: 500,
                message: message.clone(),
            });
        }
        let scenes: Vec<RawScene> = guard
            .scenes
            .get(&query.collection)
            .into_iter()
            .flatten()
            .filter(|s| scene_matches(s, query))
            .map(|s| {
                let mut scene = s.clone();
                if !query.bands.is_empty() {
                    scene.bands.retain(|name, _| query.bands.contains(name));
                }
                scene
            })
            .collect();
        debug!(
            collection = %query.collection,
            found = scenes.len(),
            "in-memory scene search"
        );
        Ok(scenes)
    }

    async fn submit_task(&self, request: &ExportRequest) -> Result<RemoteTask> {
        let mut guard = self.lock();
        if guard
            .reject_descriptions
            .iter()
            .any(|needle| request.description.contains(needle.as_str()))
        {
            return Err(CloudError::Api {
                status: 400,
                message: format!("export {} rejected", request.description),
            });
        }

        let state = if guard.auto_start {
            TaskState::Running
        } else {
            TaskState::Ready
        };
        let task = RemoteTask {
            id: Uuid::new_v4().simple().to_string().to_uppercase(),
            description: request.description.clone(),
            state,
            kind: Some(request.kind),
            folder: Some(request.folder.clone()),
            file_name: Some(format!(
                "{}.{}",
                request.file_name_prefix,
                request.kind.extension()
            )),
            created_at: Utc::now(),
            updated_at: None,
            error_message: None,
        };
        guard.tasks.push(task.clone());
        guard.submitted.push(request.clone());
        Ok(task)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<RemoteTask>> {
        Ok(self
            .lock()
            .tasks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn start_task(&self, task_id: &str) -> Result<RemoteTask> {
        let mut guard = self.lock();
        let task = guard
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| CloudError::NotFound(format!("task {task_id}")))?;
        if matches!(task.state, TaskState::Ready | TaskState::Unsubmitted) {
            transition(task, TaskState::Running);
        }
        Ok(task.clone())
    }
}

/// A scene whose bands are constant over `grid`, in native units
pub fn uniform_scene(
    id: &str,
    collection: &str,
    acquired: DateTime<Utc>,
    cloud_cover: Option<f64>,
    grid: &AnalysisGrid,
    bands: &[(&str, f64)],
) -> RawScene {
    let bands = bands
        .iter()
        .map(|(name, value)| {
            let raster = Raster::filled(grid.rows, grid.cols, *value)
                .with_geo(grid.transform, Some(grid.crs()));
            (name.to_string(), RasterPayload::from_raster(&raster))
        })
        .collect();
    RawScene {
        id: id.to_string(),
        collection: collection.to_string(),
        acquired,
        cloud_cover,
        bands,
    }
}
