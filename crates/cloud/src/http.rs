//! REST/JSON client for a compute platform gateway.
//!
//! Endpoints, relative to the base URL:
//!
//! | operation | request |
//! |---|---|
//! | search scenes | `POST /v1/scenes:search` with a [`SceneQuery`] body → `{"scenes": [...]}` |
//! | submit export | `POST /v1/tasks` with an [`ExportRequest`] body → [`RemoteTask`] |
//! | list tasks | `GET /v1/tasks?description_contains=..` or `?ids=a,b` → `{"tasks": [...]}` |
//! | start task | `POST /v1/tasks/{id}:start` → [`RemoteTask`] |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};
use crate::models::{ExportRequest, RawScene, RemoteTask, SceneQuery, TaskFilter};
use crate::platform::ComputePlatform;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`HttpPlatform`].
#[derive(Debug, Clone)]
pub struct HttpPlatformOptions {
    /// Per-request timeout (default 120 s; scene payloads can be large).
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpPlatformOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            user_agent: concat!("orbita/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Deserialize)]
struct SceneList {
    scenes: Vec<RawScene>,
}

#[derive(Deserialize)]
struct TaskList {
    tasks: Vec<RemoteTask>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct HttpPlatform {
    base_url: String,
    client: Client,
    auth: Box<dyn CloudAuth>,
}

impl HttpPlatform {
    pub fn new(
        base_url: &str,
        auth: Box<dyn CloudAuth>,
        options: HttpPlatformOptions,
    ) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|e| CloudError::Network(format!("invalid platform URL {base_url}: {e}")))?;
        let client = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(options.user_agent)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn tasks_url(&self, filter: &TaskFilter) -> Result<Url> {
        let (key, value) = match filter {
            TaskFilter::DescriptionContains(text) => ("description_contains", text.clone()),
            TaskFilter::Ids(ids) => ("ids", ids.join(",")),
        };
        Url::parse_with_params(&self.endpoint("tasks"), &[(key, value)])
            .map_err(|e| CloudError::Network(e.to_string()))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let mut auth_headers = Vec::new();
        self.auth
            .sign_request(url, method.as_str(), &mut auth_headers)?;

        let mut req = self.client.request(method.clone(), url);
        for (key, value) in &auth_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        debug!(%method, url, "platform request");
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Map a non-success status to the error the engine reports
fn status_error(status: StatusCode, body: String) -> CloudError {
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("no reason").to_string()
    } else {
        body
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CloudError::Auth(message),
        StatusCode::NOT_FOUND => CloudError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => CloudError::Quota(message),
        _ => CloudError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl ComputePlatform for HttpPlatform {
    fn name(&self) -> &str {
        "http"
    }

    async fn search_scenes(&self, query: &SceneQuery) -> Result<Vec<RawScene>> {
        let url = self.endpoint("scenes:search");
        let list: SceneList = self
            .call(Method::POST, &url, Some(serde_json::to_value(query)?))
            .await?;
        Ok(list.scenes)
    }

    async fn submit_task(&self, request: &ExportRequest) -> Result<RemoteTask> {
        let url = self.endpoint("tasks");
        self.call(Method::POST, &url, Some(serde_json::to_value(request)?))
            .await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<RemoteTask>> {
        let url = self.tasks_url(filter)?;
        let list: TaskList = self.call(Method::GET, url.as_str(), None).await?;
        Ok(list.tasks)
    }

    async fn start_task(&self, task_id: &str) -> Result<RemoteTask> {
        let url = self.endpoint(&format!("tasks/{task_id}:start"));
        self.call(Method::POST, &url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;

    fn platform() -> HttpPlatform {
        HttpPlatform::new(
            "https://platform.example.com/",
            Box::new(NoAuth),
            HttpPlatformOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn endpoints() {
        let p = platform();
        assert_eq!(p.endpoint("tasks"), "https://platform.example.com/v1/tasks");
        let url = p
            .tasks_url(&TaskFilter::DescriptionContains("job 1".into()))
            .unwrap();
        assert_eq!(url.query(), Some("description_contains=job+1"));
        let url = p.tasks_url(&TaskFilter::Ids(vec!["a".into(), "b".into()])).unwrap();
        assert_eq!(url.query(), Some("ids=a%2Cb"));
    }

    #[test]
    fn invalid_base_url() {
        assert!(HttpPlatform::new("not a url", Box::new(NoAuth), HttpPlatformOptions::default()).is_err());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(status_error(StatusCode::FORBIDDEN, String::new()), CloudError::Auth(_)));
        assert!(matches!(status_error(StatusCode::TOO_MANY_REQUESTS, "slow down".into()), CloudError::Quota(m) if m == "slow down"));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            CloudError::Api { status: 502, .. }
        ));
    }
}
