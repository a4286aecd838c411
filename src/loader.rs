// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loads adapters into serving pods over their OpenAI-compatible API.
//!
//! The serving API has no idempotency key, so "already loaded" is detected in
//! two places: the adapter shows up in the model list, or the load call is
//! rejected with a message saying so.

use crate::config::MANAGER_NAME;
use crate::types::v1alpha1::status::adapter::{AssignmentStatus, PodAssignment};
use http::StatusCode;
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::time::Duration;
use tracing::{debug, info};

pub const MODELS_PATH: &str = "/v1/models";
pub const LOAD_ADAPTER_PATH: &str = "/v1/load_lora_adapter";

const ALREADY_LOADED: &str = "already been loaded";
const USER_AGENT: &str = const_str::concat!(MANAGER_NAME, "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("pod IP not found"))]
    MissingPodIp,

    #[snafu(display("{}", source))]
    Request { source: reqwest::Error },

    #[snafu(display("status code {} - {}", status, body))]
    Rejected { status: u16, body: String },
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelCard>,
}

#[derive(Deserialize)]
struct ModelCard {
    id: String,
}

#[derive(Serialize)]
struct LoadAdapterRequest<'a> {
    lora_name: &'a str,
    lora_path: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

pub struct PodLoader {
    client: reqwest::Client,
    port: u16,
}

impl PodLoader {
    pub fn new(port: u16, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, port })
    }

    fn base_url(&self, pod: &Pod) -> Option<String> {
        pod.status
            .as_ref()
            .and_then(|s| s.pod_ip.as_deref())
            .filter(|ip| !ip.is_empty())
            .map(|ip| format!("http://{}:{}", ip, self.port))
    }

    /// Makes sure `adapter_name` is served by `pod`.
    ///
    /// Never fails: the outcome is carried by the returned assignment, and the
    /// error (if any) is handed back separately for logging.
    pub async fn ensure_loaded(
        &self,
        pod: &Pod,
        adapter_name: &str,
        adapter_path: &str,
    ) -> (PodAssignment, Option<Error>) {
        let result = match self.base_url(pod) {
            Some(base) => self.load(&base, adapter_name, adapter_path).await,
            None => MissingPodIpSnafu.fail(),
        };

        match result {
            Ok(()) => (PodAssignment::new(pod, AssignmentStatus::Ready), None),
            Err(e) => (
                PodAssignment::new(pod, AssignmentStatus::Failed(e.to_string())),
                Some(e),
            ),
        }
    }

    async fn load(&self, base: &str, adapter_name: &str, adapter_path: &str) -> Result<(), Error> {
        if self.is_loaded(base, adapter_name).await? {
            debug!("adapter {adapter_name} already served by {base}");
            return Ok(());
        }

        let response = self
            .client
            .post(format!("{base}{LOAD_ADAPTER_PATH}"))
            .json(&LoadAdapterRequest {
                lora_name: adapter_name,
                lora_path: adapter_path,
            })
            .send()
            .await
            .context(RequestSnafu)?;

        let status = response.status();
        let body = response.text().await.context(RequestSnafu)?;

        if status == StatusCode::OK {
            info!("adapter {adapter_name} loaded on {base}");
            return Ok(());
        }

        if status == StatusCode::BAD_REQUEST
            && serde_json::from_str::<ErrorBody>(&body)
                .is_ok_and(|e| e.message.contains(ALREADY_LOADED))
        {
            debug!("adapter {adapter_name} was loaded concurrently on {base}");
            return Ok(());
        }

        RejectedSnafu {
            status: status.as_u16(),
            body,
        }
        .fail()
    }

    async fn is_loaded(&self, base: &str, adapter_name: &str) -> Result<bool, Error> {
        let response = self
            .client
            .get(format!("{base}{MODELS_PATH}"))
            .send()
            .await
            .context(RequestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return RejectedSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let models: ModelList = response.json().await.context(RequestSnafu)?;
        Ok(models.data.iter().any(|m| m.id.contains(adapter_name)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{Error, PodLoader};
    use crate::tests::{FakeServingPod, create_test_pod};
    use crate::types::v1alpha1::status::adapter::AssignmentStatus;
    use std::time::Duration;

    fn loader(port: u16) -> PodLoader {
        PodLoader::new(port, Duration::from_secs(5)).expect("client should build")
    }

    #[tokio::test]
    async fn test_pod_without_ip_fails_without_network() {
        let pod = create_test_pod("vllm-0", "default", "llama2-7b", None);
        let (assignment, err) = loader(1).ensure_loaded(&pod, "sql", "/models/sql").await;

        assert_eq!(
            assignment.status,
            AssignmentStatus::Failed("pod IP not found".to_string())
        );
        assert!(matches!(err, Some(Error::MissingPodIp)));
    }

    #[tokio::test]
    async fn test_loads_adapter_and_short_circuits_second_call() {
        let server = FakeServingPod::start().await;
        let pod = create_test_pod("vllm-0", "default", "llama2-7b", Some("127.0.0.1"));
        let loader = loader(server.port());

        let (first, err) = loader.ensure_loaded(&pod, "sql", "/models/sql").await;
        assert_eq!(first.status, AssignmentStatus::Ready);
        assert!(err.is_none());

        let (second, err) = loader.ensure_loaded(&pod, "sql", "/models/sql").await;
        assert_eq!(second.status, AssignmentStatus::Ready);
        assert!(err.is_none());

        assert_eq!(server.load_calls(), 1, "second call must not POST");
        assert_eq!(
            server.last_load_body(),
            Some(serde_json::json!({"lora_name": "sql", "lora_path": "/models/sql"}))
        );
    }

    #[tokio::test]
    async fn test_listed_adapter_is_matched_by_substring() {
        let server = FakeServingPod::start().await;
        server.serve_model("meta-llama/sql-lora-v2");
        let pod = create_test_pod("vllm-0", "default", "llama2-7b", Some("127.0.0.1"));

        let (assignment, _) = loader(server.port())
            .ensure_loaded(&pod, "sql-lora", "/models/sql-lora")
            .await;

        assert_eq!(assignment.status, AssignmentStatus::Ready);
        assert_eq!(server.load_calls(), 0);
    }

    #[tokio::test]
    async fn test_already_loaded_rejection_is_ready() {
        let server = FakeServingPod::start().await;
        server.respond_to_load(400, r#"{"message":"adapter already been loaded"}"#);
        let pod = create_test_pod("vllm-0", "default", "llama2-7b", Some("127.0.0.1"));

        let (assignment, err) = loader(server.port())
            .ensure_loaded(&pod, "sql", "/models/sql")
            .await;

        assert_eq!(assignment.status, AssignmentStatus::Ready);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_other_bad_request_is_failure() {
        let server = FakeServingPod::start().await;
        server.respond_to_load(400, r#"{"message":"path does not exist"}"#);
        let pod = create_test_pod("vllm-0", "default", "llama2-7b", Some("127.0.0.1"));

        let (assignment, err) = loader(server.port())
            .ensure_loaded(&pod, "sql", "/models/sql")
            .await;

        assert_eq!(
            assignment.status,
            AssignmentStatus::Failed(
                r#"status code 400 - {"message":"path does not exist"}"#.to_string()
            )
        );
        assert!(matches!(err, Some(Error::Rejected { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_server_error_is_failure() {
        let server = FakeServingPod::start().await;
        server.respond_to_load(500, "boom");
        let pod = create_test_pod("vllm-0", "default", "llama2-7b", Some("127.0.0.1"));

        let (assignment, _) = loader(server.port())
            .ensure_loaded(&pod, "sql", "/models/sql")
            .await;

        assert_eq!(
            assignment.status,
            AssignmentStatus::Failed("status code 500 - boom".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_pod_is_transport_failure() {
        // bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let pod = create_test_pod("vllm-0", "default", "llama2-7b", Some("127.0.0.1"));
        let (assignment, err) = loader(port).ensure_loaded(&pod, "sql", "/models/sql").await;

        assert!(matches!(assignment.status, AssignmentStatus::Failed(_)));
        assert!(matches!(err, Some(Error::Request { .. })));
    }
}
