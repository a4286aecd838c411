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

use crate::config::{Config, MANAGER_NAME};
use crate::loader::PodLoader;
use crate::placement::{DefaultPlacement, PlacementStrategy, PodLister};
use crate::source::huggingface::HuggingFaceFetcher;
use crate::source::{AdapterResolver, ArtifactFetcher};
use crate::types;
use crate::types::v1alpha1::lora_adapter::LoraAdapter;
use crate::types::v1alpha1::status::Status;
use crate::types::v1alpha1::status::phase::Phase;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{ListParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Resource, api::Api};
use snafu::futures::TryFutureExt;
use snafu::{ResultExt, Snafu};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("record event error: {}", source))]
    Record { source: kube::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(display("credential secret '{}' not found", name))]
    CredentialSecretNotFound { name: String },

    #[snafu(display("failed to build HTTP client: {}", source))]
    HttpClient { source: reqwest::Error },

    #[snafu(transparent)]
    Serde { source: serde_json::Error },
}

impl Error {
    fn api_code(&self) -> Option<u16> {
        match self {
            Error::Kube {
                source: kube::Error::Api(response),
            } => Some(response.code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::CredentialSecretNotFound { .. }) || self.api_code() == Some(404)
    }

    /// The write carried a stale resourceVersion.
    pub fn is_conflict(&self) -> bool {
        self.api_code() == Some(409)
    }
}

/// Read/write access to LoraAdapter records.
#[async_trait]
pub trait AdapterStore: Send + Sync {
    /// Fetches the latest copy, `None` once the object is gone.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<LoraAdapter>, Error>;

    /// Replaces the spec. Used to write back resolved adapter paths.
    async fn replace(&self, adapter: &LoraAdapter) -> Result<LoraAdapter, Error>;

    /// Replaces the status subresource. Rejected when `adapter` is stale.
    async fn replace_status(&self, adapter: &LoraAdapter) -> Result<LoraAdapter, Error>;

    async fn record(
        &self,
        adapter: &LoraAdapter,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), Error>;
}

/// Credential lookup by secret name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, Error>;
}

/// Store backed by the Kubernetes API.
pub struct KubeStore {
    client: kube::Client,
    recorder: Recorder,
}

impl KubeStore {
    pub fn new(client: kube::Client) -> Self {
        let reporter = Reporter {
            controller: MANAGER_NAME.into(),
            instance: std::env::var("HOSTNAME").ok(),
        };

        let recorder = Recorder::new(client.clone(), reporter);
        Self { client, recorder }
    }

    fn adapters(&self, namespace: &str) -> Api<LoraAdapter> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl AdapterStore for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<LoraAdapter>, Error> {
        self.adapters(namespace)
            .get_opt(name)
            .context(KubeSnafu)
            .await
    }

    async fn replace(&self, adapter: &LoraAdapter) -> Result<LoraAdapter, Error> {
        self.adapters(&adapter.namespace()?)
            .replace(&adapter.name(), &PostParams::default(), adapter)
            .context(KubeSnafu)
            .await
    }

    async fn replace_status(&self, adapter: &LoraAdapter) -> Result<LoraAdapter, Error> {
        self.adapters(&adapter.namespace()?)
            .replace_status(&adapter.name(), &PostParams::default(), adapter)
            .context(KubeSnafu)
            .await
    }

    /// send event
    async fn record(
        &self,
        adapter: &LoraAdapter,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), Error> {
        self.recorder
            .publish(
                &Event {
                    type_: event_type,
                    reason: reason.to_owned(),
                    note: Some(message.into()),
                    action: "Reconcile".into(),
                    secondary: None,
                },
                &adapter.object_ref(&()),
            )
            .context(RecordSnafu)
            .await
    }
}

#[async_trait]
impl SecretStore for KubeStore {
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .context(KubeSnafu)
            .await?
            .ok_or_else(|| Error::CredentialSecretNotFound {
                name: name.to_owned(),
            })?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }
}

#[async_trait]
impl PodLister for KubeStore {
    async fn list_pods(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, Error> {
        let selector = labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");

        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api
            .list(&ListParams::default().labels(&selector))
            .context(KubeSnafu)
            .await?;
        Ok(pods.items)
    }
}

pub struct Context {
    pub(crate) config: Config,
    pub(crate) store: Arc<dyn AdapterStore>,
    pub(crate) resolver: AdapterResolver,
    pub(crate) placement: Arc<dyn PlacementStrategy>,
    pub(crate) loader: PodLoader,
    pub(crate) shutdown: CancellationToken,
}

impl Context {
    pub fn new(
        client: kube::Client,
        config: Config,
        shutdown: CancellationToken,
    ) -> Result<Self, Error> {
        let store = Arc::new(KubeStore::new(client));
        let fetcher = Arc::new(
            HuggingFaceFetcher::new(&config.hf_endpoint, config.hf_timeout())
                .context(HttpClientSnafu)?,
        );
        let placement = Arc::new(DefaultPlacement::new(
            store.clone(),
            config.pod_namespace.clone(),
        ));

        Self::with_backends(config, store.clone(), store, fetcher, placement, shutdown)
    }

    pub fn with_backends(
        config: Config,
        store: Arc<dyn AdapterStore>,
        secrets: Arc<dyn SecretStore>,
        fetcher: Arc<dyn ArtifactFetcher>,
        placement: Arc<dyn PlacementStrategy>,
        shutdown: CancellationToken,
    ) -> Result<Self, Error> {
        let resolver = AdapterResolver::new(secrets, fetcher, config.download_path.clone());
        let loader = PodLoader::new(config.service_port, config.request_timeout())
            .context(HttpClientSnafu)?;

        Ok(Self {
            config,
            store,
            resolver,
            placement,
            loader,
            shutdown,
        })
    }

    /// Writes `status` as the whole new status of `adapter`.
    ///
    /// A phase change is also published as an event. Event failures are only logged.
    pub async fn update_status(
        &self,
        adapter: &LoraAdapter,
        status: Status,
    ) -> Result<LoraAdapter, Error> {
        let previous = adapter.status.as_ref();
        let status = status.observe(adapter.metadata.generation, previous);
        let phase_changed = previous.is_none_or(|s| s.phase != status.phase);

        let mut updated = adapter.clone();
        updated.status = Some(status);
        let stored = self.store.replace_status(&updated).await?;

        if phase_changed && let Some(status) = &updated.status {
            let event_type = match status.phase {
                Phase::Ready => EventType::Normal,
                _ => EventType::Warning,
            };
            let message = status
                .message
                .clone()
                .unwrap_or_else(|| format!("adapter is {}", status.phase));

            if let Err(e) = self
                .store
                .record(&stored, event_type, &status.phase.to_string(), &message)
                .await
            {
                warn!("failed to publish phase event for {}: {}", stored.name(), e);
            }
        }

        debug!("status of {} updated", stored.name());
        Ok(stored)
    }
}
