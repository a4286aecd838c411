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

//! Adapter placement: which serving pods should carry an adapter.
//!
//! Placement is a trait so load-aware strategies can be added without touching
//! adapter discovery or the load protocol.

use crate::context;
use crate::types::v1alpha1::k8s::Algorithm;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use snafu::{ResultExt, Snafu};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub const APP_LABEL: &str = "app";
pub const APP_LABEL_VALUE: &str = "vllm";
pub const MODEL_LABEL: &str = "model";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to list pods in namespace '{}': {}", namespace, source))]
    ListPods {
        namespace: String,
        source: context::Error,
    },

    #[snafu(display("unknown placement algorithm '{}'", name))]
    UnknownAlgorithm { name: String },

    #[snafu(display("placement algorithm '{}' is not available", algorithm))]
    AlgorithmUnavailable { algorithm: Algorithm },
}

/// Pod listing by exact label match.
#[async_trait]
pub trait PodLister: Send + Sync {
    async fn list_pods(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, context::Error>;
}

#[async_trait]
pub trait PlacementStrategy: Send + Sync {
    /// Pods that should load an adapter for `base_model`.
    async fn place_adapter(&self, base_model: &str, algorithm: &str) -> Result<Vec<Pod>, Error>;
}

/// Places every adapter on all pods serving its base model.
pub struct DefaultPlacement {
    pods: Arc<dyn PodLister>,
    namespace: String,
}

impl DefaultPlacement {
    pub fn new(pods: Arc<dyn PodLister>, namespace: String) -> Self {
        Self { pods, namespace }
    }

    pub fn selector(base_model: &str) -> BTreeMap<String, String> {
        [
            (APP_LABEL.to_owned(), APP_LABEL_VALUE.to_owned()),
            (MODEL_LABEL.to_owned(), base_model.to_owned()),
        ]
        .into_iter()
        .collect()
    }
}

#[async_trait]
impl PlacementStrategy for DefaultPlacement {
    async fn place_adapter(&self, base_model: &str, algorithm: &str) -> Result<Vec<Pod>, Error> {
        let algorithm = Algorithm::from_str(algorithm).map_err(|_| Error::UnknownAlgorithm {
            name: algorithm.to_owned(),
        })?;

        match algorithm {
            Algorithm::Default => {}
            Algorithm::Ordered | Algorithm::Equalized => {
                return AlgorithmUnavailableSnafu { algorithm }.fail();
            }
        }

        let pods = self
            .pods
            .list_pods(&self.namespace, &Self::selector(base_model))
            .await
            .context(ListPodsSnafu {
                namespace: self.namespace.clone(),
            })?;

        debug!(
            "placement {algorithm} selected {} pods for base model {base_model}",
            pods.len()
        );
        Ok(pods)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{DefaultPlacement, Error, PlacementStrategy};
    use crate::tests::{FakePods, create_test_pod};
    use std::sync::Arc;

    fn placement(pods: Arc<FakePods>) -> DefaultPlacement {
        DefaultPlacement::new(pods, "default".to_string())
    }

    #[tokio::test]
    async fn test_selects_pods_of_base_model() {
        let pods = Arc::new(FakePods::new(vec![
            create_test_pod("vllm-0", "default", "llama2-7b", Some("10.0.0.1")),
            create_test_pod("vllm-1", "default", "mistral-7b", Some("10.0.0.2")),
            create_test_pod("vllm-2", "default", "llama2-7b", Some("10.0.0.3")),
            create_test_pod("vllm-3", "other", "llama2-7b", Some("10.0.0.4")),
        ]));

        let selected = placement(pods)
            .place_adapter("llama2-7b", "default")
            .await
            .expect("placement should succeed");

        let mut names: Vec<_> = selected
            .iter()
            .filter_map(|p| p.metadata.name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["vllm-0", "vllm-2"]);
    }

    #[tokio::test]
    async fn test_pods_without_app_label_are_ignored() {
        let mut stray = create_test_pod("stray", "default", "llama2-7b", Some("10.0.0.9"));
        if let Some(labels) = stray.metadata.labels.as_mut() {
            labels.insert("app".to_string(), "sglang".to_string());
        }
        let pods = Arc::new(FakePods::new(vec![stray]));

        let selected = placement(pods)
            .place_adapter("llama2-7b", "default")
            .await
            .expect("placement should succeed");
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_algorithm_is_rejected() {
        let pods = Arc::new(FakePods::new(vec![]));
        let err = placement(pods)
            .place_adapter("llama2-7b", "random")
            .await
            .expect_err("unknown algorithm must fail");

        assert!(matches!(err, Error::UnknownAlgorithm { ref name } if name == "random"));
    }

    #[tokio::test]
    async fn test_reserved_algorithms_do_not_fall_back() {
        let pods = Arc::new(FakePods::new(vec![create_test_pod(
            "vllm-0",
            "default",
            "llama2-7b",
            Some("10.0.0.1"),
        )]));
        let placement = placement(pods);

        for name in ["ordered", "equalized"] {
            let err = placement
                .place_adapter("llama2-7b", name)
                .await
                .expect_err("reserved algorithm must fail");
            assert!(matches!(err, Error::AlgorithmUnavailable { .. }));
        }
    }

    #[tokio::test]
    async fn test_listing_failure_is_placement_error() {
        let pods = Arc::new(FakePods::failing());
        let err = placement(pods)
            .place_adapter("llama2-7b", "default")
            .await
            .expect_err("listing failure must surface");

        assert!(matches!(err, Error::ListPods { .. }));
        assert!(err.to_string().contains("namespace 'default'"));
    }
}
