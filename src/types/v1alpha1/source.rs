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

use crate::types::v1alpha1::k8s::Algorithm;
use k8s_openapi::api::core::v1 as corev1;
use kube::KubeSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the adapter weights live and how they are named on the pods.
#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdapterSource {
    /// Source type: local, huggingface, s3 or cos
    #[serde(rename = "type")]
    pub type_: String,

    /// Repository the adapter is stored in. Its meaning depends on the type:
    /// a Hugging Face repo id, a bucket URL, or informational for local sources.
    #[serde(default)]
    pub repository: String,

    /// Path to the adapter weights.
    ///
    /// Required for local sources. For remote sources the controller writes
    /// the resolved download location back into this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_path: Option<String>,

    /// Name the adapter is registered under on the serving pods
    #[x_kube(validation = Rule::new("self.size() > 0").message("adapterName must not be empty"))]
    pub adapter_name: String,

    /// Regular expression filtering listed objects (s3/cos only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Upper bound on the number of adapter artifacts to load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_adapters: Option<u32>,

    /// Secret holding credentials for the source, in the adapter's namespace
    #[serde(
        default,
        rename = "credentialsRef",
        alias = "credentialsSecretRef",
        skip_serializing_if = "Option::is_none"
    )]
    pub credentials_ref: Option<corev1::LocalObjectReference>,
}

impl AdapterSource {
    /// The configured adapter path, treating an empty string as unset.
    pub fn adapter_path(&self) -> Option<&str> {
        self.adapter_path.as_deref().filter(|p| !p.is_empty())
    }

    /// Truncates `candidates` to `maxAdapters`, keeping discovery order.
    pub fn cap(&self, mut candidates: Vec<String>) -> Vec<String> {
        if let Some(max) = self.max_adapters {
            candidates.truncate(max as usize);
        }
        candidates
    }
}

/// How the adapter is rolled out across serving pods.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// Desired number of pods carrying the adapter.
    /// Not consulted by the default placement, which targets every pod.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,

    /// Placement algorithm: default, ordered or equalized
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

fn default_algorithm() -> String {
    Algorithm::Default.to_string()
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            replicas: None,
            algorithm: default_algorithm(),
        }
    }
}
