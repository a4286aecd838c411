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

use crate::types;
use crate::types::error::NoNamespaceSnafu;
use crate::types::v1alpha1::source::{AdapterSource, DeploymentConfig};
use kube::{CustomResource, KubeSchema, ResourceExt};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "production-stack.vllm.ai",
    version = "v1alpha1",
    kind = "LoraAdapter",
    namespaced,
    status = "crate::types::v1alpha1::status::Status",
    shortname = "lora",
    plural = "loraadapters",
    singular = "loraadapter",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct LoraAdapterSpec {
    /// Base model the adapter augments; selects the serving pods
    #[x_kube(validation = Rule::new("self.size() > 0").message("baseModel must not be empty"))]
    pub base_model: String,

    pub adapter_source: AdapterSource,

    #[serde(default)]
    pub deployment_config: DeploymentConfig,
}

impl LoraAdapter {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    /// Name the adapter is presented under to the serving pods.
    pub fn adapter_name(&self) -> &str {
        &self.spec.adapter_source.adapter_name
    }

    /// Expected local directory for downloaded weights of this adapter.
    pub fn download_dir(&self, root: &std::path::Path) -> std::path::PathBuf {
        root.join(self.adapter_name())
    }
}
