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

pub mod adapter;
pub mod condition;
pub mod phase;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Observed state of a LoraAdapter, rewritten as a whole on every pass.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub phase: phase::Phase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loaded_adapters: Vec<adapter::LoadedAdapter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<condition::Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Status {
    pub fn new(phase: phase::Phase, message: Option<String>) -> Self {
        Self {
            phase,
            message,
            ..Default::default()
        }
    }

    pub fn with_loaded_adapters(mut self, loaded_adapters: Vec<adapter::LoadedAdapter>) -> Self {
        self.loaded_adapters = loaded_adapters;
        self
    }

    /// Stamps the Ready condition and generation, carrying the transition time
    /// over from `previous` when the condition did not flip.
    pub fn observe(mut self, generation: Option<i64>, previous: Option<&Status>) -> Self {
        let previous_conditions = previous.map(|s| s.conditions.as_slice()).unwrap_or(&[]);
        self.conditions = vec![condition::Condition::ready(
            &self.phase,
            self.message.as_deref(),
            previous_conditions,
        )];
        self.observed_generation = generation;
        self
    }
}
