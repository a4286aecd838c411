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

//! Named values accepted by string fields of the LoraAdapter spec.
//!
//! These fields stay plain strings so that an unrecognised value
//! reaches the controller and is reported on the status, instead of being
//! dropped by the watcher during deserialization.

use strum::{Display, EnumString};

/// Where adapter weights come from.
/// - local: `adapterPath` already points at weights mounted into the pods
/// - huggingface: weights are downloaded from a Hugging Face repository
/// - s3 / cos: weights are listed from an object store bucket (not available yet)
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum SourceType {
    Local,
    Huggingface,
    S3,
    Cos,
}

impl SourceType {
    /// Object store sources can gain new adapters without a spec change,
    /// so they are re-checked on a timer.
    pub fn supports_rediscovery(&self) -> bool {
        matches!(self, SourceType::S3 | SourceType::Cos)
    }
}

/// Placement algorithm used to pick the pods that load an adapter.
/// - default: every serving pod of the base model
/// - ordered / equalized: reserved for load-aware placement
#[derive(Clone, Copy, Debug, Default, Display, EnumString, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Default,
    Ordered,
    Equalized,
}
