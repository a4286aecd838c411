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

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Overall phase of a LoraAdapter.
/// - Pending: adapter discovery has not succeeded yet, a retry is scheduled
/// - Ready: every artifact is loaded on every placed pod
/// - PartiallyReady: at least one artifact is missing from at least one pod
/// - Failed: placement failed or nothing could be loaded
#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum Phase {
    #[strum(to_string = "Pending")]
    #[default]
    Pending,

    #[strum(to_string = "Ready")]
    Ready,

    #[strum(to_string = "PartiallyReady")]
    PartiallyReady,

    #[strum(to_string = "Failed")]
    Failed,
}
