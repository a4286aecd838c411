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

//! Folds per-pod outcomes into adapter states and an overall phase.
//!
//! Everything here depends only on the current pass, never on a previous status.

use crate::types::v1alpha1::status::Status;
use crate::types::v1alpha1::status::adapter::{AdapterState, LoadedAdapter};
use crate::types::v1alpha1::status::phase::Phase;

pub const PARTIALLY_READY_MESSAGE: &str = "Some adapters failed to load on all pods";
pub const NONE_LOADED_MESSAGE: &str = "Failed to load any adapters";

/// State of one artifact given how many of `pod_count` pods report it ready.
///
/// No pods means nobody can report readiness, so that is `Failed`.
pub fn adapter_state(ready: usize, pod_count: usize) -> AdapterState {
    match (ready, pod_count) {
        (_, 0) | (0, _) => AdapterState::Failed,
        (ready, total) if ready >= total => AdapterState::Loaded,
        _ => AdapterState::PartiallyLoaded,
    }
}

pub fn summarize(loaded_adapters: Vec<LoadedAdapter>) -> Status {
    let (phase, message) = if loaded_adapters.is_empty() {
        (Phase::Failed, Some(NONE_LOADED_MESSAGE.to_owned()))
    } else if loaded_adapters
        .iter()
        .all(|a| a.status == AdapterState::Loaded)
    {
        (Phase::Ready, None)
    } else {
        (Phase::PartiallyReady, Some(PARTIALLY_READY_MESSAGE.to_owned()))
    };

    Status::new(phase, message).with_loaded_adapters(loaded_adapters)
}
