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

use crate::types::v1alpha1::status::phase::Phase;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

pub const READY_CONDITION: &str = "Ready";

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum ConditionStatus {
    #[strum(to_string = "True")]
    True,

    #[strum(to_string = "False")]
    False,

    #[strum(to_string = "Unknown")]
    Unknown,
}

/// Kubernetes-style condition.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    pub reason: String,

    #[serde(default)]
    pub message: String,

    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Ready condition for `phase`. The transition time is inherited from the
    /// matching entry in `previous` when its status is unchanged.
    pub fn ready(phase: &Phase, message: Option<&str>, previous: &[Condition]) -> Self {
        let status = if *phase == Phase::Ready {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        };

        let last_transition_time = previous
            .iter()
            .find(|c| c.type_ == READY_CONDITION && c.status == status)
            .map(|c| c.last_transition_time)
            .unwrap_or_else(Utc::now);

        Self {
            type_: READY_CONDITION.to_owned(),
            status,
            reason: phase.to_string(),
            message: message.map(str::to_owned).unwrap_or_else(|| phase.to_string()),
            last_transition_time,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{Condition, ConditionStatus};
    use crate::types::v1alpha1::status::phase::Phase;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_ready_phase_sets_true() {
        let condition = Condition::ready(&Phase::Ready, None, &[]);
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason, "Ready");
        assert_eq!(condition.message, "Ready");
    }

    #[test]
    fn test_transition_time_kept_while_status_unchanged() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let previous = vec![Condition {
            type_: "Ready".to_string(),
            status: ConditionStatus::False,
            reason: "Pending".to_string(),
            message: "waiting".to_string(),
            last_transition_time: earlier,
        }];

        let still_false = Condition::ready(&Phase::Failed, Some("no pods"), &previous);
        assert_eq!(still_false.last_transition_time, earlier);
        assert_eq!(still_false.reason, "Failed");
        assert_eq!(still_false.message, "no pods");

        let flipped = Condition::ready(&Phase::Ready, None, &previous);
        assert!(flipped.last_transition_time > earlier);
    }
}
