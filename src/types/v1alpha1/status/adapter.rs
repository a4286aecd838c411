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
use crate::types::error::InvalidAssignmentStatusSnafu;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1 as corev1;
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use strum::Display;

/// Load state of one adapter artifact across the placed pods.
#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum AdapterState {
    #[strum(to_string = "Loading")]
    #[default]
    Loading,

    #[strum(to_string = "Loaded")]
    Loaded,

    #[strum(to_string = "PartiallyLoaded")]
    PartiallyLoaded,

    #[strum(to_string = "Failed")]
    Failed,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadedAdapter {
    pub name: String,

    pub path: String,

    pub status: AdapterState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub pod_assignments: Vec<PodAssignment>,
}

impl LoadedAdapter {
    pub fn new(name: &str, path: &str, load_time: DateTime<Utc>) -> Self {
        Self {
            name: name.to_owned(),
            path: path.to_owned(),
            status: AdapterState::Loading,
            load_time: Some(load_time),
            pod_assignments: Vec::new(),
        }
    }

    pub fn ready_count(&self) -> usize {
        self.pod_assignments
            .iter()
            .filter(|a| a.status == AssignmentStatus::Ready)
            .count()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodAssignment {
    pub pod: corev1::ObjectReference,

    pub status: AssignmentStatus,
}

impl PodAssignment {
    pub fn new(pod: &corev1::Pod, status: AssignmentStatus) -> Self {
        Self {
            pod: corev1::ObjectReference {
                kind: Some("Pod".to_owned()),
                name: pod.metadata.name.clone(),
                namespace: pod.metadata.namespace.clone(),
                uid: pod.metadata.uid.clone(),
                ..Default::default()
            },
            status,
        }
    }
}

/// Per-pod outcome, stored as `Pending`, `Ready` or `Failed: <reason>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssignmentStatus {
    Pending,
    Ready,
    Failed(String),
}

const FAILED_PREFIX: &str = "Failed";

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentStatus::Pending => f.write_str("Pending"),
            AssignmentStatus::Ready => f.write_str("Ready"),
            AssignmentStatus::Failed(reason) => write!(f, "{FAILED_PREFIX}: {reason}"),
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = types::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(AssignmentStatus::Pending),
            "Ready" => Ok(AssignmentStatus::Ready),
            _ => match s.strip_prefix(FAILED_PREFIX) {
                Some(rest) => Ok(AssignmentStatus::Failed(
                    rest.trim_start_matches(':').trim_start().to_owned(),
                )),
                None => InvalidAssignmentStatusSnafu { value: s }.fail(),
            },
        }
    }
}

impl Serialize for AssignmentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssignmentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for AssignmentStatus {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("AssignmentStatus")
    }
    fn schema_id() -> Cow<'static, str> {
        Cow::Borrowed(concat!(module_path!(), "::", "AssignmentStatus"))
    }
    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema! {
            {"type": "string"}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{AssignmentStatus, LoadedAdapter, PodAssignment};
    use chrono::Utc;
    use k8s_openapi::api::core::v1 as corev1;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

    #[test]
    fn test_failed_status_keeps_reason() {
        let status = AssignmentStatus::Failed("pod IP not found".to_string());
        assert_eq!(status.to_string(), "Failed: pod IP not found");

        let json = serde_json::to_value(&status).expect("status should serialize");
        assert_eq!(json, serde_json::json!("Failed: pod IP not found"));

        let parsed: AssignmentStatus = serde_json::from_value(json).expect("should parse");
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_unknown_status_string_is_rejected() {
        assert!("Loading".parse::<AssignmentStatus>().is_err());
        assert_eq!(
            "Failed".parse::<AssignmentStatus>().ok(),
            Some(AssignmentStatus::Failed(String::new()))
        );
    }

    #[test]
    fn test_pod_assignment_references_pod() {
        let pod = corev1::Pod {
            metadata: metav1::ObjectMeta {
                name: Some("vllm-0".to_string()),
                namespace: Some("default".to_string()),
                uid: Some("uid-0".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let assignment = PodAssignment::new(&pod, AssignmentStatus::Ready);
        assert_eq!(assignment.pod.kind.as_deref(), Some("Pod"));
        assert_eq!(assignment.pod.name.as_deref(), Some("vllm-0"));
        assert_eq!(assignment.pod.uid.as_deref(), Some("uid-0"));
    }

    #[test]
    fn test_ready_count_ignores_failures() {
        let pod = corev1::Pod::default();
        let mut adapter = LoadedAdapter::new("a", "/models/a", Utc::now());
        adapter.pod_assignments = vec![
            PodAssignment::new(&pod, AssignmentStatus::Ready),
            PodAssignment::new(&pod, AssignmentStatus::Failed("boom".to_string())),
            PodAssignment::new(&pod, AssignmentStatus::Pending),
        ];
        assert_eq!(adapter.ready_count(), 1);
    }
}
