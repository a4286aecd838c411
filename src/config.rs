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

use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const MANAGER_NAME: &str = "lora-operator";

pub const DEFAULT_POD_NAMESPACE: &str = "default";
pub const DEFAULT_DOWNLOAD_PATH: &str = "/models";
pub const DEFAULT_SERVICE_PORT: u16 = 8000;
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REDISCOVERY_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT_LOADS: usize = 8;
pub const DEFAULT_HF_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_HF_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:8081";

/// Controller settings. Every flag can also be given through its environment variable.
#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Namespace searched for serving pods
    #[arg(long, env = "LORA_POD_NAMESPACE", default_value = DEFAULT_POD_NAMESPACE)]
    pub pod_namespace: String,

    /// Only watch LoraAdapters in this namespace (all namespaces when unset)
    #[arg(long, env = "LORA_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Root directory that remote adapters are downloaded into
    #[arg(long, env = "ADAPTER_DOWNLOAD_PATH", default_value = DEFAULT_DOWNLOAD_PATH)]
    pub download_path: PathBuf,

    /// Port of the serving API on every pod
    #[arg(long, env = "LORA_SERVICE_PORT", default_value_t = DEFAULT_SERVICE_PORT)]
    pub service_port: u16,

    /// Delay before retrying a pass whose adapter discovery failed
    #[arg(long, env = "LORA_RETRY_INTERVAL_SECS", default_value_t = DEFAULT_RETRY_INTERVAL_SECS)]
    pub retry_interval_secs: u64,

    /// Interval at which object store sources are re-checked for new adapters
    #[arg(
        long,
        env = "LORA_REDISCOVERY_INTERVAL_SECS",
        default_value_t = DEFAULT_REDISCOVERY_INTERVAL_SECS
    )]
    pub rediscovery_interval_secs: u64,

    /// Delay before retrying a pass that failed on the Kubernetes API
    #[arg(long, env = "LORA_ERROR_REQUEUE_SECS", default_value_t = DEFAULT_ERROR_REQUEUE_SECS)]
    pub error_requeue_secs: u64,

    /// Timeout of every HTTP call made to a pod
    #[arg(
        long,
        env = "LORA_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    pub request_timeout_secs: u64,

    /// Maximum number of pods loaded concurrently for one artifact
    #[arg(
        long,
        env = "LORA_MAX_CONCURRENT_LOADS",
        default_value_t = DEFAULT_MAX_CONCURRENT_LOADS
    )]
    pub max_concurrent_loads: usize,

    /// Hugging Face hub endpoint
    #[arg(long, env = "HF_ENDPOINT", default_value = DEFAULT_HF_ENDPOINT)]
    pub hf_endpoint: String,

    /// Connect and read timeout of Hugging Face hub requests
    #[arg(long, env = "LORA_HF_TIMEOUT_SECS", default_value_t = DEFAULT_HF_TIMEOUT_SECS)]
    pub hf_timeout_secs: u64,

    /// Address of the health and readiness probe server
    #[arg(long, env = "LORA_PROBE_ADDR", default_value = DEFAULT_PROBE_ADDR)]
    pub probe_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pod_namespace: DEFAULT_POD_NAMESPACE.to_owned(),
            watch_namespace: None,
            download_path: PathBuf::from(DEFAULT_DOWNLOAD_PATH),
            service_port: DEFAULT_SERVICE_PORT,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            rediscovery_interval_secs: DEFAULT_REDISCOVERY_INTERVAL_SECS,
            error_requeue_secs: DEFAULT_ERROR_REQUEUE_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
            hf_endpoint: DEFAULT_HF_ENDPOINT.to_owned(),
            hf_timeout_secs: DEFAULT_HF_TIMEOUT_SECS,
            probe_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
        }
    }
}

impl Config {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn rediscovery_interval(&self) -> Duration {
        Duration::from_secs(self.rediscovery_interval_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn hf_timeout(&self) -> Duration {
        Duration::from_secs(self.hf_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use clap::Parser;
    use std::time::Duration;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_parsed_defaults_match_default_impl() {
        let parsed = TestCli::parse_from(["lora-operator"]).config;
        let default = Config::default();

        assert_eq!(parsed.pod_namespace, default.pod_namespace);
        assert_eq!(parsed.download_path, default.download_path);
        assert_eq!(parsed.service_port, default.service_port);
        assert_eq!(parsed.probe_addr, default.probe_addr);
        assert_eq!(parsed.hf_endpoint, default.hf_endpoint);
        assert_eq!(parsed.hf_timeout(), Duration::from_secs(60));
        assert_eq!(parsed.retry_interval(), Duration::from_secs(60));
        assert_eq!(parsed.rediscovery_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_flags_override_defaults() {
        let parsed = TestCli::parse_from([
            "lora-operator",
            "--pod-namespace",
            "serving",
            "--service-port",
            "9000",
            "--retry-interval-secs",
            "1",
            "--hf-timeout-secs",
            "5",
        ])
        .config;

        assert_eq!(parsed.pod_namespace, "serving");
        assert_eq!(parsed.service_port, 9000);
        assert_eq!(parsed.retry_interval(), Duration::from_secs(1));
        assert_eq!(parsed.hf_timeout(), Duration::from_secs(5));
    }
}
