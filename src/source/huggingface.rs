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

//! Hugging Face hub downloads.
//!
//! Files land in `<dest>/snapshots/<commit>/<file>`, the same shape the hub's
//! own cache uses, so the layout walk finds them after the transfer.

use crate::config::MANAGER_NAME;
use crate::source::fetch::{
    ArtifactFetcher, ChecksumMismatchSnafu, Error, InvalidFileNameSnafu, IoSnafu, RejectedSnafu,
    RequestSnafu,
};
use crate::source::layout::SNAPSHOTS_DIR;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use snafu::ResultExt;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const USER_AGENT: &str = const_str::concat!(MANAGER_NAME, "/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct RepoInfo {
    sha: String,
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Deserialize)]
struct Sibling {
    rfilename: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    lfs: Option<LfsInfo>,
}

#[derive(Deserialize)]
struct LfsInfo {
    sha256: String,
    size: u64,
}

impl Sibling {
    fn expected_size(&self) -> Option<u64> {
        self.lfs.as_ref().map(|l| l.size).or(self.size)
    }
}

pub struct HuggingFaceFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HuggingFaceFetcher {
    /// `timeout` bounds connecting and every read, so a stalled transfer fails
    /// instead of hanging while large files still stream.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
        })
    }

    fn get(&self, url: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn repo_info(
        &self,
        repository: &str,
        revision: &str,
        token: Option<&str>,
    ) -> Result<RepoInfo, Error> {
        let url = format!(
            "{}/api/models/{}/revision/{}?blobs=true",
            self.endpoint, repository, revision
        );
        let response = self
            .get(&url, token)
            .send()
            .await
            .context(RequestSnafu { url: url.clone() })?;

        if !response.status().is_success() {
            return RejectedSnafu {
                url,
                status: response.status().as_u16(),
            }
            .fail();
        }

        response.json().await.context(RequestSnafu { url })
    }

    async fn download_file(
        &self,
        repository: &str,
        commit: &str,
        sibling: &Sibling,
        target: &Path,
        token: Option<&str>,
    ) -> Result<(), Error> {
        let url = format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint, repository, commit, sibling.rfilename
        );
        let response = self
            .get(&url, token)
            .send()
            .await
            .context(RequestSnafu { url: url.clone() })?;

        if !response.status().is_success() {
            return RejectedSnafu {
                url,
                status: response.status().as_u16(),
            }
            .fail();
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.context(IoSnafu { path: parent })?;
        }

        let partial = target.with_file_name(format!(
            "{}.part",
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        let mut file = fs::File::create(&partial)
            .await
            .context(IoSnafu { path: &partial })?;

        let mut hasher = Sha256::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context(RequestSnafu { url: url.clone() })?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .context(IoSnafu { path: &partial })?;
        }
        file.flush().await.context(IoSnafu { path: &partial })?;
        drop(file);

        if let Some(lfs) = &sibling.lfs {
            let actual = hex(&hasher.finalize());
            if !actual.eq_ignore_ascii_case(&lfs.sha256) {
                if let Err(e) = fs::remove_file(&partial).await {
                    warn!("failed to remove {}: {}", partial.display(), e);
                }
                return ChecksumMismatchSnafu {
                    file: sibling.rfilename.clone(),
                    expected: lfs.sha256.clone(),
                    actual,
                }
                .fail();
            }
        }

        fs::rename(&partial, target)
            .await
            .context(IoSnafu { path: target })
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Repository file names are relative paths; anything that could escape the
/// snapshot directory is refused.
fn safe_relative_path(name: &str) -> Result<PathBuf, Error> {
    let path = Path::new(name);
    let safe = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(path.to_path_buf())
    } else {
        InvalidFileNameSnafu { name }.fail()
    }
}

async fn already_present(target: &Path, expected_size: Option<u64>) -> bool {
    match (fs::metadata(target).await, expected_size) {
        (Ok(meta), Some(size)) => meta.is_file() && meta.len() == size,
        _ => false,
    }
}

#[async_trait]
impl ArtifactFetcher for HuggingFaceFetcher {
    async fn fetch(
        &self,
        repository: &str,
        revision: &str,
        dest: &Path,
        token: Option<&str>,
    ) -> Result<PathBuf, Error> {
        let info = self.repo_info(repository, revision, token).await?;
        let snapshot = dest.join(SNAPSHOTS_DIR).join(&info.sha);

        for sibling in &info.siblings {
            let target = snapshot.join(safe_relative_path(&sibling.rfilename)?);
            if already_present(&target, sibling.expected_size()).await {
                debug!("{} already downloaded, skipping", target.display());
                continue;
            }
            self.download_file(repository, &info.sha, sibling, &target, token)
                .await?;
        }

        info!(
            "downloaded {} files of {}@{} ({}) into {}",
            info.siblings.len(),
            repository,
            revision,
            info.sha,
            dest.display()
        );
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{HuggingFaceFetcher, hex, safe_relative_path};
    use crate::source::fetch::{ArtifactFetcher, Error};
    use crate::tests::FakeHub;
    use sha2::{Digest, Sha256};
    use std::time::Duration;

    fn fetcher(endpoint: &str) -> HuggingFaceFetcher {
        HuggingFaceFetcher::new(endpoint, Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn test_unsafe_file_names_are_refused() {
        assert!(safe_relative_path("adapter_model.safetensors").is_ok());
        assert!(safe_relative_path("nested/adapter_config.json").is_ok());
        assert!(safe_relative_path("../escape.bin").is_err());
        assert!(safe_relative_path("/etc/passwd").is_err());
        assert!(safe_relative_path("").is_err());
    }

    #[test]
    fn test_hex_is_lowercase() {
        assert_eq!(hex(&[0x00, 0xab, 0x10]), "00ab10");
    }

    #[tokio::test]
    async fn test_fetch_places_files_under_snapshot() {
        let weights = b"weights".to_vec();
        let digest = hex(&Sha256::digest(&weights));
        let hub = FakeHub::start("abc123")
            .await
            .with_file("adapter_config.json", b"{}".to_vec(), None)
            .with_file("adapter_model.safetensors", weights, Some(digest));

        let dest = tempfile::tempdir().expect("tempdir");
        let fetcher = fetcher(&hub.endpoint());
        let path = fetcher
            .fetch("org/sql-lora", "main", dest.path(), Some("hf_secret"))
            .await
            .expect("fetch should succeed");

        assert_eq!(path, dest.path());
        let snapshot = dest.path().join("snapshots").join("abc123");
        assert_eq!(
            std::fs::read(snapshot.join("adapter_model.safetensors")).expect("read"),
            b"weights"
        );
        assert!(snapshot.join("adapter_config.json").exists());
        assert_eq!(hub.last_authorization().as_deref(), Some("Bearer hf_secret"));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_is_rejected() {
        let hub = FakeHub::start("abc123").await.with_file(
            "adapter_model.safetensors",
            b"tampered".to_vec(),
            Some("0".repeat(64)),
        );

        let dest = tempfile::tempdir().expect("tempdir");
        let fetcher = fetcher(&hub.endpoint());
        let err = fetcher
            .fetch("org/sql-lora", "main", dest.path(), None)
            .await
            .expect_err("mismatch must fail");

        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert!(
            !dest
                .path()
                .join("snapshots/abc123/adapter_model.safetensors")
                .exists()
        );
        // the partial download is cleaned up
        assert!(
            !dest
                .path()
                .join("snapshots/abc123/adapter_model.safetensors.part")
                .exists()
        );
    }

    #[tokio::test]
    async fn test_missing_repository_is_rejected() {
        let hub = FakeHub::start("abc123").await;
        let dest = tempfile::tempdir().expect("tempdir");
        let fetcher = fetcher(&hub.endpoint());

        let err = fetcher
            .fetch("org/unknown", "main", dest.path(), None)
            .await
            .expect_err("unknown repo must fail");
        assert!(matches!(err, Error::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_silent_hub_times_out() {
        // accepts connections but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let endpoint = format!("http://{}", listener.local_addr().expect("addr"));
        let dest = tempfile::tempdir().expect("tempdir");
        let fetcher = HuggingFaceFetcher::new(&endpoint, Duration::from_millis(300)).expect("client");

        let err = tokio::time::timeout(
            Duration::from_secs(10),
            fetcher.fetch("org/sql-lora", "main", dest.path(), None),
        )
        .await
        .expect("fetch must give up on its own")
        .expect_err("silent hub must fail");

        assert!(matches!(err, Error::Request { .. }));
        drop(listener);
    }
}
