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

use async_trait::async_trait;
use snafu::Snafu;
use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("request to {} failed: {}", url, source))]
    Request { url: String, source: reqwest::Error },

    #[snafu(display("request to {} returned status {}", url, status))]
    Rejected { url: String, status: u16 },

    #[snafu(display("I/O error on {}: {}", path.display(), source))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("refusing to download file with unsafe name '{}'", name))]
    InvalidFileName { name: String },

    #[snafu(display(
        "checksum mismatch for '{}': expected {}, got {}",
        file,
        expected,
        actual
    ))]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

/// Transfers a repository revision to local disk.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Downloads `repository` at `revision` under `dest` and returns the
    /// directory the files were placed in, which may nest them further.
    async fn fetch(
        &self,
        repository: &str,
        revision: &str,
        dest: &Path,
        token: Option<&str>,
    ) -> Result<PathBuf, Error>;
}
