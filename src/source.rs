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

//! Turns an adapter source into local artifact paths.

pub mod fetch;
pub mod huggingface;
pub mod layout;

pub use fetch::ArtifactFetcher;

use crate::context::{self, SecretStore};
use crate::types;
use crate::types::v1alpha1::k8s::SourceType;
use crate::types::v1alpha1::lora_adapter::LoraAdapter;
use crate::types::v1alpha1::source::AdapterSource;
use regex::Regex;
use snafu::{OptionExt, ResultExt, Snafu};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Secret key holding the Hugging Face access token.
pub const HF_TOKEN_KEY: &str = "HUGGING_FACE_HUB_TOKEN";

/// Revision fetched from remote repositories.
pub const DEFAULT_REVISION: &str = "main";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{}", message))]
    MissingConfiguration { message: String },

    #[snafu(display("secret '{}' does not contain {}", secret, key))]
    MissingCredential { secret: String, key: String },

    #[snafu(display("secret '{}' has invalid data encoding for key '{}'", secret, key))]
    InvalidCredentialEncoding { secret: String, key: String },

    #[snafu(display("failed to get credentials: {}", source))]
    Credentials { source: context::Error },

    #[snafu(display("unsupported adapter source type: {}", type_))]
    UnsupportedSourceType { type_: String },

    #[snafu(display("failed to download adapter from {}: {}", repository, source))]
    Fetch {
        repository: String,
        source: fetch::Error,
    },

    #[snafu(display("failed to read directory {}: {}", path.display(), source))]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "no directory containing safetensors or bin files found in {}",
        path.display()
    ))]
    ArtifactNotFound { path: PathBuf },

    #[snafu(display("{} adapter download not implemented yet", source_type))]
    NotImplemented { source_type: SourceType },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

/// Outcome of resolving a source.
///
/// `adapter_path` is a path to persist back into the spec. It is reported even
/// when resolution fails, and persisting it must not affect `artifacts`.
#[derive(Debug)]
pub struct Resolution {
    pub artifacts: Result<Vec<String>, Error>,
    pub adapter_path: Option<String>,
}

impl Resolution {
    fn new(artifacts: Result<Vec<String>, Error>) -> Self {
        Self {
            artifacts,
            adapter_path: None,
        }
    }

    fn writing_back(mut self, current: Option<&str>, resolved: &str) -> Self {
        if current != Some(resolved) {
            self.adapter_path = Some(resolved.to_owned());
        }
        self
    }
}

pub struct AdapterResolver {
    secrets: Arc<dyn SecretStore>,
    fetcher: Arc<dyn ArtifactFetcher>,
    download_root: PathBuf,
}

impl AdapterResolver {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        fetcher: Arc<dyn ArtifactFetcher>,
        download_root: PathBuf,
    ) -> Self {
        Self {
            secrets,
            fetcher,
            download_root,
        }
    }

    pub async fn resolve(&self, adapter: &LoraAdapter) -> Resolution {
        let source = &adapter.spec.adapter_source;
        // an empty name would match every model a pod lists
        if source.adapter_name.is_empty() {
            return Resolution::new(
                MissingConfigurationSnafu {
                    message: "adapterName must not be empty",
                }
                .fail(),
            );
        }

        let Ok(source_type) = SourceType::from_str(&source.type_) else {
            return Resolution::new(
                UnsupportedSourceTypeSnafu {
                    type_: source.type_.clone(),
                }
                .fail(),
            );
        };

        match source_type {
            SourceType::Local => Resolution::new(resolve_local(source)),
            SourceType::Huggingface => self.resolve_huggingface(adapter).await,
            SourceType::S3 | SourceType::Cos => self.resolve_object_store(adapter, source_type),
        }
    }

    async fn resolve_huggingface(&self, adapter: &LoraAdapter) -> Resolution {
        let source = &adapter.spec.adapter_source;

        if let Some(existing) = source.adapter_path()
            && let Ok(Some(_)) = layout::find_adapter_dir(Path::new(existing)).await
        {
            info!("adapter files already exist at {existing}, skipping download");
            return Resolution::new(Ok(source.cap(vec![existing.to_owned()])));
        }

        match self.download_huggingface(adapter).await {
            Ok(dir) => Resolution::new(Ok(source.cap(vec![dir.clone()])))
                .writing_back(source.adapter_path(), &dir),
            Err(e) => Resolution::new(Err(e)),
        }
    }

    async fn download_huggingface(&self, adapter: &LoraAdapter) -> Result<String, Error> {
        let source = &adapter.spec.adapter_source;
        let token = self.huggingface_token(adapter).await?;
        let local_path = adapter.download_dir(&self.download_root);

        info!(
            "downloading adapter {} from Hugging Face repository {} into {}",
            source.adapter_name,
            source.repository,
            local_path.display()
        );

        let downloaded = self
            .fetcher
            .fetch(
                &source.repository,
                DEFAULT_REVISION,
                &local_path,
                token.as_deref(),
            )
            .await
            .context(FetchSnafu {
                repository: source.repository.clone(),
            })?;

        let dir = layout::find_adapter_dir(&downloaded)
            .await
            .context(ReadDirSnafu { path: &downloaded })?
            .context(ArtifactNotFoundSnafu { path: &downloaded })?;

        Ok(dir.to_string_lossy().into_owned())
    }

    async fn huggingface_token(&self, adapter: &LoraAdapter) -> Result<Option<String>, Error> {
        let Some(reference) = adapter
            .spec
            .adapter_source
            .credentials_ref
            .as_ref()
            .filter(|r| !r.name.is_empty())
        else {
            return Ok(None);
        };

        let data = self
            .secrets
            .secret_data(&adapter.namespace()?, &reference.name)
            .await
            .context(CredentialsSnafu)?;

        let bytes = data.get(HF_TOKEN_KEY).context(MissingCredentialSnafu {
            secret: reference.name.clone(),
            key: HF_TOKEN_KEY,
        })?;

        String::from_utf8(bytes.clone())
            .ok()
            .context(InvalidCredentialEncodingSnafu {
                secret: reference.name.clone(),
                key: HF_TOKEN_KEY,
            })
            .map(Some)
    }

    /// Object store listing is not available yet. The expected download path is
    /// still reported for write-back and the pattern is validated, then the
    /// pass is failed so it is retried.
    fn resolve_object_store(&self, adapter: &LoraAdapter, source_type: SourceType) -> Resolution {
        let source = &adapter.spec.adapter_source;
        let local_path = adapter
            .download_dir(&self.download_root)
            .to_string_lossy()
            .into_owned();

        info!(
            "{source_type} adapter download not implemented yet, repository {}, adapter {}",
            source.repository, source.adapter_name
        );

        let artifacts = filter_candidates(source, vec![local_path.clone()]).and_then(|found| {
            debug!("{} {source_type} candidates after filtering", found.len());
            NotImplementedSnafu { source_type }.fail()
        });

        Resolution::new(artifacts).writing_back(source.adapter_path(), &local_path)
    }
}

fn resolve_local(source: &AdapterSource) -> Result<Vec<String>, Error> {
    let path = source
        .adapter_path()
        .context(MissingConfigurationSnafu {
            message: "adapterPath is required for local adapter source",
        })?;
    Ok(source.cap(vec![path.to_owned()]))
}

/// Applies `pattern` then `maxAdapters` to listed candidates.
fn filter_candidates(
    source: &AdapterSource,
    candidates: Vec<String>,
) -> Result<Vec<String>, Error> {
    let candidates = match source.pattern.as_deref().filter(|p| !p.is_empty()) {
        Some(pattern) => {
            let re = Regex::new(pattern).map_err(|e| Error::MissingConfiguration {
                message: format!("invalid pattern {pattern:?}: {e}"),
            })?;
            candidates.into_iter().filter(|c| re.is_match(c)).collect()
        }
        None => candidates,
    };
    Ok(source.cap(candidates))
}
