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

use crate::context::Context;
use crate::loader::PodLoader;
use crate::types::v1alpha1::k8s::SourceType;
use crate::types::v1alpha1::lora_adapter::LoraAdapter;
use crate::types::v1alpha1::status::Status;
use crate::types::v1alpha1::status::adapter::{LoadedAdapter, PodAssignment};
use crate::types::v1alpha1::status::phase::Phase;
use crate::{context, placement, source, types};
use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesOrdered;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::controller::Action;
use snafu::Snafu;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub mod aggregate;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(display("failed to get adapters: {}", source))]
    Resolve { source: source::Error },

    #[snafu(display("failed to determine pod assignments: {}", source))]
    Placement { source: placement::Error },

    #[snafu(display("reconcile pass cancelled"))]
    Cancelled,
}

pub async fn reconcile_adapter(
    adapter: Arc<LoraAdapter>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let ns = adapter.namespace()?;
    let name = adapter.name();

    let Some(latest) = ctx.store.get(&ns, &name).await? else {
        debug!("lora adapter {ns}/{name} no longer exists");
        return Ok(Action::await_change());
    };

    if latest.metadata.deletion_timestamp.is_some() {
        debug!(
            "lora adapter {} is deleted, deletion_timestamp is {:?}",
            name, latest.metadata.deletion_timestamp
        );
        return Ok(Action::await_change());
    }

    info!("reconciling lora adapter {ns}/{name}");

    // 1. Resolve artifact paths, persisting a discovered path first
    let resolution = tokio::select! {
        biased;
        _ = ctx.shutdown.cancelled() => return Err(Error::Cancelled),
        resolution = ctx.resolver.resolve(&latest) => resolution,
    };
    let latest = match resolution.adapter_path {
        Some(path) => write_back_path(&ctx, latest, path).await,
        None => latest,
    };

    let artifacts = match resolution.artifacts {
        Ok(artifacts) => artifacts,
        Err(source) => {
            error!("failed to get adapters for {ns}/{name}: {source}");
            ctx.update_status(
                &latest,
                Status::new(
                    Phase::Pending,
                    Some(format!("Failed to get adapters: {source}")),
                ),
            )
            .await?;
            return Err(Error::Resolve { source });
        }
    };

    // 2. Select pods
    let pods = match ctx
        .placement
        .place_adapter(
            &latest.spec.base_model,
            &latest.spec.deployment_config.algorithm,
        )
        .await
    {
        Ok(pods) => pods,
        Err(source) => {
            error!("failed to determine pod assignments for {ns}/{name}: {source}");
            ctx.update_status(
                &latest,
                Status::new(
                    Phase::Failed,
                    Some(format!("Failed to determine pod assignments: {source}")),
                ),
            )
            .await?;
            return Err(Error::Placement { source });
        }
    };

    // 3. Push every artifact to every pod
    let loaded = tokio::select! {
        biased;
        _ = ctx.shutdown.cancelled() => return Err(Error::Cancelled),
        loaded = load_artifacts(&ctx, latest.adapter_name(), &artifacts, &pods) => loaded,
    };

    // 4. Persist the aggregated result
    let status = aggregate::summarize(loaded);
    info!(
        "lora adapter {ns}/{name} is {} on {} pods",
        status.phase,
        pods.len()
    );
    ctx.update_status(&latest, status).await?;

    // 5. Sources that can grow new artifacts are re-checked on a timer
    let rediscover = SourceType::from_str(&latest.spec.adapter_source.type_)
        .is_ok_and(|t| t.supports_rediscovery());
    if rediscover {
        Ok(Action::requeue(ctx.config.rediscovery_interval()))
    } else {
        Ok(Action::await_change())
    }
}

/// Stores a resolved path in the spec. Failing to do so does not fail the pass.
async fn write_back_path(ctx: &Context, adapter: LoraAdapter, path: String) -> LoraAdapter {
    if adapter.spec.adapter_source.adapter_path.as_deref() == Some(path.as_str()) {
        return adapter;
    }

    let mut updated = adapter.clone();
    updated.spec.adapter_source.adapter_path = Some(path);

    match ctx.store.replace(&updated).await {
        Ok(stored) => {
            debug!(
                "stored adapter path {:?} for {}",
                stored.spec.adapter_source.adapter_path,
                stored.name()
            );
            stored
        }
        Err(e) => {
            warn!("failed to update adapter path for {}: {}", adapter.name(), e);
            adapter
        }
    }
}

async fn load_artifacts(
    ctx: &Context,
    adapter_name: &str,
    artifacts: &[String],
    pods: &[Pod],
) -> Vec<LoadedAdapter> {
    let permits = Semaphore::new(ctx.config.max_concurrent_loads.max(1));
    let mut loaded = Vec::with_capacity(artifacts.len());

    for path in artifacts {
        let mut entry = LoadedAdapter::new(adapter_name, path, Utc::now());

        // FuturesOrdered yields in placement order
        entry.pod_assignments = pods
            .iter()
            .map(|pod| load_on_pod(&ctx.loader, &permits, pod, adapter_name, path))
            .collect::<FuturesOrdered<_>>()
            .collect()
            .await;

        entry.status = aggregate::adapter_state(entry.ready_count(), pods.len());
        loaded.push(entry);
    }

    loaded
}

async fn load_on_pod(
    loader: &PodLoader,
    permits: &Semaphore,
    pod: &Pod,
    adapter_name: &str,
    path: &str,
) -> PodAssignment {
    // the semaphore is never closed
    let _permit = permits.acquire().await.ok();

    let (assignment, err) = loader.ensure_loaded(pod, adapter_name, path).await;
    if let Some(e) = err {
        warn!(
            "failed to load adapter {} on pod {}: {}",
            adapter_name,
            pod.metadata.name.as_deref().unwrap_or_default(),
            e
        );
    }
    assignment
}

pub fn error_policy(_object: Arc<LoraAdapter>, error: &Error, ctx: Arc<Context>) -> Action {
    error!("error_policy: {}", error);

    match error {
        Error::Resolve { .. } => Action::requeue(ctx.config.retry_interval()),
        Error::Placement { .. } | Error::Cancelled => Action::await_change(),
        Error::Context { source } if source.is_not_found() => Action::await_change(),
        Error::Context { source } if source.is_conflict() => {
            debug!("status write conflicted, retrying with a fresh copy");
            Action::requeue(ctx.config.error_requeue())
        }
        _ => Action::requeue(ctx.config.error_requeue()),
    }
}
