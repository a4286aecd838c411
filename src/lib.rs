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

use crate::config::Config;
use crate::context::Context;
use crate::probe::ProbeState;
use crate::reconcile::{error_policy, reconcile_adapter};
use crate::types::v1alpha1::lora_adapter::LoraAdapter;
use futures::StreamExt;
use kube::CustomResourceExt;
use kube::runtime::{Controller, watcher};
use kube::{Api, Client};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

shadow_rs::shadow!(build);

pub mod config;
mod context;
pub mod loader;
pub mod placement;
pub mod probe;
pub mod reconcile;
pub mod source;
pub mod types;


pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("a rustls crypto provider was already installed");
    }

    info!(
        "starting {} {} ({})",
        crate::config::MANAGER_NAME,
        build::PKG_VERSION,
        build::SHORT_COMMIT
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let probe_state = ProbeState::default();
    tokio::spawn({
        let (addr, state, shutdown) = (config.probe_addr, probe_state.clone(), shutdown.clone());
        async move {
            if let Err(e) = probe::serve(addr, state, shutdown).await {
                error!("probe server failed: {}", e);
            }
        }
    });

    let client = Client::try_default().await?;
    let adapters = match &config.watch_namespace {
        Some(ns) => Api::<LoraAdapter>::namespaced(client.clone(), ns),
        None => Api::<LoraAdapter>::all(client.clone()),
    };

    let context = Context::new(client, config, shutdown.clone())?;
    let controller = Controller::new(adapters, watcher::Config::default())
        .graceful_shutdown_on(shutdown.clone().cancelled_owned())
        .run(reconcile_adapter, error_policy, Arc::new(context));

    probe_state.set_ready();
    controller
        .for_each(|res| async move {
            match res {
                Ok((adapter, _)) => info!("reconciled successful, object {:?}", adapter.name),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;

    shutdown.cancel();
    info!("controller stopped");
    Ok(())
}

async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
    shutdown.cancel();
}

pub async fn crd(file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer: Pin<Box<dyn AsyncWrite + Send>> = if let Some(file) = file {
        Box::pin(
            tokio::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(file)
                .await?,
        )
    } else {
        Box::pin(tokio::io::stdout())
    };

    writer
        .write_all(serde_yaml_ng::to_string(&LoraAdapter::crd())?.as_bytes())
        .await?;
    writer.flush().await?;

    Ok(())
}
