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

//! On-disk layout of adapter weights.
//!
//! An adapter directory holds at least one `*.safetensors` or `*.bin` file,
//! either directly or under `snapshots/<revision>/` as hub downloads do.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const SNAPSHOTS_DIR: &str = "snapshots";

const WEIGHT_SUFFIXES: [&str; 2] = [".safetensors", ".bin"];

fn is_weight_file(name: &str) -> bool {
    WEIGHT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

async fn sorted_entries(dir: &Path) -> io::Result<Vec<(String, bool)>> {
    let mut read_dir = fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let is_dir = entry.file_type().await?.is_dir();
        if let Some(name) = entry.file_name().to_str() {
            entries.push((name.to_owned(), is_dir));
        }
    }
    entries.sort();
    Ok(entries)
}

async fn contains_weights(dir: &Path) -> io::Result<bool> {
    Ok(sorted_entries(dir)
        .await?
        .iter()
        .any(|(name, is_dir)| !is_dir && is_weight_file(name)))
}

/// Finds the directory holding adapter weights under `base`.
///
/// `base` itself wins over snapshot directories, and snapshots are visited in
/// name order. Returns `Ok(None)` when no weights exist, and an error only when
/// `base` cannot be read. Unreadable snapshot directories are skipped.
pub async fn find_adapter_dir(base: &Path) -> io::Result<Option<PathBuf>> {
    let entries = sorted_entries(base).await?;

    if entries
        .iter()
        .any(|(name, is_dir)| !is_dir && is_weight_file(name))
    {
        return Ok(Some(base.to_path_buf()));
    }

    if !entries
        .iter()
        .any(|(name, is_dir)| *is_dir && name == SNAPSHOTS_DIR)
    {
        return Ok(None);
    }

    let snapshots = base.join(SNAPSHOTS_DIR);
    let Ok(revisions) = sorted_entries(&snapshots).await else {
        return Ok(None);
    };

    for (revision, is_dir) in revisions {
        if !is_dir {
            continue;
        }
        let candidate = snapshots.join(revision);
        if contains_weights(&candidate).await.unwrap_or(false) {
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}
