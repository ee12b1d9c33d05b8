// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Writes the node manifest under its sibling `.lock` file so that concurrent
//! `config generate` runs and running daemons never see a torn file.

use anyhow::Context;
use std::path::{Path, PathBuf};

use crate::domain::node_config::NodeConfigManifest;
use crate::infrastructure::file_lock::FileLock;

pub fn write_manifest(manifest: &NodeConfigManifest, path: &Path) -> anyhow::Result<()> {
    let yaml = manifest.to_yaml_string()?;
    let _lock = FileLock::acquire(&lock_path_for(path))
        .with_context(|| format!("Failed to lock {:?}", path))?;
    std::fs::write(path, yaml)?;
    Ok(())
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
