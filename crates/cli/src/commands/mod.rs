// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod check;
pub mod lifecycle;
pub mod status;

use anyhow::Result;
use pj_core::Config;
use pj_daemon::DataPaths;
use std::path::Path;

/// Load and validate the config; every command starts here.
pub(crate) fn load(config_path: &Path) -> Result<(Config, DataPaths)> {
    let config = Config::load(config_path)?;
    let paths = DataPaths::new(&config.process.data_dir);
    Ok((config, paths))
}
