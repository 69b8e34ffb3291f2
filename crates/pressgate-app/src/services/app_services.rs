// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: loads configuration and builds the print engine
// shared by the HTTP gateway and the CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pressgate_core::EngineConfig;
use pressgate_core::error::Result;
use pressgate_print::{CupsSpooler, PrintEngine, PrintSpooler};
use tracing::info;

/// Shared services. Cheap to clone.
#[derive(Clone)]
pub struct AppServices {
    engine: Arc<PrintEngine>,
    config: Arc<EngineConfig>,
    data_dir: PathBuf,
}

impl AppServices {
    /// Load `config.json` and environment overrides from `data_dir` and
    /// build an engine bound to the host's CUPS spooler.
    pub fn init(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        info!(path = %data_dir.display(), "initialising app services");
        let config = EngineConfig::load(data_dir)?;
        Self::with_spooler(config, data_dir, Arc::new(CupsSpooler::new()))
    }

    /// Build services around an explicit spooler.
    pub fn with_spooler(
        config: EngineConfig,
        data_dir: &Path,
        spooler: Arc<dyn PrintSpooler>,
    ) -> Result<Self> {
        let engine = PrintEngine::from_config(&config, spooler)?;
        Ok(Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn engine(&self) -> &Arc<PrintEngine> {
        &self.engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
