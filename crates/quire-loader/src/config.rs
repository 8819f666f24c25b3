// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration

use crate::diagnostics::DiagnosticFormat;
use crate::error::{LoaderError, Result};
use crate::resolver::FilenameTranslations;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding extra include paths, colon-separated
pub const INCLUDE_PATH_ENV: &str = "QUIRE_INCLUDE_PATH";

/// Environment variable selecting the diagnostic format (`plain` or `xml`)
pub const DIAGNOSTICS_ENV: &str = "QUIRE_DIAGNOSTICS";

/// Configuration for a [`Loader`](crate::Loader).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directories searched for `<...>` imports, in order
    pub include_paths: Vec<PathBuf>,

    /// File name replacements applied to local lookups
    pub filename_translations: FilenameTranslations,

    /// How compiler diagnostics are written
    pub diagnostic_format: DiagnosticFormat,

    /// Whether compiler source maps are embedded into synthesized code
    pub source_maps: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            filename_translations: FilenameTranslations::new(),
            diagnostic_format: DiagnosticFormat::Plain,
            source_maps: true,
        }
    }
}

impl LoaderConfig {
    /// Read a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LoaderError::Config(e.to_string()))
    }

    /// Apply `QUIRE_*` environment overrides
    pub fn load_from_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(INCLUDE_PATH_ENV).ok().as_deref(),
            std::env::var(DIAGNOSTICS_ENV).ok().as_deref(),
        )
    }

    fn apply_overrides(&mut self, include_path: Option<&str>, diagnostics: Option<&str>) -> Result<()> {
        if let Some(paths) = include_path {
            // environment paths are searched before configured ones
            let mut merged: Vec<PathBuf> = paths
                .split(':')
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
                .collect();
            merged.append(&mut self.include_paths);
            self.include_paths = merged;
        }

        if let Some(format) = diagnostics {
            self.diagnostic_format = format.parse()?;
        }

        Ok(())
    }
}
