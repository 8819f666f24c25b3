// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the loader

use std::path::PathBuf;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving, compiling or executing units
#[derive(Debug, Error)]
pub enum LoaderError {
    /// A referenced dependency could not be located
    #[error(
        "Could not load file at {locator}{}\nwith includeURLs: {}",
        .compiling.as_ref().map(|file| format!(" when compiling {file}")).unwrap_or_default(),
        .include_paths.join(", ")
    )]
    ResolutionFailure {
        /// The locator that failed to resolve
        locator: String,
        /// The file whose dependency list contained the locator, if known
        compiling: Option<String>,
        /// Include paths that were searched
        include_paths: Vec<String>,
    },

    /// A new wave was requested while another one is still active
    #[error("Can't load: {0}: a dependency wave is already active")]
    ReentrancyViolation(String),

    /// A unit was executed before its dependencies were loaded
    #[error("No executable loaded for file at URL {0}")]
    PrematureExecution(String),

    /// A load finished without the unit's dependency closure being loaded,
    /// e.g. after an earlier wave containing it was aborted
    #[error("Dependencies of {0} never finished loading")]
    IncompleteLoad(String),

    /// The compiler reported at least one error-severity diagnostic
    #[error("Compilation error in {0}")]
    Compilation(String),

    /// Source map text was not valid UTF-16
    #[error("Cannot embed source map: malformed UTF-16 input")]
    Transcoding,

    /// A marked-string bundle could not be parsed
    #[error("Malformed bundle: {0}")]
    MalformedBundle(String),

    /// A unit has no compiled source to serialize
    #[error("Unit has not been compiled yet: {0}")]
    NotCompiled(String),

    /// The resolver cannot fetch this kind of URL
    #[error("Unsupported URL scheme for {0}")]
    UnsupportedScheme(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Path that cannot be expressed as a URL
    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Diagnostics could not be written
    #[error("Diagnostics error: {0}")]
    Diagnostics(String),

    /// The script engine rejected a function or failed while running it
    #[error("Engine error: {0}")]
    Engine(String),

    /// A bound operation outlived the loader that created it
    #[error("Loader has been dropped")]
    Detached,
}

impl LoaderError {
    /// Create a new engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a new malformed bundle error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedBundle(msg.into())
    }

    /// Whether this error aborts the enclosing wave
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transcoding)
    }
}
