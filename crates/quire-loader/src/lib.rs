// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # quire-loader
//!
//! Dependency resolution and execution for script units.
//!
//! A [`Unit`] is one source file with an ordered list of
//! [`DependencyReference`]s. The [`Loader`] resolves a unit's transitive
//! dependencies in a single *wave*: every reference is searched once, and no
//! unit in the wave is marked loaded until the whole closure is. After that,
//! units execute through a [`ScriptEngine`], optionally after a second
//! [`Compiler`] pass.
//!
//! - Resolution results, dedup markers and the per-directory search, import
//!   and execute operations are memoized in a [`ResolutionCache`]
//! - Resources come from a [`ResourceResolver`], such as [`FileResolver`]
//! - Units can be serialized to and read from marked-string bundles
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quire_loader::{DirectiveCompiler, FileResolver, Loader};
//! use std::rc::Rc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = Rc::new(FileResolver::new(["Frameworks"])?);
//!     let loader = Loader::builder(resolver, Rc::new(MyEngine))
//!         .compiler(Rc::new(DirectiveCompiler::new()))
//!         .build()?;
//!
//!     let main = loader.open_path("main.j".as_ref()).await?;
//!     loader.run(&main).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod compiler;
pub mod config;
pub mod dependency;
pub mod diagnostics;
pub mod directive;
pub mod engine;
pub mod error;
pub mod loader;
pub mod marked;
pub mod operations;
pub mod pipeline;
pub mod resolver;
pub mod transcode;
pub mod unit;
pub mod value;
mod wave;

// Re-exports
pub use cache::ResolutionCache;
pub use compiler::{CompiledOutput, Compiler, CompilerFactory, Diagnostic, FirstPass, Severity, SourceMapText};
pub use config::LoaderConfig;
pub use dependency::DependencyReference;
pub use diagnostics::{DiagnosticFormat, report_diagnostics};
pub use directive::DirectiveCompiler;
pub use engine::{Arguments, Callable, FunctionSource, HostBindings, ScriptEngine};
pub use error::{LoaderError, Result};
pub use loader::{Loader, LoaderBuilder, WeakLoader};
pub use marked::MarkedString;
pub use operations::{Executer, ImportCallback, Importer, Searcher, UrlCachingGuard};
pub use resolver::{FileResolver, FilenameTranslations, Resource, ResourceResolver};
pub use transcode::{encode_source_map, utf16_to_utf8};
pub use unit::{LoadCallback, LoadStatus, Unit};
pub use value::{Environment, Value};

/// Version of the quire loader
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
