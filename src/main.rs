// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! quire - load, inspect and bundle script-module projects
//!
//! ## Commands
//!
//! - `run` loads a file with its dependencies and executes it
//! - `deps` prints the dependency closure of a file
//! - `bundle` compiles a file and its dependencies into marked-string bundles

mod bundle;
mod engine;

use anyhow::Context;
use clap::{Parser, Subcommand};
use engine::TraceEngine;
use owo_colors::OwoColorize;
use quire_loader::pipeline::source_path;
use quire_loader::{DiagnosticFormat, DirectiveCompiler, FileResolver, Loader, LoaderConfig, Unit, VERSION};
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser)]
#[command(
    name = "quire",
    about = "Dependency-ordered loader for script-module projects",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory searched for <...> imports (repeatable, searched first)
    #[arg(short = 'I', long = "include", global = true, value_hint = clap::ValueHint::DirPath)]
    include: Vec<PathBuf>,

    /// Configuration file
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Write compiler diagnostics as an XML property list
    #[arg(long, global = true)]
    xml: bool,

    /// Do not embed source maps
    #[arg(long, global = true)]
    no_source_maps: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load a file and its dependencies, then execute it
    Run {
        /// Entry file
        file: PathBuf,
    },
    /// Print the dependency closure of a file, dependencies first
    Deps {
        /// Entry file
        file: PathBuf,
    },
    /// Compile a file and its dependencies into bundles
    Bundle {
        /// Entry file
        file: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "dist", value_hint = clap::ValueHint::DirPath)]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("quire=debug,quire_loader=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("quire=warn,quire_loader=warn")
            .init();
    }

    if let Err(e) = run(&cli).await {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;

    match &cli.command {
        Command::Run { file } => {
            let (loader, engine) = build_loader(&config, false)?;
            let unit = loader.open_path(file).await?;
            let result = loader.run(&unit).await?;
            tracing::debug!("Executed {} units", engine.executed().len());
            if !result.is_undefined() {
                println!("{}", result);
            }
        }
        Command::Deps { file } => {
            let (loader, _) = build_loader(&config, true)?;
            let unit = loader.open_path(file).await?;
            loader.load(&unit).await?;
            for dependency in loader.dependency_closure(&unit) {
                print_unit(&dependency);
            }
        }
        Command::Bundle { file, output } => {
            let (loader, engine) = build_loader(&config, true)?;
            let unit = loader.open_path(file).await?;
            loader.run(&unit).await?;

            let mut roots = Vec::new();
            if let Some(parent) = std::path::absolute(file)?.parent() {
                roots.push(parent.to_path_buf());
            }
            for path in &config.include_paths {
                roots.push(std::path::absolute(path)?);
            }

            let units = loader.dependency_closure(&unit);
            let written = bundle::write_bundles(&units, &roots, output).await?;
            println!(
                "{} {} files ({} functions synthesized) into {}",
                "Bundled".green().bold(),
                written.len(),
                engine.synthesized(),
                output.display().cyan()
            );
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<LoaderConfig> {
    let mut config = match &cli.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    config.load_from_env()?;

    let mut include_paths = cli.include.clone();
    include_paths.append(&mut config.include_paths);
    config.include_paths = include_paths;

    if cli.xml {
        config.diagnostic_format = DiagnosticFormat::Xml;
    }
    if cli.no_source_maps {
        config.source_maps = false;
    }

    Ok(config)
}

fn build_loader(config: &LoaderConfig, quiet: bool) -> anyhow::Result<(Loader, Rc<TraceEngine>)> {
    let resolver = Rc::new(FileResolver::new(&config.include_paths)?);
    let engine = Rc::new(TraceEngine::new(quiet));
    let loader = Loader::builder(resolver, engine.clone())
        .compiler(Rc::new(DirectiveCompiler::new()))
        .config(config.clone())
        .build()?;
    Ok((loader, engine))
}

fn print_unit(unit: &Unit) {
    let dependencies = unit.file_dependencies().len();
    let path = source_path(unit.url());
    if dependencies == 0 {
        println!("{}", path);
    } else {
        println!("{} {}", path, format!("({} imports)", dependencies).dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_cli_parses_global_options_after_subcommand() {
        let cli = Cli::parse_from(["quire", "deps", "main.j", "-I", "Frameworks", "--xml"]);

        assert!(matches!(cli.command, Command::Deps { ref file } if file == Path::new("main.j")));
        assert_eq!(cli.include, vec![PathBuf::from("Frameworks")]);
        assert!(cli.xml);
    }

    #[test]
    fn test_command_line_include_paths_come_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("quire.toml");
        std::fs::write(&config_path, "include_paths = [\"lib\"]\nsource_maps = true\n").unwrap();

        let cli = Cli::parse_from([
            "quire",
            "run",
            "main.j",
            "-I",
            "Frameworks",
            "--no-source-maps",
            "-C",
            config_path.to_str().unwrap(),
        ]);
        let config = load_config(&cli).unwrap();

        assert_eq!(config.include_paths[0], PathBuf::from("Frameworks"));
        assert!(config.include_paths.contains(&PathBuf::from("lib")));
        assert!(!config.source_maps);
    }
}
