// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tether - inspect the host-object bridge from the command line
//!
//! ## Commands
//!
//! - `tether resolve <SPECIFIER>` runs a module load through the bridge
//! - `tether shell` drives a host object through the bridge entry points

mod repl;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tether_bridge::document::file_url;
use tether_bridge::{
    BridgeConfig, DocumentCategory, DocumentInfo, HandleTable, HostBridge, HostEngine,
    NativeString, ScriptEngine, UniqueDocumentInfo, VERSION, with_engine,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tether",
    about = "Inspect the host-object bridge of an embedded script engine",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Configuration file, merged over the global one
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a module specifier the way the native module pipeline would
    Resolve {
        /// Module specifier
        specifier: String,

        /// Referencing document (defaults to ./index.js)
        #[arg(long)]
        from: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the interactive bridge shell
    Shell,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match BridgeConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let filter = if cli.verbose {
        "tether=debug,tether_bridge=debug".to_string()
    } else {
        config.logging.filter.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Some(Command::Resolve {
            specifier,
            from,
            json,
        }) => run_resolve(&config, &specifier, from.as_deref(), json),
        Some(Command::Shell) | None => run_shell(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run_resolve(
    config: &BridgeConfig,
    specifier: &str,
    from: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let handles = Arc::new(HandleTable::new());
    let engine: Arc<dyn HostEngine> =
        Arc::new(ScriptEngine::from_config("tether", Arc::clone(&handles), config)?);
    let bridge = HostBridge::new(handles);

    let from = from.unwrap_or(Path::new("index.js"));
    let referrer = DocumentInfo::from_uri(file_url(from)?, DocumentCategory::StandardModule);
    let root = bridge.modules().register_document(referrer);

    let native = NativeString::from(specifier);
    let loaded = match with_engine(engine, || bridge.load_module(root, native.as_native())) {
        Ok(loaded) => loaded,
        Err(error) => {
            let _ = bridge.release_handle(root);
            if json {
                let out = serde_json::json!({
                    "specifier": specifier,
                    "error": error.to_json(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            return Err(anyhow!("{}", error));
        }
    };

    let object = bridge.handles().resolve(loaded.document)?;
    let document = object
        .downcast_ref::<UniqueDocumentInfo>()
        .context("module handle does not refer to a document")?;
    let info = document.info();
    let uri = info.uri.as_ref().map(|u| u.to_string()).unwrap_or_default();

    if json {
        let out = serde_json::json!({
            "name": info.name,
            "uri": uri,
            "category": info.category.to_string(),
            "uniqueId": document.unique_id(),
            "handle": loaded.document.to_raw(),
            "source": loaded.source,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{} {}", "document".white().bold(), info.name.green());
        println!("  {:10} {}", "uri".dimmed(), uri.cyan());
        println!("  {:10} {}", "category".dimmed(), info.category.yellow());
        println!("  {:10} {}", "unique id".dimmed(), document.unique_id().yellow());
        println!("  {:10} {:?}", "handle".dimmed(), loaded.document);
        println!();
        println!("{}", loaded.source);
    }

    bridge
        .release_handle(loaded.document)
        .and_then(|()| bridge.release_handle(root))
        .map_err(|error| anyhow!("{}", error))?;
    Ok(())
}

fn run_shell(config: &BridgeConfig) -> anyhow::Result<()> {
    let mut shell = repl::Shell::new(config).context("failed to initialize shell")?;
    shell.run().context("shell error")
}
