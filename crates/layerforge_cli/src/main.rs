// SPDX-License-Identifier: MIT OR Apache-2.0
//! `layerforge` - command line host for the graph engine.
//!
//! Loads a RON graph file, evaluates it and reports the run:
//! - `eval`: one run, text or JSON summary, optional G-code file
//! - `watch`: re-run whenever the graph or config file changes
//! - `nodes`: list the built-in node types
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

mod watcher;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use layerforge_graph::config::CONFIG_FILE_NAME;
use layerforge_graph::{Engine, EngineConfig, Graph, RunReport, RunStatus};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use watcher::{needs_rerun, GraphWatcher, WatchEvent};

#[derive(Parser)]
#[command(name = "layerforge", version)]
#[command(about = "Evaluate 3D-printing node graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine config file (RON); `layerforge.ron` or defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a graph once
    Eval {
        /// Graph file (RON)
        graph: PathBuf,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,

        /// Write exported G-code to this file
        #[arg(long)]
        gcode: Option<PathBuf>,
    },

    /// Re-evaluate a graph whenever it or the config changes
    Watch {
        /// Graph file (RON)
        graph: PathBuf,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// List the built-in node types
    Nodes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("warn,layerforge_graph=info,layerforge_cli=info")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(1);
        }
    }
}

/// Dispatch a command; `Ok(false)` means the graph run failed
fn run(cli: &Cli) -> Result<bool> {
    let config = cli.config.as_deref();
    match &cli.command {
        Commands::Eval {
            graph,
            output,
            gcode,
        } => eval_command(graph, config, *output, gcode.as_deref()),
        Commands::Watch { graph, output } => watch_command(graph, config, *output),
        Commands::Nodes => {
            list_nodes(&load_engine(config)?);
            Ok(true)
        }
    }
}

fn load_engine(config: Option<&Path>) -> Result<Engine> {
    let config = match config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::load_or_default(Path::new(CONFIG_FILE_NAME))?,
    };
    Ok(Engine::with_default_nodes(config))
}

fn load_graph(path: &Path) -> Result<Graph> {
    Graph::load(path).with_context(|| format!("loading graph {}", path.display()))
}

fn eval_command(
    graph_path: &Path,
    config: Option<&Path>,
    format: OutputFormat,
    gcode_out: Option<&Path>,
) -> Result<bool> {
    let engine = load_engine(config)?;
    let graph = load_graph(graph_path)?;
    let report = engine.run(&graph);
    print_report(&report, format)?;

    if let (Some(out), Some(result)) = (gcode_out, &report.result) {
        if result.is_export() {
            std::fs::write(out, result.gcode.as_bytes())
                .with_context(|| format!("writing {}", out.display()))?;
            tracing::info!("Wrote {} bytes of G-code to {:?}", result.stats.length, out);
        } else {
            tracing::warn!("Graph has no Export node; no G-code written");
        }
    }

    Ok(report.is_ok())
}

fn watch_command(graph_path: &Path, config: Option<&Path>, format: OutputFormat) -> Result<bool> {
    let mut engine = load_engine(config)?;

    let files = watched_files(graph_path, config);
    let watcher = GraphWatcher::new(&files, engine.config().watch_debounce())
        .context("starting file watcher")?;

    rerun(&engine, graph_path, format);

    while let Some(event) = watcher.recv() {
        let mut batch = vec![event];
        batch.extend(watcher.drain());

        for event in &batch {
            match event {
                WatchEvent::Changed(path) => tracing::debug!("Changed: {:?}", path),
                WatchEvent::Removed(path) => tracing::warn!("Removed: {:?}", path),
                WatchEvent::Error(error) => tracing::warn!("Watcher error: {}", error),
            }
        }
        if !needs_rerun(&batch) {
            continue;
        }

        match load_engine(config) {
            Ok(reloaded) => engine = reloaded,
            Err(e) => tracing::warn!("Keeping previous config: {e:#}"),
        }
        rerun(&engine, graph_path, format);
    }

    Ok(true)
}

/// The graph plus whichever config file `load_engine` would read
fn watched_files(graph_path: &Path, config: Option<&Path>) -> Vec<PathBuf> {
    let config = config.unwrap_or(Path::new(CONFIG_FILE_NAME));
    let mut files = vec![graph_path.to_path_buf()];
    if config.exists() {
        files.push(config.to_path_buf());
    }
    files
}

fn rerun(engine: &Engine, graph_path: &Path, format: OutputFormat) {
    let graph = match load_graph(graph_path) {
        Ok(graph) => graph,
        Err(e) => {
            tracing::error!("{e:#}");
            return;
        }
    };
    if let Err(e) = print_report(&engine.run(&graph), format) {
        tracing::error!("Failed to print report: {e:#}");
    }
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", format_report(report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report_json(report))?),
    }
    Ok(())
}

fn format_report(report: &RunReport) -> String {
    match (&report.status, &report.result) {
        (RunStatus::Ok, Some(result)) => {
            let summary = result.summary();
            let mut text = format!(
                "ok in {:.2?}: {} nodes evaluated, {} path points over {} layers, \
                 {} bytes of G-code ({})",
                report.elapsed,
                summary.evaluated_nodes,
                summary.path_points,
                summary.path_layers,
                summary.stats.length,
                summary.profile,
            );
            if !summary.preview_warning.is_empty() {
                text.push_str("\nwarning: ");
                text.push_str(&summary.preview_warning);
            }
            text
        }
        (RunStatus::Ok, None) => format!("ok in {:.2?}", report.elapsed),
        (RunStatus::Error(message), _) => format!("error after {:.2?}: {message}", report.elapsed),
    }
}

fn report_json(report: &RunReport) -> serde_json::Value {
    let elapsed_ms = report.elapsed.as_secs_f64() * 1000.0;
    match &report.status {
        RunStatus::Ok => serde_json::json!({
            "status": "ok",
            "elapsed_ms": elapsed_ms,
            "result": report.result.as_ref().map(|r| r.summary()),
        }),
        RunStatus::Error(message) => serde_json::json!({
            "status": "error",
            "elapsed_ms": elapsed_ms,
            "message": message,
        }),
    }
}

fn list_nodes(engine: &Engine) {
    for definition in engine.registry().definitions() {
        let ports = |ports: &[layerforge_graph::Port]| {
            ports
                .iter()
                .map(|p| {
                    let marker = if p.required { "!" } else { "" };
                    format!("{}: {}{}", p.name, p.port_type, marker)
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "{} [{:?}] ({}) -> ({})\n    {}",
            definition.name,
            definition.category,
            ports(&definition.inputs),
            ports(&definition.outputs),
            definition.description
        );
    }
}
