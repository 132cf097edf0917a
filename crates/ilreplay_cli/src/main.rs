//! ilreplay CLI
//!
//! Replays recorded IL builder logs against the in-memory reference builder,
//! dumps how each line decodes, and compares two replays.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use ilreplay_core::LogId;
use ilreplay_log::{Line, LineSource, classify};
use ilreplay_replay::{
    DiffEngine, RebindPolicy, ReconstructedMethod, ReferenceBuilder, ReplayConfig, ReplayEngine,
    ReplaySummary,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ilreplay")]
#[command(about = "ilreplay - replay recorded IL builder logs", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a log against the reference builder
    Replay {
        /// Path to the log
        log: PathBuf,
        /// Print the reconstructed method as JSON
        #[arg(long)]
        json: bool,
        /// JSON replay config
        #[arg(long)]
        config: Option<PathBuf>,
        /// Let an ID be registered more than once
        #[arg(long)]
        allow_rebind: bool,
        /// Treat the first line as part of the log
        #[arg(long)]
        keep_header: bool,
        /// ID the method builder is bound to
        #[arg(long)]
        method_builder_id: Option<u32>,
    },
    /// Show how every line of a log decodes
    Inspect {
        /// Path to the log
        log: PathBuf,
        /// JSON replay config
        #[arg(long)]
        config: Option<PathBuf>,
        /// Treat the first line as part of the log
        #[arg(long)]
        keep_header: bool,
    },
    /// Replay two logs and compare the results
    Diff {
        /// First log
        left: PathBuf,
        /// Second log
        right: PathBuf,
    },
}

/// Flag overrides for the replay config
#[derive(Debug, Default)]
struct Overrides {
    allow_rebind: bool,
    keep_header: bool,
    method_builder_id: Option<u32>,
}

#[derive(Serialize)]
struct ReplayReport<'a> {
    summary: &'a ReplaySummary,
    fingerprint: String,
    method: &'a ReconstructedMethod,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut out = io::stdout().lock();
    match cli.command {
        Commands::Replay {
            log,
            json,
            config,
            allow_rebind,
            keep_header,
            method_builder_id,
        } => {
            let overrides = Overrides {
                allow_rebind,
                keep_header,
                method_builder_id,
            };
            let config = load_config(config.as_deref(), &overrides)?;
            cmd_replay(&log, &config, json, &mut out)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect {
            log,
            config,
            keep_header,
        } => {
            let overrides = Overrides {
                keep_header,
                ..Overrides::default()
            };
            let config = load_config(config.as_deref(), &overrides)?;
            let errors = cmd_inspect(&log, &config, &mut out)?;
            Ok(if errors == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Diff { left, right } => {
            let equivalent = cmd_diff(&left, &right, &mut out)?;
            Ok(if equivalent {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("ilreplay=debug")
        } else {
            EnvFilter::new("ilreplay=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Config file first, then flags on top
fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<ReplayConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("cannot read config {}", path.display()))?;
            serde_json::from_str(&text)
                .wrap_err_with(|| format!("invalid config {}", path.display()))?
        }
        None => ReplayConfig::default(),
    };

    if overrides.allow_rebind {
        config.rebind_policy = RebindPolicy::Overwrite;
    }
    if overrides.keep_header {
        config.skip_header = false;
    }
    if let Some(id) = overrides.method_builder_id {
        config.method_builder_id = LogId::new(id);
    }
    debug!(?config, "replay config");
    Ok(config)
}

fn replay_file(path: &Path, config: &ReplayConfig) -> Result<(ReferenceBuilder, ReplaySummary)> {
    let outcome = ReplayEngine::new(ReferenceBuilder::new())
        .with_config(config.clone())
        .replay_path(path)
        .wrap_err_with(|| format!("replay of {} failed", path.display()))?;
    Ok((outcome.builder, outcome.summary))
}

fn cmd_replay(path: &Path, config: &ReplayConfig, json: bool, out: &mut impl Write) -> Result<()> {
    let (builder, summary) = replay_file(path, config)?;
    let fingerprint = builder
        .fingerprint()
        .wrap_err("cannot fingerprint the reconstructed method")?;

    if json {
        let report = ReplayReport {
            summary: &summary,
            fingerprint: fingerprint.to_hex(),
            method: builder.method(),
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(());
    }

    let method = builder.method();
    writeln!(out, "source:      {}", summary.source)?;
    writeln!(out, "method:      {}", method.name.as_deref().unwrap_or("<unnamed>"))?;
    writeln!(out, "statements:  {}", summary.statements)?;
    writeln!(out, "ops:         {}", builder.op_count())?;
    writeln!(out, "builders:    {}", builder.builder_count())?;
    writeln!(out, "bindings:    {}", summary.bindings)?;
    writeln!(out, "fingerprint: {}", fingerprint)?;
    if summary.trailing_lines > 0 {
        writeln!(out, "ignored {} line(s) after the body", summary.trailing_lines)?;
    }
    Ok(())
}

/// Print every line's classification; returns how many lines failed to decode
///
/// The first line is only labelled as the header when replay would skip it.
fn cmd_inspect(path: &Path, config: &ReplayConfig, out: &mut impl Write) -> Result<usize> {
    let source = LineSource::from_path(path)
        .wrap_err_with(|| format!("cannot open {}", path.display()))?
        .with_header_skip(false);

    let mut errors = 0;
    for line in source {
        let line = line?;
        if config.skip_header && line.number == 1 {
            writeln!(out, "{:>5}  header      {}", line.number, line.text)?;
            continue;
        }
        match describe(&line.text) {
            Ok(description) => writeln!(out, "{:>5}  {}", line.number, description)?,
            Err(err) => {
                errors += 1;
                writeln!(out, "{:>5}  error       {} ({})", line.number, err, err.category())?;
            }
        }
    }
    Ok(errors)
}

fn describe(text: &str) -> ilreplay_core::ReplayResult<String> {
    let line = classify(text)?;
    let label = format!("{:<11} ", line.label());
    Ok(match line {
        Line::Definition(def) => format!("{}{} = {:?}", label, def.id.tagged(def.tag), def.payload),
        Line::EndOfBody | Line::Annotation => label.trim_end().to_string(),
        Line::Statement(stmt) => {
            let mut args = stmt.args;
            let mut kinds = Vec::new();
            while !args.is_end() {
                kinds.push(format!("{:?}", args.next_token()?.kind));
            }
            format!(
                "{}owner {} name {} [{}]",
                label,
                stmt.owner,
                stmt.name,
                kinds.join(", ")
            )
        }
    })
}

/// Returns whether the two replays are equivalent
fn cmd_diff(left: &Path, right: &Path, out: &mut impl Write) -> Result<bool> {
    let config = ReplayConfig::default();
    let (left_builder, _) = replay_file(left, &config)?;
    let (right_builder, _) = replay_file(right, &config)?;

    let report = DiffEngine::new().diff(left_builder.method(), right_builder.method());
    match &report.result.divergence {
        None => writeln!(
            out,
            "equivalent ({} ops, {} builders)",
            report.summary.left_ops, report.summary.left_builders
        )?,
        Some(divergence) => {
            writeln!(out, "differ at {}", divergence)?;
            writeln!(
                out,
                "ops: {} vs {}, {} in common",
                report.summary.left_ops, report.summary.right_ops, report.summary.common_prefix
            )?;
        }
    }
    Ok(report.result.equivalent)
}
