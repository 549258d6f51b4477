//! Application entry point shared by the binary and the integration tests.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use yansi::Paint;

use crate::cli::{Cli, Commands, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, ScanSummary, SignatureKind};
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::output::{GroupReporter, JsonReporter, OutputError, TextReporter};
use crate::progress::Progress;
use crate::signal::install_handler;

/// Run the parsed command line, writing groups to stdout.
///
/// # Errors
///
/// Returns an error for fatal conditions: an invalid root or manifest, an
/// empty signature chain, or an output failure other than a closed pipe.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let color = !cli.no_color && io::stdout().is_terminal();
    let stdout = io::stdout();
    run_app_with(cli, stdout.lock(), color)
}

/// Run the parsed command line, writing groups to `out`.
///
/// # Errors
///
/// Same as [`run_app`].
pub fn run_app_with<W: Write>(cli: Cli, mut out: W, color: bool) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    match cli.command {
        Commands::Signatures => {
            match write_signatures(&mut out, color) {
                Err(e) if e.is_broken_pipe() => log::debug!("Output closed early"),
                other => other.context("Failed to write signature list")?,
            }
            Ok(ExitCode::Success)
        }
        Commands::Scan(ref args) => {
            let mut config = Config::load(cli.config.as_deref(), cli.profile.as_deref());
            config.merge_scan_args(args);
            run_scan(args, &config, cli.quiet, &mut out, color)
        }
    }
}

fn run_scan<W: Write>(
    args: &ScanArgs,
    config: &Config,
    quiet: bool,
    out: W,
    color: bool,
) -> Result<ExitCode> {
    let handler = install_handler();

    let mut finder_config = config.finder_config().with_shutdown_flag(handler.flag());
    if config.progress {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new(quiet)));
    }
    log::debug!("{:?}", finder_config);

    let finder = DuplicateFinder::new(finder_config);
    let mut stream = finder.stream(&args.roots).context("Failed to start scan")?;

    let mut reporter: Box<dyn GroupReporter + '_> = match config.output {
        OutputFormat::Text => Box::new(
            TextReporter::new(out)
                .with_labels(config.labels)
                .with_color(color),
        ),
        OutputFormat::Json => Box::new(JsonReporter::new(out).with_pretty(args.pretty)),
    };

    let mut closed = false;
    for group in stream.by_ref() {
        match reporter.report(&group) {
            Ok(()) => {}
            Err(e) if e.is_broken_pipe() => {
                log::debug!("Output closed early, stopping");
                closed = true;
                break;
            }
            Err(e) => return Err(e).context("Failed to write group"),
        }
    }
    if !closed {
        match reporter.finish() {
            Err(e) if e.is_broken_pipe() => log::debug!("Output closed early"),
            other => other.context("Failed to flush output")?,
        }
    }

    let summary = stream.summary();
    log_summary(&summary);

    if summary.interrupted {
        log::warn!("Scan interrupted, reported groups are complete but others may be missing");
        return Ok(ExitCode::Interrupted);
    }
    if summary.has_errors() {
        return Ok(ExitCode::PartialSuccess);
    }
    Ok(ExitCode::Success)
}

fn log_summary(summary: &ScanSummary) {
    log::info!(
        "Scanned {} candidates ({} admitted, {} rejected), found {} duplicate groups \
         ({} duplicate files, {} reclaimable) in {:.2?}",
        summary.candidates,
        summary.admitted,
        summary.rejected,
        summary.duplicate_groups,
        summary.duplicate_files,
        summary.reclaimable_display(),
        summary.scan_duration
    );
    log::debug!(
        "{} signatures computed, {} files without a signature",
        summary.signatures_computed,
        summary.unsigned
    );
    if summary.has_errors() {
        log::warn!(
            "{} candidates skipped during discovery and {} during signing because of errors",
            summary.scan_errors,
            summary.failed
        );
    }
}

fn write_signatures<W: Write>(out: &mut W, color: bool) -> Result<(), OutputError> {
    let width = SignatureKind::all()
        .iter()
        .map(|kind| kind.name().len())
        .max()
        .unwrap_or(0);

    for kind in SignatureKind::all() {
        let name = format!("{:<width$}", kind.name());
        let cost = format!(
            "{:<8}",
            if kind.reads_content() { "content" } else { "metadata" }
        );
        if color {
            writeln!(
                out,
                "{}  {}  {}",
                name.cyan().bold(),
                cost.dim(),
                kind.description()
            )?;
        } else {
            writeln!(out, "{}  {}  {}", name, cost, kind.description())?;
        }
    }
    out.flush()?;
    Ok(())
}
