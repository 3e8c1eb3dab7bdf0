mod cli;
mod error_fmt;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use rexarm_config::Logging;
use rexarm_core::ArmState;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console logs go to stderr so stdout stays machine-readable. `RUST_LOG`
/// overrides `--log-level`. `[logging] file` adds a JSON-lines file sink.
fn init_tracing(json: bool, level: &str, logging: Option<&Logging>) -> eyre::Result<()> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let mut layers: Vec<BoxedLayer> = Vec::new();
    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .compact()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(log) = logging
        && let Some(file) = log.file.as_deref()
    {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
        let appender = match log.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_level = log.level.as_deref().unwrap_or("info");
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(file_level))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")
}

fn execute(cli: &Cli, cfg: &rexarm_config::Config) -> eyre::Result<()> {
    match &cli.cmd {
        Commands::Run {
            duration_s,
            state,
            cursor,
            record,
            print_ms,
        } => {
            let duration = match duration_s {
                Some(s) if s.is_finite() && *s >= 0.0 => Some(Duration::from_secs_f64(*s)),
                Some(s) => eyre::bail!("--duration-s must be a non-negative number, got {s}"),
                None => None,
            };
            let state = state
                .as_deref()
                .map(str::parse::<ArmState>)
                .transpose()?;
            let cursor = match cursor.as_deref() {
                None => None,
                Some([x, y]) => Some((*x, *y)),
                Some(other) => eyre::bail!("--cursor takes X,Y, got {} values", other.len()),
            };
            let opts = run::RunOpts {
                duration,
                state,
                cursor,
                record: *record,
                print_every: Duration::from_millis((*print_ms).max(1)),
                json: cli.json,
            };
            let shutdown = Arc::new(AtomicBool::new(false));
            let summary = run::run_session(cfg, &opts, shutdown)?;
            println!("{}", run::summary_line(&summary, cli.json));
        }
        Commands::Resolve { x, y, raw } => {
            let readout = run::resolve_once(cfg, *x, *y, *raw);
            println!("{}", run::readout_line(&readout, cli.json));
        }
        Commands::Pose { deg } => {
            let pose = run::pose_once(cfg, deg)?;
            println!("{}", run::pose_line(&pose, cli.json));
        }
        Commands::SelfCheck => {
            let report = run::self_check(cfg)?;
            println!("{}", run::self_check_line(&report, cli.json));
        }
    }
    Ok(())
}

fn report(err: &eyre::Report) -> ! {
    if JSON_MODE.get().copied().unwrap_or(false) {
        println!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
    }
    tracing::debug!(error = ?err, "command failed");
    std::process::exit(exit_code_for_error(err));
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg = run::load_config(&cli.config);
    let logging = cfg.as_ref().ok().map(|c| &c.logging);
    if let Err(e) = init_tracing(cli.json, &cli.log_level, logging) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    let result = cfg.and_then(|cfg| {
        tracing::info!(config = %cli.config.display(), joints = cfg.joint_count(), "config loaded");
        execute(&cli, &cfg)
    });
    if let Err(e) = result {
        report(&e);
    }
}
