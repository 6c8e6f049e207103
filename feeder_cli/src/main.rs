mod backend;
mod bus;
mod cli;
mod commands;
mod error_fmt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    let code = match real_main(&cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "feeder failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: &Cli) -> eyre::Result<i32> {
    // Config first so the file sink can be set up from it; load errors are
    // still reported through the fallback console logger.
    let cfg = feeder_config::load_file(&cli.config);
    init_tracing(cli, cfg.as_ref().ok().map(|c| &c.logging))?;
    let cfg = cfg?;
    tracing::debug!(config = %cli.config.display(), device = %cfg.device.id, "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .wrap_err("install ctrl-c handler")?;
    }

    match &cli.cmd {
        Commands::Run { max_ticks } => {
            commands::run(&cfg, *max_ticks, &shutdown)?;
            Ok(0)
        }
        Commands::Feed { grams, max_ticks } => {
            let report = commands::feed(&cfg, *grams, *max_ticks, &shutdown)?;
            if cli.json {
                println!("{}", report.to_json());
            } else {
                println!("{}", report.to_text());
            }
            Ok(report.exit_code())
        }
        Commands::SelfCheck => {
            commands::self_check(&cfg, cli.json)?;
            Ok(0)
        }
        Commands::Health => {
            commands::health(&cfg, cli.json)?;
            Ok(0)
        }
    }
}

/// Console logs go to stderr (stdout carries bus traffic and results). An
/// optional JSON-lines file sink comes from `[logging]`.
fn init_tracing(cli: &Cli, logging: Option<&feeder_config::Logging>) -> eyre::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .wrap_err_with(|| format!("invalid --log-level {:?}", cli.log_level))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    });

    if let Some(file) = logging.and_then(|l| l.file.as_deref()) {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file {file:?} has no file name"))?;
        let rotation = logging.and_then(|l| l.rotation.as_deref()).unwrap_or("never");
        let appender = match rotation {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let level = logging.and_then(|l| l.level.as_deref()).unwrap_or("info");
        let file_filter = EnvFilter::try_new(level)
            .wrap_err_with(|| format!("invalid logging.level {level:?}"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")
}
