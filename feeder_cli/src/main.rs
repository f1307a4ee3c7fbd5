//! `feeder` binary: config loading, logging setup and command dispatch.

mod cli;
mod error_fmt;
mod feed;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};

fn main() -> ExitCode {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", error_fmt::format_error_json(&err));
            } else {
                eprintln!("{}", error_fmt::humanize(&err));
            }
            let code = error_fmt::exit_code_for_error(&err);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn load_config(path: &Path) -> eyre::Result<feeder_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg: feeder_config::Config = toml::from_str(&text).wrap_err("parse config")?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli, logging: &feeder_config::Logging) {
    let level = logging.level.as_deref().unwrap_or(cli.log_level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = logging.file.as_deref().map(|path| {
        let path = Path::new(path);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "feeder.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_writer(writer)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init();
}

fn install_ctrlc() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }
    shutdown
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg.logging);

    let calibration = cli
        .calibration
        .as_deref()
        .map(feeder_config::load_rotation_csv)
        .transpose()?;

    match cli.cmd {
        Commands::Feed {
            rotations,
            as_of,
            realtime,
        } => {
            let shutdown = install_ctrlc();
            let summary = feed::run_feed(
                &cfg,
                calibration.as_ref(),
                rotations,
                as_of,
                realtime,
                &shutdown,
            )?;
            let Some(s) = summary else {
                eyre::bail!("feed interrupted; motor stopped");
            };
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "complete",
                        "as_of_adjusted_sec": s.as_of_adjusted_sec,
                        "rotations": s.rotations,
                        "forced_rotations": s.forced_rotations,
                        "duration_ms": s.duration_ms,
                    })
                );
            } else {
                println!(
                    "Feed complete: {} rotation(s), {} forced, in {:.1} s",
                    s.rotations,
                    s.forced_rotations,
                    s.duration_ms as f64 / 1000.0
                );
                if s.forced_rotations > 0 {
                    eprintln!(
                        "warning: {} rotation(s) ended by timeout; check the rotation sensor",
                        s.forced_rotations
                    );
                }
            }
        }
        Commands::Serve => {
            let shutdown = install_ctrlc();
            let stats = feed::run_serve(&cfg, calibration.as_ref(), &shutdown)?;
            tracing::info!(
                ticks = stats.ticks,
                feeds = stats.feeds_completed,
                tick_errors = stats.tick_errors,
                "serve finished"
            );
        }
        Commands::History => {
            let events = feed::load_history(&cfg)?;
            if cli.json {
                for e in &events {
                    println!("{}", feed::history_json(e));
                }
            } else if events.is_empty() {
                println!("No feedings recorded.");
            } else {
                for e in &events {
                    println!(
                        "{}  {} rotation(s)",
                        feed::format_as_of(e.as_of_adjusted_sec),
                        e.rotations
                    );
                }
            }
        }
        Commands::SelfCheck => {
            let in_rotation = feed::self_check(&cfg)?;
            let backend = if feed::is_simulated() { "simulated" } else { "gpio" };
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "ok", "backend": backend, "in_rotation": in_rotation })
                );
            } else {
                println!(
                    "self-check ok (backend: {backend}, sensor: {})",
                    if in_rotation { "in rotation" } else { "idle" }
                );
            }
        }
        Commands::Health => {
            if cfg.history.path.is_some() {
                feed::load_history(&cfg)?;
            }
            if cli.json {
                println!("{}", serde_json::json!({ "status": "ok" }));
            } else {
                println!("ok");
            }
        }
    }
    Ok(())
}
