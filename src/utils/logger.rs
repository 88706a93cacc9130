use std::fmt::Display;

use chrono::Local;
use eyre::Result;
use fern::Dispatch;
use log::{Level, LevelFilter};

/// Installs the console logger. Lines carry the emitting module so handler,
/// oracle and cache output can be told apart in a replay. RPC transport crates are
/// capped at `warn` whatever `level` is.
///
/// # Errors
/// * If a global logger was already installed
pub fn setup_logger(level: LevelFilter) -> Result<()> {
    Dispatch::new()
        .level(level)
        .level_for("alloy_transport_http", LevelFilter::Warn)
        .level_for("hyper_util", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stdout())
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}",
                render(
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.target(),
                    message
                )
            ));
        })
        .apply()?;
    Ok(())
}

fn render(timestamp: impl Display, level: Level, target: &str, message: impl Display) -> String {
    let target = target.strip_prefix("pool_indexer::").unwrap_or(target);
    format!("{timestamp} {level:<5} [{target}] {message}")
}
