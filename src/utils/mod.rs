// src/utils/mod.rs
use log::info;

pub mod clock;
pub mod timing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use timing::Timer;

/// Installs the global logger. Chatty transport crates are clamped to `Warn`
/// so per-holding lines stay readable.
pub fn setup_logging(level: log::LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("rustls", log::LevelFilter::Warn)
        .level_for("solana_client", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at level {}.", level);
    Ok(())
}

/// Parses a `LOG_LEVEL` value, falling back to `Info` for anything unknown.
pub fn parse_log_level(raw: &str) -> log::LevelFilter {
    raw.trim().parse().unwrap_or(log::LevelFilter::Info)
}

/// Scales a raw integer amount by `10^decimals`.
pub fn scale_amount(raw: u128, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}
