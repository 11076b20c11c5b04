mod board;
mod clock;
mod config;
mod cycle;
mod decision;
mod environment;
mod hal;
mod indicator;
mod logger;
mod moisture;
mod timer;
mod valve;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

use board::{BoardOptions, PiBoard};
use clock::SystemClock;
use cycle::Controller;
use logger::FileStorage;
use timer::TokioTimer;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Env config ──────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let mut cfg = config::load(&config_path)?;
    if let Ok(path) = env::var("LOG_PATH") {
        cfg.log_path = path;
    }

    // Most relay boards sold for the Pi are reverse logic (LOW = on).
    let active_low = env::var("RELAY_ACTIVE_LOW")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(true);

    let adc_address = match env::var("ADS1115_ADDR") {
        Ok(s) => irrigation_sensors::adc::parse_address(&s).context("ADS1115_ADDR")?,
        Err(_) => irrigation_sensors::adc::BASE_ADDRESS,
    };

    let opts = BoardOptions {
        active_low,
        dht_device: env::var("DHT_IIO_DEVICE")
            .unwrap_or_else(|_| irrigation_sensors::dht::DEFAULT_DEVICE.to_string()),
        adc_address,
        scenario: env::var("SIM_SCENARIO").unwrap_or_else(|_| "drying".to_string()),
    };

    // ── Hardware ────────────────────────────────────────────────────
    let board = PiBoard::new(&cfg, &opts)?;
    let storage = FileStorage::new(&cfg.log_path);
    info!(path = %cfg.log_path, "log file");

    let clock = SystemClock::new();
    let build = clock::build_timestamp(clock.offset());

    let mut controller = Controller::from_config(&cfg, board, clock, storage, TokioTimer);
    controller.boot(build);

    // ── Run until Ctrl-C ────────────────────────────────────────────
    controller.run_until(tokio::signal::ctrl_c()).await?;

    Ok(())
}
