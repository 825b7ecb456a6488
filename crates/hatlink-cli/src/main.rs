//! `hatlink` – line-protocol bridge between a parent process and the board.
//!
//! Reads one command per line on stdin, drives the board, and writes one
//! event per line on stdout. Diagnostics go to stderr only.
//!
//! 1. Initialises logging (`RUST_LOG`, `HATLINK_LOG_FORMAT=json`,
//!    `OTEL_EXPORTER_OTLP_ENDPOINT`).
//! 2. Loads `~/.hatlink/config.toml` and `HATLINK_*` overrides.
//! 3. Runs the bridge until `stop`, Ctrl-C, or (if configured) end of
//!    input, then prints `Goodbye`.

mod config;

use std::io::BufReader;
use std::process::ExitCode;

use hatlink_hal::{SimBoard, SimSensors};
use hatlink_middleware::EventEmitter;
use hatlink_runtime::{Bridge, BridgeConfig, init_tracing};
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let _telemetry = init_tracing("hatlink");

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            eprintln!("[hatlink] config error: {e}; using defaults");
            warn!(error = %e, "config error; using defaults");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    let bridge_config = BridgeConfig::from(&cfg);

    // ── Board ─────────────────────────────────────────────────────────────
    let registry = SimBoard::standard().build();
    let mut sensors = SimSensors::new();

    let mut bridge = match Bridge::start(
        bridge_config,
        BufReader::new(std::io::stdin()),
        registry,
        EventEmitter::stdout(),
    ) {
        Ok(bridge) => bridge,
        Err(e) => {
            error!(error = %e, "failed to start bridge");
            return ExitCode::FAILURE;
        }
    };
    bridge.attach_sensors(&mut sensors);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let stop = bridge.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("interrupt received; shutting down");
        stop.request_stop();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; only `stop` will end the bridge");
    }

    // ── Controller loop ───────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build async runtime");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(bridge.run());

    ExitCode::SUCCESS
}
