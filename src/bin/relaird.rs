//! CLI entry point: parses arguments, loads config, and wires one listener
//! per configured bind address to a single hub.
//!
//! Grounded on `bin/irc_server.rs`'s `flexi_logger` setup, with a new
//! `clap`-derived CLI (the teacher depends on `clap` but never used it).

use clap::Parser;
use flexi_logger::{Duplicate, Logger};
use relaird::config::Config;
use relaird::hub::Hub;
use relaird::{listener, motd};

#[derive(Parser, Debug)]
#[command(name = "relaird", version, about = "A multi-user IRC relay server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Overrides the config file's network.bind_address:network.port.
    #[arg(long)]
    bind: Option<String>,

    /// Log level passed to flexi_logger (e.g. "info", "debug", "trace").
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    Logger::try_with_str(&args.log_level)
        .and_then(|logger| logger.log_to_stderr().duplicate_to_stderr(Duplicate::All).start())
        .ok();

    let config = Config::load(&args.config);
    let bind_addr = args.bind.clone().unwrap_or_else(|| config.bind_addr());
    let motd_lines = motd::load(&config.server.motd_path);
    let max_line_length = config.limits.max_message_length;

    let hub = Hub::spawn(config, motd_lines);

    log::info!("relaird starting, listening on {bind_addr}");
    listener::run(&bind_addr, hub, max_line_length).await
}
