use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use ble_door_remote::commands::{self, Flow, UiCommand, HELP};
use ble_door_remote::config::peripheral_config::PeripheralConfig;
use ble_door_remote::core::bluetooth::{event_channel, BluestLink};
use ble_door_remote::core::MessageSink;
use ble_door_remote::{logging, AppConfig, AppState};
use clap::Parser;
use log::{info, LevelFilter};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Remote control for the BLE door peripheral.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the peripheral address, e.g. 00:15:85:14:9C:09
    #[arg(long)]
    address: Option<String>,

    /// Automatic reconnect attempts after a failure or drop
    #[arg(long)]
    retries: Option<u32>,

    /// Write the effective config back to the config file
    #[arg(long)]
    save_config: bool,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config_path = cli.config.clone().or_else(AppConfig::default_path);
    let mut config = match &config_path {
        Some(path) => AppConfig::load_config(path).await?,
        None => AppConfig::default(),
    };
    if let Some(address) = &cli.address {
        config.peripheral = PeripheralConfig::new(
            address,
            config.peripheral.service_uuid(),
            config.peripheral.characteristic_uuid(),
        )?;
    }
    if let Some(retries) = cli.retries {
        config.link.reconnect.max_retries = retries;
    }
    if cli.save_config {
        if let Some(path) = &config_path {
            config.save_config(path).await?;
        }
    }

    let (events_tx, events_rx) = event_channel();
    let link = Arc::new(BluestLink::new(events_tx, config.link.scan_timeout()).await);
    let (app_state, mut sink_rx) = AppState::start(link, events_rx, &config);

    let message_log = app_state.message_log.clone();
    tokio::spawn(async move {
        while let Some(message) = sink_rx.recv().await {
            print!("{}", message.line());
            let _ = std::io::stdout().flush();
            message_log.append(message);
        }
    });

    println!("{}", HELP);
    app_state.bluetooth_manager.connect().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<UiCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        match commands::run_command(&command, &app_state).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("{}", e),
        }
    }

    info!("Shutting down");
    app_state.shutdown().await;
    Ok(())
}
