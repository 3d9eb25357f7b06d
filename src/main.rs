use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sml_bridge_rs::{init_logger, log_info, BridgeConfig, RegisterStore, SmlDecoder};

#[derive(Parser)]
#[command(name = "sml-bridge")]
#[command(about = "Bridge SML smart-meter telemetry to a Modbus RTU slave")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge on two serial ports
    Run {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the telemetry (infrared) serial port
        #[arg(long)]
        telemetry_port: Option<String>,
        /// Override the fieldbus (RS-485) serial port
        #[arg(long)]
        fieldbus_port: Option<String>,
        /// Override the Modbus slave address
        #[arg(short, long)]
        address: Option<u8>,
    },
    /// Decode a captured SML datagram file and print the register bank
    Decode { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            telemetry_port,
            fieldbus_port,
            address,
        } => {
            let mut config = match config {
                Some(path) => BridgeConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => BridgeConfig::default(),
            };
            if let Some(port) = telemetry_port {
                config.telemetry.port = port;
            }
            if let Some(port) = fieldbus_port {
                config.fieldbus.port = port;
            }
            if let Some(addr) = address {
                config.device_address = addr;
            }
            sml_bridge_rs::bridge::run(&config).await?;
        }
        Commands::Decode { file } => {
            let data =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;

            let mut store = RegisterStore::new();
            let mut decoder = SmlDecoder::new();
            for byte in data {
                decoder.feed(byte, &mut store);
            }

            let stats = decoder.stats();
            log_info(&format!(
                "{} message(s) committed, {} checksum failure(s), {} resync(s)",
                stats.messages_committed, stats.checksum_failures, stats.resyncs
            ));

            let mut combined: u32 = 0;
            for index in 0..store.register_count() {
                let value = store.read_register(index);
                println!("R{}: 0x{:04X}", 256 + index, value);
                combined = (combined << 16) | u32::from(value);
                if index % 2 == 1 {
                    println!("      {}", combined as i32);
                }
            }
        }
    }

    Ok(())
}
