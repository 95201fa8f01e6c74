//! CLI Entry Point for uedinst
//!
//! Provides command-line access to:
//! - The Gatan Ultrascan 895 camera server (version, insert/retract, acquire)
//! - The DAQ voltage wrapper, against the simulated card
//!
//! # Usage
//!
//! ```bash
//! uedinst --config config/uedinst.toml acquire --exposure 3 --output frame.raw
//! uedinst voltage set Dev1/ao1 2.5 --timeout 1 --simulate
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use uedinst::camera::{CameraController, CameraImage};
use uedinst::config::UedConfig;
use uedinst::daq::{SimulatedDaq, VoltageChannel};
use uedinst::logging::{self, LoggingConfig, OutputFormat};

#[derive(Parser)]
#[command(name = "uedinst")]
#[command(about = "UED lab instrument control: Gatan camera server and DAQ voltages", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = "config/uedinst.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    log_format: OutputFormat,

    /// Log span open/close events
    #[arg(long, global = true)]
    log_spans: bool,

    /// Include source file and line in log events
    #[arg(long, global = true)]
    log_source: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the camera server and print the plugin version
    Version,

    /// Insert the camera into the beam
    Insert,

    /// Retract the camera from the beam
    Retract,

    /// Acquire one image and save it as raw little-endian int16
    Acquire {
        /// Exposure time in seconds
        #[arg(long)]
        exposure: f64,

        /// Keep the dark background (skip dark subtraction)
        #[arg(long)]
        keep_dark: bool,

        /// Output file
        #[arg(long)]
        output: PathBuf,
    },

    /// Analog voltage I/O
    Voltage {
        #[command(subcommand)]
        action: VoltageAction,

        /// Use the simulated DAQ card
        #[arg(long, global = true)]
        simulate: bool,
    },
}

#[derive(Subcommand)]
enum VoltageAction {
    /// Read the instantaneous voltage on a channel (e.g. Dev1/ai0)
    Read { channel: String },

    /// Set the voltage on an output channel (e.g. Dev1/ao1)
    Set {
        channel: String,

        /// Value in volts, within ±10 V
        #[arg(allow_negative_numbers = true)]
        value: f64,

        /// Reset to 0 V after this many seconds
        #[arg(long)]
        timeout: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = UedConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let logging_config = LoggingConfig::from_config(&config)
        .map_err(anyhow::Error::msg)?
        .with_format(cli.log_format)
        .with_span_events(cli.log_spans)
        .with_file_and_line(cli.log_source);
    logging::init(logging_config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Version => {
            let mut camera = CameraController::connect(config.camera).await?;
            println!("{}", camera.version().unwrap_or("unknown"));
            camera.close().await?;
        }
        Commands::Insert => {
            let mut camera = CameraController::connect(config.camera).await?;
            camera.insert().await?;
            camera.close().await?;
        }
        Commands::Retract => {
            let mut camera = CameraController::connect(config.camera).await?;
            camera.retract().await?;
            camera.close().await?;
        }
        Commands::Acquire {
            exposure,
            keep_dark,
            output,
        } => {
            let mut camera = CameraController::connect(config.camera).await?;
            let image = camera.acquire_image(exposure, !keep_dark).await?;
            camera.close().await?;
            write_raw(&image, &output).await?;
            println!("Saved {}x{} frame to {}", image.nrows(), image.ncols(), output.display());
        }
        Commands::Voltage { action, simulate } => {
            if !simulate {
                bail!("no hardware DAQ driver is available; pass --simulate");
            }
            let daq = VoltageChannel::new(SimulatedDaq::new()).with_limit(config.daq.voltage_limit)?;
            match action {
                VoltageAction::Read { channel } => {
                    println!("{:.6}", daq.read_voltage(&channel).await?);
                }
                VoltageAction::Set {
                    channel,
                    value,
                    timeout,
                } => {
                    daq.set_voltage(&channel, value, timeout).await?;
                    println!("{channel} = {:.6} V", daq.read_voltage(&channel).await?);
                }
            }
        }
    }

    Ok(())
}

async fn write_raw(image: &CameraImage, path: &Path) -> Result<()> {
    let bytes: Vec<u8> = image.iter().flat_map(|v| v.to_le_bytes()).collect();
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}
