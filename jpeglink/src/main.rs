//! jpeglink — entry point.
//!
//! ```text
//! jpeglink simulate <image> [-o out.jpg] [-n count]   Run against the simulator
//! jpeglink encode <image> [-o out] [--base64]          Frame or base64 an image
//! jpeglink decode <input> [-o out.jpg]                 Recover an image
//! jpeglink --config <path>                             Load a custom config TOML
//! jpeglink --gen-config                                Write default config to stdout
//! ```

use std::path::PathBuf;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jpeglink::config::CliConfig;
use jpeglink::simulate::run_session;
use jpeglink::tools::{EncodeFormat, ImageSummary, decode_file, encode_file};
use jpeglink_core::TransferOutcome;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "jpeglink", about = "BLE JPEG transfer client and debug tools")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "jpeglink.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive an image from the simulated peripheral.
    Simulate {
        /// Image the peripheral sends.
        image: PathBuf,
        /// Where to save the last good image (defaults to `output.path`).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of transfers to request.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Encode an image as a framed stream or base64 text.
    Encode {
        image: PathBuf,
        #[arg(short, long, default_value = "frame.bin")]
        output: PathBuf,
        /// Write base64 text instead of the framed stream.
        #[arg(long)]
        base64: bool,
    },
    /// Decode a framed dump or base64 text back into a JPEG.
    Decode {
        input: PathBuf,
        #[arg(short, long, default_value = "decoded.jpg")]
        output: PathBuf,
    },
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&CliConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = CliConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("jpeglink v{}", env!("CARGO_PKG_VERSION"));

    let Some(command) = cli.command else {
        eprintln!("no command given; see --help");
        std::process::exit(2);
    };

    match command {
        Command::Simulate {
            image,
            output,
            count,
        } => {
            let image = Bytes::from(tokio::fs::read(&image).await?);
            let output = output.unwrap_or_else(|| PathBuf::from(&config.output.path));
            info!("inactivity timeout: {} ms", config.link.inactivity_timeout_ms);
            info!("simulated MTU: {}", config.simulator.mtu);

            let outcomes = run_session(&config, image, count.max(1)).await?;
            let mut last_good = None;
            for (i, outcome) in outcomes.iter().enumerate() {
                println!("transfer {}: {outcome}", i + 1);
                if let TransferOutcome::Success(payload) = outcome {
                    last_good = Some(payload);
                }
            }
            match last_good {
                Some(payload) => {
                    tokio::fs::write(&output, payload).await?;
                    println!("{} -> {}", ImageSummary(payload), output.display());
                }
                None => {
                    warn!("no valid image received");
                    std::process::exit(1);
                }
            }
        }
        Command::Encode {
            image,
            output,
            base64,
        } => {
            let format = if base64 {
                EncodeFormat::Base64
            } else {
                EncodeFormat::Framed
            };
            let written = encode_file(&image, &output, format).await?;
            println!("wrote {written} bytes to {}", output.display());
        }
        Command::Decode { input, output } => {
            let jpeg = decode_file(&input, &output).await?;
            println!("{} -> {}", ImageSummary(&jpeg), output.display());
        }
    }

    Ok(())
}
