//! Adder software device.
//!
//! `hippo-adder serve` registers the adder with SoHal and serves it until a
//! peer calls `disconnect_device`, the connection drops, or Ctrl-C.
//! `hippo-adder call <method>` exercises a running adder from the client
//! side.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use hippo_adder::summing::SummingAdder;
use hippo_adder::{Adder, AdderService, CameraKeystoneX, DataWithB64Bytes, DataWithWcharptr, PointX};
use hippo_rpc::ConnectionConfig;
use hippo_swdevice::Bridge;
use hippo_types::{B64Bytes, SwNotification, WideString};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Adder example software device for SoHal
#[derive(Parser, Debug)]
#[command(name = "hippo-adder")]
#[command(version, about, long_about = None)]
struct Args {
    /// SoHal host
    #[arg(long, global = true)]
    host: Option<String>,

    /// SoHal port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// JSON connection config (`host`, `port`, `connectTimeoutMs`, ...)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register the adder and serve calls
    Serve,
    /// Call a method on a running adder
    Call {
        method: Method,

        /// Device index to call
        #[arg(long, default_value_t = 0)]
        index: u32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Method {
    AddPoint,
    Keystone,
    Version,
    BinaryData,
    ReturnError,
    SlowCall,
    HiddenArray,
    DisconnectDevice,
}

/// Set up logging with file output for debugging.
/// In debug builds, defaults to debug level and also logs to a timestamped file.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hippo={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("hippo-adder-{timestamp}.log");
        let log_path = temp_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .with(filter)
            .init();

        eprintln!("Logging to: {} (and stderr)", log_path.display());
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn load_config(args: &Args) -> Result<ConnectionConfig> {
    let mut config = match &args.config {
        Some(path) => ConnectionConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConnectionConfig::default(),
    };
    config = config.with_env().context("Invalid SoHal environment")?;
    if let Some(host) = &args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    Ok(config)
}

async fn serve(config: ConnectionConfig) -> Result<()> {
    let service = AdderService::new(SummingAdder::default())?;
    let bridge = Bridge::new(config, service);
    bridge
        .connect_device()
        .await
        .context("Failed to register the adder with SoHal")?;
    info!("adder registered, waiting for calls");

    tokio::select! {
        () = bridge.wait_for_disconnect() => info!("disconnect requested"),
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("interrupted");
        }
    }

    bridge.disconnect_device().await?;
    info!("adder stopped");
    Ok(())
}

fn keystone_sample() -> CameraKeystoneX {
    let mut k = CameraKeystoneX {
        enabled: true,
        ..CameraKeystoneX::default()
    };
    k.value.bottom_left = PointX { x: 10, y: 11 };
    k.value.bottom_right = PointX { x: 12, y: 13 };
    k.value.top_left = PointX { x: 14, y: 15 };
    k.value.top_right = PointX { x: 16, y: 17 };
    k
}

async fn call(config: ConnectionConfig, index: u32, method: Method) -> Result<()> {
    let adder = Adder::with_config(config, index)?;

    match method {
        Method::AddPoint => {
            let (p1, p2) = (PointX { x: 1, y: 2 }, PointX { x: 3, y: 4 });
            let sum = adder.add_point(&p1, &p2).await?;
            println!("add_point({p1:?}, {p2:?}) = {sum:?}");
        }
        Method::Keystone => println!("{:#?}", adder.keystone(&keystone_sample()).await?),
        Method::Version => println!("version: '{}'", adder.version().await?),
        Method::BinaryData => {
            let data: B64Bytes = (0..127u8).collect::<Vec<_>>().into();
            let sum = adder.binary_data(&data, &data).await?;
            let mismatches = data
                .iter()
                .zip(sum.iter())
                .filter(|(a, s)| a.wrapping_add(**a) != **s)
                .count();
            if mismatches > 0 || sum.len() != data.len() {
                bail!("binary_data returned {mismatches} wrong bytes");
            }
            println!("binary_data: {} bytes ok", sum.len());
        }
        Method::ReturnError => match adder.return_error().await {
            Ok(()) => bail!("return_error unexpectedly succeeded"),
            Err(e) => println!("return_error: {e} ({:#x})", e.raw()),
        },
        Method::SlowCall => {
            adder
                .subscribe(|event: &SwNotification| {
                    if event.event() == "progress" {
                        println!("  progress: {:?}", event.as_i32());
                    }
                })
                .await?;
            println!("slow_call: {}", adder.slow_call(7).await?);
            if let Err(e) = adder.unsubscribe().await {
                warn!("unsubscribe failed: {e}");
            }
        }
        Method::HiddenArray => {
            let data_b64 = DataWithB64Bytes {
                counter: 10,
                hidden_b64bytes: (0..10u8).collect::<Vec<_>>().into(),
            };
            let data_wcharptr = DataWithWcharptr {
                counter: 11,
                hidden_wcharptr: WideString::from_units((1..=11).collect()),
            };
            let ret = adder.hidden_array(&data_b64, &data_wcharptr).await?;
            println!("hidden_array: {:?}", &ret.hidden_b64bytes[..]);
        }
        Method::DisconnectDevice => {
            adder.disconnect_device().await?;
            println!("disconnect_device sent");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging();

    let config = load_config(&args)?;
    match args.command {
        Command::Serve => serve(config).await,
        Command::Call { method, index } => call(config, index, method).await,
    }
}
