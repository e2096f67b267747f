//! vizstream-client entry point.
//!
//! ```text
//! vizstream-client                    Connect using vizstream-client.toml (or defaults)
//! vizstream-client --config <path>    Load a custom config TOML
//! vizstream-client --server <host>    Override the render node address
//! vizstream-client --frames <n>       Stop after n presented frames
//! vizstream-client --gen-config       Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vizstream_client::config::ClientConfig;
use vizstream_client::viewer::Viewer;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vizstream-client", about = "vizstream headless display client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "vizstream-client.toml")]
    config: PathBuf,

    /// Render node address, overriding the config file.
    #[arg(short, long)]
    server: Option<String>,

    /// Render node port, overriding the config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Stop after this many presented frames.
    #[arg(short, long)]
    frames: Option<u64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ClientConfig::load(&cli.config);
    if let Some(server) = cli.server {
        config.network.address = server;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(frames) = cli.frames {
        config.display.frames = frames;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("vizstream-client v{}", env!("CARGO_PKG_VERSION"));
    info!("server: {}:{}", config.network.address, config.network.port);
    info!(
        "viewport: {}x{} {:?}",
        config.display.width, config.display.height, config.display.pixel_format
    );

    let viewer = Viewer::new(config);
    let stop = viewer.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    let presented = viewer.run().await?;
    info!("{presented} frames presented");
    Ok(())
}
