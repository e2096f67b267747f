//! vizstream-server entry point.
//!
//! ```text
//! vizstream-server                  Serve with vizstream-server.toml (or defaults)
//! vizstream-server --config <path>  Load a custom config TOML
//! vizstream-server --port <n>       Override the listen port
//! vizstream-server --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vizstream_server::config::ServerConfig;
use vizstream_server::service::RenderNode;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vizstream-server", about = "vizstream render node")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "vizstream-server.toml")]
    config: PathBuf,

    /// Listen port, overriding the config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("vizstream-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen: {}:{}", config.network.address, config.network.port);
    info!(
        "render: {}x{} {:?} @ {} fps, {} samples",
        config.render.width,
        config.render.height,
        config.render.pixel_format,
        config.render.target_fps,
        config.render.max_samples
    );

    let node = RenderNode::new(config);
    let stop = node.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    node.run().await?;
    Ok(())
}
