use std::io::{self, IsTerminal, Read};

use anyhow::Result;
use clap::Parser;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "font-identifier-rust",
    version,
    about = "Suggest fonts for the text rendered in an image"
)]
struct Cli {
    /// Run the HTTP server instead of a one-shot identification
    #[arg(long = "serve")]
    serve: bool,

    /// Listen address for --serve (default from settings [server] addr)
    #[arg(long = "addr")]
    addr: Option<String>,

    /// Image file to identify (stdin is read when omitted)
    #[arg(short = 'd', long = "data")]
    data: Option<String>,

    /// Matching strategy: approximate or substring
    #[arg(short = 's', long = "strategy")]
    strategy: Option<String>,

    /// Binarization threshold (128-160)
    #[arg(short = 't', long = "threshold")]
    threshold: Option<i64>,

    /// Similarity cutoff for approximate matching (0-1)
    #[arg(short = 'c', long = "cutoff")]
    cutoff: Option<f64>,

    /// Print the font catalog (name and url per line) and exit
    #[arg(long = "show-catalog")]
    show_catalog: bool,

    /// Re-download the font catalog into the cache file and exit
    #[arg(long = "refresh-catalog")]
    refresh_catalog: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Some(Level::DEBUG)
    } else if cli.serve {
        Some(Level::INFO)
    } else {
        None
    };
    font_identifier_rust::logging::init(level)?;

    let mut config = font_identifier_rust::Config {
        data: cli.data,
        data_bytes: None,
        settings_path: cli.read_settings,
        strategy: cli.strategy,
        threshold: cli.threshold,
        cutoff: cli.cutoff,
        show_catalog: cli.show_catalog,
        refresh_catalog: cli.refresh_catalog,
    };

    if cli.serve {
        let settings = font_identifier_rust::resolve_settings(&config)?;
        let addr = cli.addr.unwrap_or_else(|| settings.server_addr.clone());
        return font_identifier_rust::server::run_server(settings, addr).await;
    }

    let needs_input = !(config.show_catalog || config.refresh_catalog);
    if needs_input && config.data.is_none() && !io::stdin().is_terminal() {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        config.data_bytes = Some(buffer);
    }

    let output = font_identifier_rust::run(config).await?;
    println!("{}", output);
    Ok(())
}
