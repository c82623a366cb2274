//! disco-dns binary entry point.

use clap::Parser;
use disco_dns::{telemetry, Config, DiscoServer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Authoritative DNS server backed by Docker container discovery.
#[derive(Parser, Debug)]
#[command(name = "disco-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "disco-dns.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Load configuration
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("DCD")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    config.validate()?;

    // Initialize telemetry
    telemetry::init(&config.telemetry)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        tld = %config.dns.tld,
        "starting disco-dns"
    );

    // Setup graceful shutdown
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received interrupt, shutting down"),
            Err(e) => error!(error = %e, "unable to listen for shutdown signal"),
        }
        signal_cancel.cancel();
    });

    // Run the server
    let server = DiscoServer::new(config)?;
    let result = server.run(cancel).await;

    if let Err(e) = result {
        error!(error = %e, "server error");
        return Err(e.into());
    }

    info!("disco-dns shutdown complete");
    Ok(())
}
