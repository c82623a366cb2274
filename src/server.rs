//! Server setup and lifecycle management.
//!
//! One task per concern (DNS, docker events, web, metrics loop) under a
//! shared cancellation token. Any task finishing, cleanly or not, cancels
//! the rest so the daemon never limps along half-alive.

use hickory_server::authority::{AuthorityObject, Catalog};
use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::authority::{DiscoAuthority, ReverseAuthority};
use crate::config::Config;
use crate::docker::DockerClient;
use crate::error::DiscoError;
use crate::registry::Registry;
use crate::web;

/// Interval for emitting state metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically emit registry metrics.
async fn metrics_loop(registry: Arc<Registry>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                registry.emit_metrics();
                debug!(
                    addresses = registry.address_count(),
                    idents = registry.ident_count(),
                    "emitted state metrics"
                );
            }
            _ = cancel.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Container discovery daemon: DNS server, docker watcher and web surface.
pub struct DiscoServer {
    config: Config,
    registry: Arc<Registry>,
}

impl DiscoServer {
    /// Create a server with the given configuration.
    pub fn new(config: Config) -> Result<Self, DiscoError> {
        let registry = Arc::new(Registry::new(&config.dns)?);

        Ok(Self { config, registry })
    }

    /// Get a reference to the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Run all components until the token is cancelled or one of them stops.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DiscoError> {
        info!(
            listen_addr = %self.config.dns.listen_addr,
            tld = %self.registry.tld(),
            "starting disco-dns server"
        );

        // Connect to docker before serving; a dead endpoint at startup is fatal
        let client = DockerClient::connect(&self.config.docker, self.registry.clone()).await?;

        let docker_cancel = cancel.clone();
        let docker_handle = tokio::spawn(async move {
            let guard = docker_cancel.clone();
            if let Err(e) = client.run(docker_cancel).await {
                error!(error = %e, "docker client error");
            }
            guard.cancel();
        });

        let web_addr = self.config.web.listen_addr;
        let web_registry = self.registry.clone();
        let web_cancel = cancel.clone();
        let web_handle = tokio::spawn(async move {
            let guard = web_cancel.clone();
            if let Err(e) = web::run(web_addr, web_registry, web_cancel).await {
                error!(error = %e, "web server error");
            }
            guard.cancel();
        });

        // Create authorities and catalog
        let zone_authority = DiscoAuthority::new(self.registry.clone())?;
        let reverse_authority = ReverseAuthority::new(self.registry.clone())?;

        let mut catalog = Catalog::new();
        let zone_authority: Arc<dyn AuthorityObject> = Arc::new(zone_authority);
        catalog.upsert(zone_authority.origin().clone(), vec![zone_authority]);
        let reverse_authority: Arc<dyn AuthorityObject> = Arc::new(reverse_authority);
        catalog.upsert(reverse_authority.origin().clone(), vec![reverse_authority]);

        // Create server
        let mut server = ServerFuture::new(catalog);

        // Bind UDP
        let udp_socket = UdpSocket::bind(self.config.dns.listen_addr).await?;
        info!(addr = %self.config.dns.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        // Bind TCP
        let tcp_listener = TcpListener::bind(self.config.dns.listen_addr).await?;
        info!(addr = %self.config.dns.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, Duration::from_secs(30));

        info!(tld = %self.registry.tld(), "DNS server ready to serve queries");

        // Start metrics loop
        let metrics_registry = self.registry.clone();
        let metrics_cancel = cancel.clone();
        let metrics_handle = tokio::spawn(async move {
            metrics_loop(metrics_registry, metrics_cancel).await;
        });

        // Emit initial metrics
        self.registry.emit_metrics();

        // Run server until cancelled
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!(error = %e, "DNS server error");
                }
            }
        }

        cancel.cancel();

        let _ = metrics_handle.await;
        let _ = web_handle.await;
        let _ = docker_handle.await;

        info!("disco-dns server stopped");
        Ok(())
    }
}
