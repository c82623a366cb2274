//! Docker event client feeding the registry.
//!
//! On startup every running container is registered, then a filtered event
//! stream keeps the registry current: `start` registers, `die` removes,
//! everything else is ignored. A broken stream is reopened with capped
//! backoff; registrations survive across reconnects.

use bollard::container::ListContainersOptions;
use bollard::models::ContainerInspectResponse;
use bollard::system::EventsOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DockerConfig;
use crate::container::ContainerInfo;
use crate::error::DiscoError;
use crate::metrics;
use crate::registry::Registry;

const MAX_BACKOFF: u64 = 30;

/// Watches one Docker endpoint and mirrors its containers into the registry.
pub struct DockerClient {
    docker: Docker,
    endpoint: String,
    registry: Arc<Registry>,
}

fn parse_addr(spec: Option<&String>) -> Option<IpAddr> {
    spec.filter(|s| !s.is_empty()).and_then(|s| s.parse().ok())
}

/// Flatten an inspect response into the fields registration cares about.
fn container_info(inspect: ContainerInspectResponse) -> ContainerInfo {
    let config = inspect.config.unwrap_or_default();
    let network_settings = inspect.network_settings.unwrap_or_default();

    let networks = network_settings
        .networks
        .unwrap_or_default()
        .into_iter()
        .map(|(name, endpoint)| (name, parse_addr(endpoint.ip_address.as_ref())))
        .collect();

    ContainerInfo {
        id: inspect.id.unwrap_or_default(),
        names: inspect.name.into_iter().collect(),
        hostname: config.hostname,
        image: config.image,
        labels: config.labels.unwrap_or_default().into_iter().collect(),
        env: config.env.unwrap_or_default(),
        primary_address: parse_addr(network_settings.ip_address.as_ref()),
        networks,
    }
}

impl DockerClient {
    /// Connect to the configured endpoint, retrying per the config.
    pub async fn connect(
        config: &DockerConfig,
        registry: Arc<Registry>,
    ) -> Result<Self, DiscoError> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| "unix:///var/run/docker.sock".to_string());

        let attempts = config.connect_retries + 1;
        let mut last_err = None;

        for attempt in 1..=attempts {
            match Self::try_connect(&endpoint).await {
                Ok(docker) => {
                    return Ok(Self {
                        docker,
                        endpoint,
                        registry,
                    });
                }
                Err(e) => {
                    if attempt == attempts {
                        error!(endpoint = %endpoint, attempt, "connection attempt failed");
                    } else {
                        info!(
                            endpoint = %endpoint,
                            attempt,
                            retry_in = config.retry_timeout,
                            "connection attempt failed"
                        );
                        sleep(Duration::from_secs(config.retry_timeout)).await;
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            DiscoError::Config(format!("no connection attempts made for {endpoint}"))
        }))
    }

    async fn try_connect(endpoint: &str) -> Result<Docker, DiscoError> {
        let docker = if endpoint.starts_with("tcp://") || endpoint.starts_with("http://") {
            Docker::connect_with_http(endpoint, 60, API_DEFAULT_VERSION)?
        } else {
            let path = endpoint.strip_prefix("unix://").unwrap_or(endpoint);
            Docker::connect_with_unix(path, 60, API_DEFAULT_VERSION)?
        };

        let version = docker.version().await?;
        info!(
            endpoint = %endpoint,
            version = version.version.as_deref().unwrap_or("unknown"),
            "connected to docker endpoint"
        );

        Ok(docker)
    }

    /// Register running containers, then follow the event stream until the
    /// token is cancelled.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DiscoError> {
        self.setup().await;
        self.watch_events(cancel).await;
        Ok(())
    }

    /// Register every currently running container.
    async fn setup(&self) {
        let options = ListContainersOptions::<String>::default();

        match self.docker.list_containers(Some(options)).await {
            Ok(containers) => {
                for summary in containers {
                    let Some(id) = summary.id else { continue };
                    self.register(&id).await;
                }
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "unable to retrieve running containers");
            }
        }
    }

    async fn register(&self, container_id: &str) {
        match self.docker.inspect_container(container_id, None).await {
            Ok(inspect) => {
                if self.registry.add_container(&container_info(inspect)) {
                    metrics::record_container_added(&self.endpoint);
                }
            }
            Err(e) => {
                warn!(container = %container_id, error = %e, "unable to inspect container");
            }
        }
    }

    async fn watch_events(&self, cancel: CancellationToken) {
        let mut backoff_secs = 1u64;

        loop {
            if cancel.is_cancelled() {
                info!("docker event stream shutting down");
                return;
            }

            let options = EventsOptions::<String> {
                filters: HashMap::from([("type".to_string(), vec!["container".to_string()])]),
                ..Default::default()
            };
            let mut stream = self.docker.events(Some(options));

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        info!("docker event stream received shutdown signal");
                        return;
                    }

                    result = stream.next() => {
                        match result {
                            Some(Ok(event)) => {
                                backoff_secs = 1;
                                self.handle_event(
                                    event.action.as_deref(),
                                    event.actor.and_then(|a| a.id).as_deref(),
                                )
                                .await;
                            }
                            Some(Err(e)) => {
                                warn!(endpoint = %self.endpoint, error = %e, "event stream interrupted");
                                metrics::record_client_reconnect(&self.endpoint);
                                break;
                            }
                            None => {
                                info!(endpoint = %self.endpoint, "event stream ended");
                                metrics::record_client_reconnect(&self.endpoint);
                                break;
                            }
                        }
                    }
                }
            }

            sleep(Duration::from_secs(backoff_secs)).await;
            backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF);
        }
    }

    async fn handle_event(&self, action: Option<&str>, container_id: Option<&str>) {
        let Some(container_id) = container_id else {
            return;
        };

        match action {
            Some("start") => {
                debug!(container = %container_id, "got start docker event");
                self.register(container_id).await;
            }
            Some("die") => {
                debug!(container = %container_id, "got die docker event");
                if self.registry.remove_container(container_id) {
                    metrics::record_container_removed(&self.endpoint);
                }
            }
            other => {
                debug!(container = %container_id, action = ?other, "ignoring docker event");
            }
        }
    }
}
