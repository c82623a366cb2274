//! Configuration types for disco-dns.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::error::DiscoError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// Docker endpoint configuration.
    #[serde(default)]
    pub docker: DockerConfig,

    /// Web server configuration.
    #[serde(default)]
    pub web: WebConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Eagerly reject invalid values so the core never sees them.
    pub fn validate(&self) -> Result<(), DiscoError> {
        if self.dns.tld.trim_end_matches('.').is_empty() {
            return Err(DiscoError::Config("tld must not be empty".to_string()));
        }
        if self.dns.res_ttl < 1 {
            return Err(DiscoError::Config(
                "res_ttl must be a positive number".to_string(),
            ));
        }

        let soa = &self.dns.soa;
        for (name, value) in [
            ("refresh", soa.refresh),
            ("retry", soa.retry),
            ("expire", soa.expire),
            ("min_ttl", soa.min_ttl),
        ] {
            if value < 1 {
                return Err(DiscoError::Config(format!(
                    "{name} must be a positive number"
                )));
            }
        }

        if let Some(spec) = &self.dns.advertise {
            parse_net(spec)
                .ok_or_else(|| DiscoError::InvalidAddress(format!("advertise: {spec}")))?;
        }
        if let Some(spec) = &self.dns.container_cidr {
            parse_net(spec)
                .ok_or_else(|| DiscoError::InvalidAddress(format!("container_cidr: {spec}")))?;
        }

        Ok(())
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for the DNS server to listen on (UDP and TCP).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Top level domain this server is authoritative for
    /// (e.g. "containers.internal"; a trailing dot is tolerated).
    pub tld: String,

    /// TTL for emitted records in seconds.
    #[serde(default = "default_res_ttl")]
    pub res_ttl: u32,

    /// SOA record configuration.
    #[serde(default)]
    pub soa: SoaConfig,

    /// Advertise address or CIDR for the server itself. With a prefix
    /// (e.g. "192.168.1.0/24") the local interfaces are scanned for a match;
    /// a bare address is used directly.
    #[serde(default)]
    pub advertise: Option<String>,

    /// Mask used to select each container's advertised address.
    #[serde(default)]
    pub container_cidr: Option<String>,

    /// Ordered identifier templates expanded against container metadata,
    /// e.g. "{container.name}" or "{image.ident}.{label.com.example/team}".
    #[serde(default)]
    pub templates: Vec<String>,
}

/// SOA (Start of Authority) record configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoaConfig {
    /// Hostname of the zone nameserver, relative to the TLD (e.g. "ns").
    #[serde(default = "default_advertise_name")]
    pub advertise_name: String,

    /// Zone contact name, kept as a single label under the TLD
    /// (e.g. "hostmaster" for hostmaster@<tld>).
    #[serde(default = "default_contact")]
    pub contact: String,

    /// Refresh interval in seconds.
    #[serde(default = "default_refresh")]
    pub refresh: u32,

    /// Retry interval in seconds.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Expire time in seconds.
    #[serde(default = "default_expire")]
    pub expire: u32,

    /// Minimum TTL in seconds.
    #[serde(default = "default_min_ttl")]
    pub min_ttl: u32,
}

impl Default for SoaConfig {
    fn default() -> Self {
        Self {
            advertise_name: default_advertise_name(),
            contact: default_contact(),
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            min_ttl: default_min_ttl(),
        }
    }
}

/// Docker endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Endpoint to watch for container events: a unix socket path or a
    /// "tcp://host:port" URL. Defaults to the local docker socket.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Number of connection retries before giving up.
    #[serde(default)]
    pub connect_retries: u32,

    /// Seconds to wait between reconnect attempts.
    #[serde(default = "default_retry_timeout")]
    pub retry_timeout: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            connect_retries: 0,
            retry_timeout: default_retry_timeout(),
        }
    }
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Address for the web server to listen on.
    #[serde(default = "default_web_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_web_listen_addr(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g. "info", "debug", "disco_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

/// Parse a CIDR, accepting a bare address as a single-host network.
pub fn parse_net(spec: &str) -> Option<IpNet> {
    if let Ok(net) = spec.parse::<IpNet>() {
        return Some(net);
    }

    let addr = spec.parse::<IpAddr>().ok()?;
    let prefix = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    IpNet::new(addr, prefix).ok()
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:10053".parse().expect("static listen addr")
}

fn default_web_listen_addr() -> SocketAddr {
    "0.0.0.0:19053".parse().expect("static web addr")
}

fn default_res_ttl() -> u32 {
    60
}

fn default_advertise_name() -> String {
    "ns".to_string()
}

fn default_contact() -> String {
    "hostmaster".to_string()
}

fn default_refresh() -> u32 {
    3600
}

fn default_retry() -> u32 {
    600
}

fn default_expire() -> u32 {
    604_800
}

fn default_min_ttl() -> u32 {
    60
}

fn default_retry_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            dns: DnsConfig {
                listen_addr: default_listen_addr(),
                tld: "containers.internal".to_string(),
                res_ttl: default_res_ttl(),
                soa: SoaConfig::default(),
                advertise: None,
                container_cidr: None,
                templates: Vec::new(),
            },
            docker: DockerConfig::default(),
            web: WebConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_tld_rejected() {
        let mut config = base_config();
        config.dns.tld = ".".to_string();
        assert!(matches!(config.validate(), Err(DiscoError::Config(_))));
    }

    #[test]
    fn zero_timers_rejected() {
        let mut config = base_config();
        config.dns.soa.refresh = 0;
        assert!(matches!(config.validate(), Err(DiscoError::Config(_))));

        let mut config = base_config();
        config.dns.res_ttl = 0;
        assert!(matches!(config.validate(), Err(DiscoError::Config(_))));
    }

    #[test]
    fn malformed_cidr_rejected() {
        let mut config = base_config();
        config.dns.container_cidr = Some("not-a-cidr".to_string());
        assert!(matches!(
            config.validate(),
            Err(DiscoError::InvalidAddress(_))
        ));
    }

    #[test]
    fn parse_net_accepts_bare_address() {
        let net = parse_net("127.2.4.6").unwrap();
        assert_eq!(net.prefix_len(), 32);
        assert_eq!(net.addr(), "127.2.4.6".parse::<IpAddr>().unwrap());

        let net = parse_net("192.168.128.0/24").unwrap();
        assert_eq!(net.prefix_len(), 24);
    }
}
