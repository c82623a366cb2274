//! In-memory registry mapping container identifiers to addresses.
//!
//! Holds both directions of the mapping:
//! - ident path -> addresses, in a wildcard-capable [`LabelTree`]
//! - address -> idents, for reverse (PTR) lookups and teardown
//!
//! Also owns the zone authority facts (SOA timers, nameserver names, serial)
//! derived from configuration and update time.

use hickory_proto::rr::rdata::SOA;
use hickory_proto::rr::Name;
use ipnet::IpNet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::config::{parse_net, DnsConfig, SoaConfig};
use crate::container::{ContainerInfo, ContainerMetadata};
use crate::error::DiscoError;
use crate::labels::LabelFormatter;
use crate::metrics;
use crate::tree::LabelTree;

/// Docker label namespace for registration controls.
pub const LABEL_NS: &str = "com.docker.container-discovery/";

/// Containers carrying this label with the exact value `"true"` are skipped.
pub const IGNORE_LABEL: &str = "com.docker.container-discovery/ignore";

/// Per-container override for the address-selection CIDR.
pub const ADVERTISE_LABEL: &str = "com.docker.container-discovery/advertise";

/// Labels with this prefix contribute their values as extra idents.
pub const IDENT_LABEL_PREFIX: &str = "com.docker.container-discovery/ident.";

/// Reverse lookup zone for IPv4.
pub const REV_TLD: &str = "in-addr.arpa";

/// Addresses never selected for advertisement.
const SELECT_EXCLUDES: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::LOCALHOST),
    IpAddr::V6(Ipv6Addr::LOCALHOST),
];

/// Both lookup directions live under one lock so a registration is observed
/// atomically by forward and reverse queries.
struct Inner {
    ident_tree: LabelTree<IpAddr>,
    address_idents: HashMap<IpAddr, Vec<String>>,
    last_update: SystemTime,
}

/// Container discovery registry and zone authority.
pub struct Registry {
    formatter: LabelFormatter,
    tld: String,
    res_ttl: u32,
    soa: SoaConfig,
    advertise: Option<IpNet>,
    container_cidr: Option<IpNet>,
    advertise_addr: OnceLock<Option<IpAddr>>,
    inner: Mutex<Inner>,
}

impl Registry {
    /// Build a registry from DNS configuration. Address masks are parsed
    /// eagerly so registration never sees a malformed CIDR.
    pub fn new(config: &DnsConfig) -> Result<Self, DiscoError> {
        let advertise = match &config.advertise {
            Some(spec) => Some(
                parse_net(spec)
                    .ok_or_else(|| DiscoError::InvalidAddress(format!("advertise: {spec}")))?,
            ),
            None => None,
        };
        let container_cidr = match &config.container_cidr {
            Some(spec) => Some(
                parse_net(spec)
                    .ok_or_else(|| DiscoError::InvalidAddress(format!("container_cidr: {spec}")))?,
            ),
            None => None,
        };

        Ok(Self {
            formatter: LabelFormatter::new(config.templates.clone()),
            tld: config.tld.trim_end_matches('.').to_string(),
            res_ttl: config.res_ttl,
            soa: config.soa.clone(),
            advertise,
            container_cidr,
            advertise_addr: OnceLock::new(),
            inner: Mutex::new(Inner {
                ident_tree: LabelTree::new(),
                address_idents: HashMap::new(),
                last_update: UNIX_EPOCH,
            }),
        })
    }

    /// First ident registered for an address, for PTR answers.
    pub fn find_ident(&self, address: IpAddr) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .address_idents
            .get(&address)
            .and_then(|idents| idents.first())
            .cloned()
    }

    /// All addresses matching an ident path, deduplicated in discovery order.
    /// Wildcard segments (`*`) in the query fan out over sibling branches.
    pub fn find_address(&self, ident: &str) -> Vec<IpAddr> {
        let ident = ident.to_lowercase();
        let query = self.formatter.split(&ident);

        let inner = self.inner.lock();
        let mut found = Vec::new();
        for list in inner.ident_tree.search(&query) {
            for addr in list {
                if !found.contains(&addr) {
                    found.push(addr);
                }
            }
        }
        found
    }

    /// Register a container under its primary key and every derived ident.
    ///
    /// Returns false when the container is ignored or no advertisement
    /// address can be determined; state is untouched in both cases.
    pub fn add_container(&self, container: &ContainerInfo) -> bool {
        let pk = self.formatter.sanitize(&container.id);

        if container.labels.get(IGNORE_LABEL).map(String::as_str) == Some("true") {
            info!(container = %pk, "found ignore label");
            return false;
        }

        let cidr = container
            .labels
            .get(ADVERTISE_LABEL)
            .and_then(|spec| parse_net(spec))
            .or(self.container_cidr);

        let Some(address) = self.select_address(&container.address_pool(), cidr, true) else {
            warn!(container = %pk, "unable to determine advertisement address");
            return false;
        };

        let metadata = ContainerMetadata::from_info(container);
        let mut idents = vec![pk.clone()];
        idents.extend(
            container
                .labels
                .iter()
                .filter(|(label, _)| label.starts_with(IDENT_LABEL_PREFIX))
                .map(|(_, value)| value.clone()),
        );
        idents.extend(self.formatter.format(&metadata));

        let mut inner = self.inner.lock();
        inner.address_idents.insert(address, idents.clone());

        info!(container = %pk, %address, "registering address");

        for ident in &idents {
            let branch = self.formatter.split(ident);
            debug!(container = %pk, ident = %ident, "adding ident");
            inner.ident_tree.append(vec![address], &branch);
        }

        inner.last_update = SystemTime::now();
        true
    }

    /// Remove a container and every ident it registered.
    ///
    /// Returns false when the container was never registered.
    pub fn remove_container(&self, container_id: &str) -> bool {
        let pk = self.formatter.sanitize(container_id);

        let mut inner = self.inner.lock();

        // the primary-key branch holds exactly one address
        let address = inner
            .ident_tree
            .delete(&[pk.as_str()])
            .into_iter()
            .flatten()
            .next();

        let Some(address) = address else {
            info!(container = %pk, "ignoring removal of unknown container");
            return false;
        };

        info!(container = %pk, %address, "removing address");

        for ident in inner.address_idents.remove(&address).unwrap_or_default() {
            let branch = self.formatter.split(&ident);
            if !inner.ident_tree.remove(&[address], &branch).is_empty() {
                debug!(container = %pk, ident = %ident, "removing ident");
            }
        }

        inner.last_update = SystemTime::now();
        true
    }

    /// Pick an advertisement address from a candidate pool.
    ///
    /// Without a mask any non-loopback candidate qualifies. With `lazy` and a
    /// single-host mask the mask address is returned directly, without
    /// consulting the pool.
    pub fn select_address(
        &self,
        pool: &[IpAddr],
        cidr: Option<IpNet>,
        lazy: bool,
    ) -> Option<IpAddr> {
        let mask = cidr.unwrap_or(IpNet::V4(
            ipnet::Ipv4Net::new(Ipv4Addr::UNSPECIFIED, 0).expect("zero prefix"),
        ));

        if lazy && mask.prefix_len() == mask.max_prefix_len() {
            return Some(mask.addr());
        }

        pool.iter()
            .copied()
            .find(|addr| !SELECT_EXCLUDES.contains(addr) && mask.contains(addr))
    }

    /// Zone apex without a trailing dot.
    pub fn tld(&self) -> &str {
        &self.tld
    }

    /// TTL for emitted records.
    pub fn res_ttl(&self) -> u32 {
        self.res_ttl
    }

    /// Time of the most recent registration change.
    pub fn last_update(&self) -> SystemTime {
        self.inner.lock().last_update
    }

    /// Zone serial: Unix timestamp of the last update. Zero until the first
    /// registration change.
    pub fn serial(&self) -> u32 {
        self.last_update()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }

    /// FQDN for an ident under the zone apex; the apex itself when `None`.
    pub fn name(&self, ident: Option<&str>) -> Result<Name, hickory_proto::ProtoError> {
        match ident {
            Some(ident) => Name::from_ascii(format!("{}.{}.", ident, self.tld)),
            None => Name::from_ascii(format!("{}.", self.tld)),
        }
    }

    /// FQDN of the zone nameserver.
    pub fn zone_master(&self) -> Result<Name, hickory_proto::ProtoError> {
        self.name(Some(&self.soa.advertise_name))
    }

    /// Zone contact name. The configured contact stays a single label even
    /// when it contains dots (`host.master` is `host\.master.<tld>.`).
    pub fn zone_contact(&self) -> Result<Name, hickory_proto::ProtoError> {
        self.name(None)?.prepend_label(self.soa.contact.as_str())
    }

    /// SOA rdata for the zone.
    pub fn soa(&self) -> Result<SOA, hickory_proto::ProtoError> {
        Ok(SOA::new(
            self.zone_master()?,
            self.zone_contact()?,
            self.serial(),
            self.soa.refresh as i32,
            self.soa.retry as i32,
            self.soa.expire as i32,
            self.soa.min_ttl,
        ))
    }

    /// Reverse the dot-separated parts of an address string, so
    /// `78.56.34.12` from an `in-addr.arpa` name becomes `12.34.56.78`.
    pub fn reverse(&self, address: &str) -> String {
        let mut parts: Vec<&str> = address.split('.').collect();
        parts.reverse();
        parts.join(".")
    }

    /// Address advertised for the zone nameserver, selected from the local
    /// interfaces on first use and cached.
    pub fn advertise_addr(&self) -> Option<IpAddr> {
        *self.advertise_addr.get_or_init(|| {
            let pool: Vec<IpAddr> = if_addrs::get_if_addrs()
                .map(|ifaces| ifaces.into_iter().map(|i| i.ip()).collect())
                .unwrap_or_default();

            let selected = self.select_address(&pool, self.advertise, true);
            match &selected {
                Some(addr) => debug!(%addr, "selected advertise address"),
                None => warn!("no usable advertise address on local interfaces"),
            }
            selected
        })
    }

    /// Every (FQDN, address) pair currently registered, in discovery order.
    pub fn name_records(&self) -> Vec<(Name, IpAddr)> {
        let inner = self.inner.lock();
        inner
            .ident_tree
            .entries()
            .into_iter()
            .filter_map(|(path, addr)| self.name(Some(&path.join("."))).ok().map(|n| (n, addr)))
            .collect()
    }

    /// Count of registered addresses.
    pub fn address_count(&self) -> usize {
        self.inner.lock().address_idents.len()
    }

    /// Count of registered (ident, address) pairs.
    pub fn ident_count(&self) -> usize {
        self.inner.lock().ident_tree.entries().len()
    }

    /// Emit current state metrics.
    pub fn emit_metrics(&self) {
        metrics::record_state_counts(self.address_count(), self.ident_count());
        metrics::record_serial(self.serial());
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("tld", &self.tld)
            .field("res_ttl", &self.res_ttl)
            .finish_non_exhaustive()
    }
}
