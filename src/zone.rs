//! Plain-text zone renderings served over the web surface.
//!
//! Two formats: a BIND-style zone file (SOA and NS header plus one A line
//! per registered ident) and a hosts-file listing.

use crate::error::DiscoError;
use crate::registry::Registry;

/// Content type of the BIND rendering.
pub const BIND_CONTENT_TYPE: &str = "text/dns;charset=utf-8";

/// Content type of the hosts rendering.
pub const HOSTS_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

const SEPARATOR: &str = "\t";

/// Render the zone as BIND-style text. The nameserver A line is omitted
/// when no advertise address can be determined.
pub fn render_bind(registry: &Registry) -> Result<String, DiscoError> {
    let ttl = registry.res_ttl();
    let apex = registry.name(None)?.to_ascii();
    let master = registry.zone_master()?.to_ascii();
    let soa = registry.soa()?;

    let mut lines = Vec::new();

    lines.push(
        [
            apex.as_str(),
            &ttl.to_string(),
            "IN",
            "SOA",
            &soa.mname().to_ascii(),
            &soa.rname().to_ascii(),
            &soa.serial().to_string(),
            &soa.refresh().to_string(),
            &soa.retry().to_string(),
            &soa.expire().to_string(),
            &soa.minimum().to_string(),
        ]
        .join(SEPARATOR),
    );
    lines.push([apex.as_str(), &ttl.to_string(), "IN", "NS", &master].join(SEPARATOR));

    if let Some(addr) = registry.advertise_addr() {
        lines.push(
            [
                master.as_str(),
                &ttl.to_string(),
                "IN",
                "A",
                &addr.to_string(),
            ]
            .join(SEPARATOR),
        );
    }

    for (name, addr) in registry.name_records() {
        lines.push(
            [
                name.to_ascii().as_str(),
                &ttl.to_string(),
                "IN",
                "A",
                &addr.to_string(),
            ]
            .join(SEPARATOR),
        );
    }

    lines.push(String::new());
    Ok(lines.join("\n"))
}

/// Render the registered names as hosts-file lines (`address hostname`).
pub fn render_hosts(registry: &Registry) -> String {
    let mut lines: Vec<String> = registry
        .name_records()
        .into_iter()
        .map(|(name, addr)| {
            let hostname = name.to_ascii();
            let hostname = hostname.trim_end_matches('.');
            format!("{addr} {hostname}")
        })
        .collect();

    lines.push(String::new());
    lines.join("\n")
}
