//! Container runtime metadata and its typed extraction.

use std::collections::BTreeMap;
use std::net::IpAddr;

/// Structured bag of facts delivered by the event client for one container.
#[derive(Debug, Clone, Default)]
pub struct ContainerInfo {
    /// Runtime identifier (long hex id).
    pub id: String,
    /// Container names as reported by the runtime (may carry a leading `/`).
    pub names: Vec<String>,
    /// Configured hostname.
    pub hostname: Option<String>,
    /// Image reference string (`name[:tag]`).
    pub image: Option<String>,
    /// Label map.
    pub labels: BTreeMap<String, String>,
    /// Raw environment entries (`KEY=VALUE`).
    pub env: Vec<String>,
    /// Primary address from the runtime's network settings.
    pub primary_address: Option<IpAddr>,
    /// Per-network addresses, keyed by network name.
    pub networks: BTreeMap<String, Option<IpAddr>>,
}

impl ContainerInfo {
    /// All candidate addresses for advertisement selection, primary first.
    pub fn address_pool(&self) -> Vec<IpAddr> {
        self.primary_address
            .into_iter()
            .chain(self.networks.values().copied().flatten())
            .collect()
    }
}

/// Typed extraction of the metadata buckets the identifier templates can
/// reference (`container`, `image`, `label`, `env`).
#[derive(Debug, Clone, Default)]
pub struct ContainerMetadata {
    /// First reported container name.
    pub name: Option<String>,
    /// Configured hostname.
    pub hostname: Option<String>,
    /// Full image name with registry and path components dashified.
    pub image_name: String,
    /// Last path component of the image name.
    pub image_ident: String,
    /// Second-to-last path component of the image name, if any.
    pub image_provider: String,
    /// Image tag, `latest` when the reference carries none.
    pub image_tag: String,
    /// Label map, keyed verbatim.
    pub labels: BTreeMap<String, String>,
    /// Environment entries split into key/value pairs.
    pub env: BTreeMap<String, String>,
}

/// Restrict an image reference component to `[a-z0-9-]`, replacing runs of
/// anything else with a single `-`.
fn dashify(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    let mut in_run = false;
    for c in component.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out
}

impl ContainerMetadata {
    /// Build the template buckets from raw container info.
    pub fn from_info(info: &ContainerInfo) -> Self {
        let runner = info.image.clone().unwrap_or_default();
        let (image_name, image_tag) = match runner.split_once(':') {
            Some((name, tag)) => (name.to_string(), tag.to_string()),
            None => (runner, "latest".to_string()),
        };

        let mut name_parts: Vec<&str> = image_name.split('/').collect();
        let image_ident = name_parts.pop().unwrap_or_default();
        let image_provider = name_parts.pop().unwrap_or_default();

        let env = info
            .env
            .iter()
            .filter_map(|pair| {
                pair.split_once('=')
                    .map(|(key, value)| (key.to_string(), value.to_string()))
            })
            .collect();

        Self {
            name: info.names.first().cloned(),
            hostname: info.hostname.clone(),
            image_ident: dashify(image_ident),
            image_provider: dashify(image_provider),
            image_name: dashify(&image_name),
            image_tag,
            labels: info.labels.clone(),
            env,
        }
    }

    /// Placeholder dispatch for `{section.key}` template lookups.
    pub fn lookup(&self, section: &str, key: &str) -> Option<String> {
        match section {
            "container" => match key {
                "name" => self.name.clone(),
                "ident" => self.hostname.clone(),
                _ => None,
            },
            "image" => match key {
                "name" => Some(self.image_name.clone()),
                "ident" => Some(self.image_ident.clone()),
                "provider" => Some(self.image_provider.clone()),
                "tag" => Some(self.image_tag.clone()),
                _ => None,
            },
            "label" => self.labels.get(key).cloned(),
            "env" => self.env.get(key).cloned(),
            _ => None,
        }
    }
}
