//! Identifier templating and DNS label sanitization.

use regex::{Captures, Regex};

use crate::container::ContainerMetadata;

/// Maximum length of a single DNS label.
pub const MAX_LABEL_LENGTH: usize = 63;

/// Separator between label path segments.
pub const LABEL_DELIM: char = '.';

/// Turns identifier templates plus container metadata into DNS-safe
/// dot-delimited label paths.
///
/// Templates contain `{section.key}` placeholders; `section` selects a
/// metadata bucket (`container`, `image`, `label`, `env`) and `key` is looked
/// up within it. A template with any empty or missing placeholder is
/// discarded wholesale rather than partially substituted.
#[derive(Debug, Clone)]
pub struct LabelFormatter {
    templates: Vec<String>,
    placeholder: Regex,
}

impl LabelFormatter {
    /// Create a formatter over the given templates, applied in order.
    pub fn new(templates: Vec<String>) -> Self {
        Self {
            templates,
            placeholder: Regex::new(r"\{(\w+)\.([^}]+)\}").expect("placeholder pattern"),
        }
    }

    /// Configured templates, in order.
    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    /// Apply every configured template, keeping only the ones that resolved.
    pub fn format(&self, data: &ContainerMetadata) -> Vec<String> {
        self.templates
            .iter()
            .filter_map(|tpl| self.format_template(tpl, data))
            .collect()
    }

    /// Expand a single template. Returns `None` when any placeholder misses
    /// or the sanitized result is empty.
    pub fn format_template(&self, template: &str, data: &ContainerMetadata) -> Option<String> {
        let mut miss = false;
        let result = self
            .placeholder
            .replace_all(template, |caps: &Captures| {
                let replace = data.lookup(&caps[1], &caps[2]).unwrap_or_default();
                if replace.is_empty() {
                    miss = true;
                }
                replace
            })
            .into_owned();

        if miss {
            return None;
        }

        let result = self.sanitize_labels(&result);
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    /// Split an identifier into label path segments. Trailing empty segments
    /// are dropped; interior empties survive until sanitization.
    pub fn split<'a>(&self, identifier: &'a str) -> Vec<&'a str> {
        if identifier.is_empty() {
            return Vec::new();
        }

        let mut parts: Vec<&str> = identifier.split(LABEL_DELIM).collect();
        while parts.last().is_some_and(|p| p.is_empty()) {
            parts.pop();
        }
        parts
    }

    /// Sanitize every component of a full path, dropping components that end
    /// up empty, and rejoin.
    pub fn sanitize_labels(&self, path: &str) -> String {
        self.split(path)
            .into_iter()
            .map(|label| self.sanitize(label))
            .filter(|label| !label.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Lowercase, truncate to 63 characters, strip everything outside
    /// `[a-z0-9_\-.]`.
    pub fn sanitize(&self, segment: &str) -> String {
        segment
            .to_lowercase()
            .chars()
            .take(MAX_LABEL_LENGTH)
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn formatter(templates: &[&str]) -> LabelFormatter {
        LabelFormatter::new(templates.iter().map(|t| t.to_string()).collect())
    }

    fn metadata() -> ContainerMetadata {
        let mut labels = BTreeMap::new();
        labels.insert("test".to_string(), "test".to_string());
        labels.insert("multi.test".to_string(), "multi-test".to_string());
        labels.insert("com.example/debug".to_string(), "true".to_string());
        labels.insert("empty".to_string(), String::new());
        labels.insert("long".to_string(), "x".repeat(70));

        let mut env = BTreeMap::new();
        env.insert("UPPER".to_string(), "uppercase".to_string());
        env.insert("Mixed".to_string(), "mixed case".to_string());

        ContainerMetadata {
            name: Some("web".to_string()),
            hostname: Some("host-1".to_string()),
            image_name: "example-nginx".to_string(),
            image_ident: "nginx".to_string(),
            image_provider: "example".to_string(),
            image_tag: "latest".to_string(),
            labels,
            env,
        }
    }

    #[test]
    fn sanitize_cases() {
        let f = formatter(&[]);

        assert_eq!(f.sanitize("test"), "test");
        assert_eq!(f.sanitize("dotted.test"), "dotted.test");
        assert_eq!(f.sanitize("under_score"), "under_score");
        assert_eq!(f.sanitize("da-sh"), "da-sh");
        assert_eq!(f.sanitize("slash/test"), "slashtest");
        assert_eq!(f.sanitize("/test"), "test");
        assert_eq!(f.sanitize("Upper"), "upper");
        assert_eq!(f.sanitize(&"a".repeat(64)), "a".repeat(63));
    }

    #[test]
    fn sanitize_labels_cases() {
        let f = formatter(&[]);

        assert_eq!(f.sanitize_labels("one.test"), "one.test");
        assert_eq!(f.sanitize_labels("ONE.TEST"), "one.test");
        assert_eq!(f.sanitize_labels("one..test"), "one.test");
        assert_eq!(f.sanitize_labels(".test"), "test");
        assert_eq!(f.sanitize_labels("one/test"), "onetest");
        assert_eq!(f.sanitize_labels("/./test"), "test");
        assert_eq!(f.sanitize_labels("///.///"), "");
        assert_eq!(f.sanitize_labels("..."), "");
        assert_eq!(f.sanitize_labels(""), "");
    }

    #[test]
    fn split_drops_trailing_empty_segments() {
        let f = formatter(&[]);

        assert_eq!(f.split("a.b"), vec!["a", "b"]);
        assert_eq!(f.split("a.b."), vec!["a", "b"]);
        assert_eq!(f.split(".b"), vec!["", "b"]);
        assert!(f.split("").is_empty());
    }

    #[test]
    fn static_templates_pass_through() {
        let data = metadata();
        assert_eq!(
            formatter(&["static"]).format(&data),
            vec!["static".to_string()]
        );
        assert_eq!(
            formatter(&["multiple.static"]).format(&data),
            vec!["multiple.static".to_string()]
        );
        // No dot inside the braces: not a placeholder, braces stripped
        assert_eq!(
            formatter(&["{label}"]).format(&data),
            vec!["label".to_string()]
        );
        assert_eq!(
            formatter(&["[invalid]"]).format(&data),
            vec!["invalid".to_string()]
        );
    }

    #[test]
    fn missing_or_empty_placeholder_discards_template() {
        let data = metadata();
        assert!(formatter(&["{label.nonexistent}"]).format(&data).is_empty());
        assert!(formatter(&["{label.empty}"]).format(&data).is_empty());
        assert!(formatter(&["{label.empty}.{label.nonexistent}"])
            .format(&data)
            .is_empty());
        assert!(formatter(&["{unknown.section}"]).format(&data).is_empty());
        assert!(formatter(&[""]).format(&data).is_empty());
        assert!(formatter(&["."]).format(&data).is_empty());
    }

    #[test]
    fn placeholders_resolve_and_sanitize() {
        let data = metadata();
        assert_eq!(
            formatter(&["{label.test}"]).format(&data),
            vec!["test".to_string()]
        );
        // Dots and slashes in the key are part of the key, not separators
        assert_eq!(
            formatter(&["{label.multi.test}"]).format(&data),
            vec!["multi-test".to_string()]
        );
        assert_eq!(
            formatter(&["{label.com.example/debug}.web"]).format(&data),
            vec!["true.web".to_string()]
        );
        assert_eq!(
            formatter(&["{label.test}-{label.multi.test}"]).format(&data),
            vec!["test-multi-test".to_string()]
        );
        assert_eq!(
            formatter(&["{env.UPPER}"]).format(&data),
            vec!["uppercase".to_string()]
        );
        assert_eq!(
            formatter(&["{env.Mixed}"]).format(&data),
            vec!["mixedcase".to_string()]
        );
        assert_eq!(
            formatter(&["{image.ident}.{container.name}"]).format(&data),
            vec!["nginx.web".to_string()]
        );
    }

    #[test]
    fn long_labels_truncate_to_63() {
        let data = metadata();
        assert_eq!(
            formatter(&["{label.long}"]).format(&data),
            vec!["x".repeat(63)]
        );
        let long_template = "a".repeat(64);
        assert_eq!(
            formatter(&[long_template.as_str()]).format(&data),
            vec!["a".repeat(63)]
        );
    }

    #[test]
    fn format_preserves_template_order() {
        let data = metadata();
        let f = formatter(&["{container.name}", "{label.nonexistent}", "{image.ident}"]);
        assert_eq!(f.format(&data), vec!["web".to_string(), "nginx".to_string()]);
    }
}
