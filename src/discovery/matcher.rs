//! Pattern and keyword matching over resource metadata.

use crate::cluster::Labels;
use crate::error::ConfigError;
use glob::MatchOptions;
use once_cell::sync::Lazy;
use regex::Regex;

/// A compiled name pattern.
///
/// `re:<regex>` compiles to a regex, strings with glob metacharacters to a
/// case-insensitive glob, anything else to a case-insensitive substring.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Glob(glob::Pattern),
    Regex(Regex),
}

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPattern {
            pattern: raw.to_string(),
            reason,
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("pattern is empty".to_string()));
        }

        if let Some(expr) = trimmed.strip_prefix("re:") {
            return Regex::new(expr)
                .map(Pattern::Regex)
                .map_err(|e| invalid(e.to_string()));
        }

        if trimmed.contains(['*', '?', '[']) {
            return glob::Pattern::new(trimmed)
                .map(Pattern::Glob)
                .map_err(|e| invalid(e.to_string()));
        }

        Ok(Pattern::Literal(trimmed.to_lowercase()))
    }

    pub fn parse_all(raw: &[String]) -> Result<Vec<Self>, ConfigError> {
        raw.iter().map(|p| Self::parse(p)).collect()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Pattern::Literal(needle) => candidate.to_lowercase().contains(needle.as_str()),
            Pattern::Glob(glob) => glob.matches_with(candidate, GLOB_OPTIONS),
            Pattern::Regex(re) => re.is_match(candidate),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Literal(s) => s,
            Pattern::Glob(g) => g.as_str(),
            Pattern::Regex(r) => r.as_str(),
        }
    }
}

/// A namespace label requirement: `key=value`, or bare `key` for presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRequirement {
    pub key: String,
    pub value: Option<String>,
}

impl LabelRequirement {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        let (key, value) = match raw.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim().to_string())),
            None => (raw, None),
        };
        if key.is_empty() {
            return Err(ConfigError::InvalidLabel(raw.to_string()));
        }
        Ok(Self {
            key: key.to_string(),
            value,
        })
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        match (labels.get(&self.key), &self.value) {
            (Some(actual), Some(expected)) => actual.eq_ignore_ascii_case(expected),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

impl std::fmt::Display for LabelRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.key, v),
            None => f.write_str(&self.key),
        }
    }
}

/// Case-insensitive substring keywords.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// First keyword contained in `text`.
    pub fn find(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    /// Match against a name plus every key and value of the given maps.
    pub fn matches_metadata(&self, name: &str, labels: &Labels, annotations: &Labels) -> bool {
        self.matches(name)
            || labels
                .iter()
                .chain(annotations.iter())
                .any(|(k, v)| self.matches(k) || self.matches(v))
    }
}

// ============================================================================
// Extraction helpers
// ============================================================================

static ZONE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)-(zone-[a-z0-9]+)$").expect("static regex"));

static ORG_ID_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)x-scope-orgid["']?\s*[:\s]\s*["']?([A-Za-z0-9_.|\-]+)"#).expect("static regex")
});

const ZONE_LABELS: &[&str] = &["zone", "rollout-group-zone", "mimir.grafana.com/zone"];
const AZ_LABELS: &[&str] = &[
    "topology.kubernetes.io/zone",
    "failure-domain.beta.kubernetes.io/zone",
];
const REGION_LABELS: &[&str] = &[
    "topology.kubernetes.io/region",
    "failure-domain.beta.kubernetes.io/region",
];

/// Zone, availability zone and region for a component, empty when unknown.
pub fn extract_topology(name: &str, labels: &Labels) -> (String, String, String) {
    let first = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| labels.get(*k).filter(|v| !v.is_empty()).cloned())
            .unwrap_or_default()
    };

    let mut zone = first(ZONE_LABELS);
    if zone.is_empty()
        && let Some(caps) = ZONE_SUFFIX.captures(name)
    {
        zone = caps[1].to_lowercase();
    }

    (zone, first(AZ_LABELS), first(REGION_LABELS))
}

/// Find an org ID under any of `keys` (case-insensitive) in labels then annotations.
pub fn extract_org_id(keys: &[String], labels: &Labels, annotations: &Labels) -> Option<String> {
    labels
        .iter()
        .chain(annotations.iter())
        .find(|(k, v)| !v.trim().is_empty() && keys.iter().any(|key| key.eq_ignore_ascii_case(k)))
        .map(|(_, v)| v.trim().to_string())
}

/// Pull an org ID out of free text that sets an `X-Scope-OrgID` header.
pub fn parse_org_id_header(text: &str) -> Option<String> {
    ORG_ID_HEADER
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Strip the conventional `-headless` suffix from a service name.
pub fn normalize_service_name(name: &str) -> &str {
    name.strip_suffix("-headless").unwrap_or(name)
}
