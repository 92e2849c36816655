//! Configuration types

use crate::{ConfigError, FeedResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Default page size when a request does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Requests asking for more than this are clamped.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Default trust threshold for cached lists.
pub const DEFAULT_TRUST_CAP: usize = 1000;

/// Default per-read chance of counter reconciliation (1 in 1000).
pub const DEFAULT_RECONCILE_PROBABILITY: f64 = 0.001;

/// Default expiry for cached counters (one week).
pub const DEFAULT_COUNTER_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Feed cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Page size used when the request omits one.
    pub default_page_size: usize,
    /// Upper bound for requested page sizes.
    pub max_page_size: usize,
    /// Cached lists at or above this length cannot prove "no next page".
    pub trust_cap: usize,
    /// Chance, per counter read, of reconciling against child rows.
    pub reconcile_probability: f64,
    /// Expiry applied when a counter is written to the remote store.
    #[serde(with = "duration_secs")]
    pub counter_ttl: Duration,
    /// Prefix of list-cache keys.
    pub list_namespace: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            trust_cap: DEFAULT_TRUST_CAP,
            reconcile_probability: DEFAULT_RECONCILE_PROBABILITY,
            counter_ttl: DEFAULT_COUNTER_TTL,
            list_namespace: "feed".to_string(),
        }
    }
}

impl FeedConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    /// Set the maximum page size.
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    /// Set the trust cap.
    pub fn with_trust_cap(mut self, cap: usize) -> Self {
        self.trust_cap = cap;
        self
    }

    /// Set the reconciliation probability.
    pub fn with_reconcile_probability(mut self, probability: f64) -> Self {
        self.reconcile_probability = probability;
        self
    }

    /// Set the counter TTL.
    pub fn with_counter_ttl(mut self, ttl: Duration) -> Self {
        self.counter_ttl = ttl;
        self
    }

    /// Set the list key namespace.
    pub fn with_list_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.list_namespace = namespace.into();
        self
    }

    /// Load from `FEEDLINE_*` environment variables, falling back to defaults
    /// for unset ones. The result is validated.
    pub fn from_env() -> FeedResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup. Unparsable values are errors,
    /// never silently replaced by defaults.
    pub fn from_lookup<F>(lookup: F) -> FeedResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "FEEDLINE_PAGE_SIZE")? {
            config.default_page_size = v;
        }
        if let Some(v) = parse_var(&lookup, "FEEDLINE_MAX_PAGE_SIZE")? {
            config.max_page_size = v;
        }
        if let Some(v) = parse_var(&lookup, "FEEDLINE_TRUST_CAP")? {
            config.trust_cap = v;
        }
        if let Some(v) = parse_var(&lookup, "FEEDLINE_RECONCILE_PROBABILITY")? {
            config.reconcile_probability = v;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "FEEDLINE_COUNTER_TTL_SECS")? {
            config.counter_ttl = Duration::from_secs(secs);
        }
        if let Some(namespace) = lookup("FEEDLINE_LIST_NAMESPACE") {
            config.list_namespace = namespace;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - page sizes > 0 and default_page_size <= max_page_size
    /// - trust_cap > 0
    /// - reconcile_probability in [0.0, 1.0]
    /// - list_namespace is not empty
    pub fn validate(&self) -> FeedResult<()> {
        if self.default_page_size == 0 {
            return Err(invalid("default_page_size", 0, "must be greater than 0"));
        }

        if self.max_page_size == 0 {
            return Err(invalid("max_page_size", 0, "must be greater than 0"));
        }

        if self.default_page_size > self.max_page_size {
            return Err(invalid(
                "default_page_size",
                self.default_page_size,
                "must not exceed max_page_size",
            ));
        }

        if self.trust_cap == 0 {
            return Err(invalid("trust_cap", 0, "must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.reconcile_probability) {
            return Err(invalid(
                "reconcile_probability",
                self.reconcile_probability,
                "must be between 0.0 and 1.0",
            ));
        }

        if self.list_namespace.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "list_namespace".to_string(),
            }
            .into());
        }

        // "count" is the counter key family; ':' separates key segments.
        if self.list_namespace == "count" || self.list_namespace.contains(':') {
            return Err(invalid(
                "list_namespace",
                &self.list_namespace,
                "must not be \"count\" or contain ':'",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> crate::FeedError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn parse_var<T, F>(lookup: &F, name: &str) -> FeedResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(name, &raw, &e.to_string())),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeedError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = FeedConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.trust_cap, 1000);
        assert_eq!(config.list_namespace, "feed");
    }

    #[test]
    fn test_builder() {
        let config = FeedConfig::new()
            .with_page_size(10)
            .with_max_page_size(50)
            .with_trust_cap(200)
            .with_reconcile_probability(0.5)
            .with_counter_ttl(Duration::from_secs(60))
            .with_list_namespace("newsfeeds");

        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.trust_cap, 200);
        assert!((config.reconcile_probability - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.counter_ttl, Duration::from_secs(60));
        assert_eq!(config.list_namespace, "newsfeeds");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(FeedConfig::new().with_page_size(0).validate().is_err());
        assert!(FeedConfig::new().with_trust_cap(0).validate().is_err());
        assert!(FeedConfig::new()
            .with_page_size(200)
            .with_max_page_size(100)
            .validate()
            .is_err());
        assert!(FeedConfig::new()
            .with_reconcile_probability(1.5)
            .validate()
            .is_err());
        assert!(matches!(
            FeedConfig::new().with_list_namespace("").validate(),
            Err(FeedError::Config(ConfigError::MissingRequired { .. }))
        ));
        assert!(FeedConfig::new().with_list_namespace("count").validate().is_err());
        assert!(FeedConfig::new().with_list_namespace("news:feed").validate().is_err());
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = FeedConfig::from_lookup(lookup_from(&[
            ("FEEDLINE_PAGE_SIZE", "5"),
            ("FEEDLINE_TRUST_CAP", "50"),
            ("FEEDLINE_COUNTER_TTL_SECS", "30"),
            ("FEEDLINE_LIST_NAMESPACE", "timeline"),
        ]))
        .unwrap();

        assert_eq!(config.default_page_size, 5);
        assert_eq!(config.max_page_size, DEFAULT_MAX_PAGE_SIZE);
        assert_eq!(config.trust_cap, 50);
        assert_eq!(config.counter_ttl, Duration::from_secs(30));
        assert_eq!(config.list_namespace, "timeline");
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = FeedConfig::from_lookup(lookup_from(&[("FEEDLINE_TRUST_CAP", "lots")]))
            .unwrap_err();
        match err {
            FeedError::Config(ConfigError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, "FEEDLINE_TRUST_CAP");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_serde_roundtrip_uses_seconds() {
        let config = FeedConfig::default().with_counter_ttl(Duration::from_secs(90));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["counter_ttl"], 90);

        let parsed: FeedConfig = serde_json::from_str(r#"{"trust_cap": 10}"#).unwrap();
        assert_eq!(parsed.trust_cap, 10);
        assert_eq!(parsed.default_page_size, DEFAULT_PAGE_SIZE);
    }
}
