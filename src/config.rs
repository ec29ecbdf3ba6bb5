//! Session configuration.
//!
//! One [`Configuration`] value is active per session. It is loaded once from a
//! [`ConfigStore`] at startup, passed by reference into everything that needs
//! it, and only replaced through [`Configuration::save`], which persists each
//! key individually and hands back the new snapshot.

use crate::error::Page2AnkiError;
use crate::store::ConfigStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Persisted setting keys.
pub mod keys {
    pub const SERVICE_HOST: &str = "serviceHost";
    pub const SERVICE_PORT: &str = "servicePort";
    pub const DECK_NAME: &str = "serviceDeckName";
    pub const TEMPLATE_NAME: &str = "serviceTemplateName";
    pub const ALLOW_DUPLICATES: &str = "allowDuplicates";
    pub const ADD_TIMESTAMP: &str = "addTimestamp";
    pub const FAST_ADD_ENABLED: &str = "fastAddEnabled";
    pub const REQUEST_TIMEOUT_SECS: &str = "requestTimeoutSecs";
}

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_DECK: &str = "LearnableMeta";
pub const DEFAULT_TEMPLATE: &str = "Basic";

/// Settings for one session.
///
/// Built via [`Configuration::builder()`], [`Configuration::default()`] or
/// [`Configuration::load`].
///
/// # Example
/// ```rust
/// use page2anki::Configuration;
///
/// let config = Configuration::builder()
///     .port(8766)
///     .deck_name("Geography")
///     .allow_duplicates(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint(), "http://localhost:8766");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// AnkiConnect host. Default: `localhost`.
    pub service_host: String,

    /// AnkiConnect port. Default: 8765.
    pub service_port: u16,

    /// Deck that receives new notes; created on first use. Default: `LearnableMeta`.
    pub deck_name: String,

    /// Note type used for new notes. Default: `Basic`.
    pub template_name: String,

    /// Skip the preview step. Default: false.
    pub fast_add_enabled: bool,

    /// Forwarded as `options.allowDuplicate` on `addNote`. Default: true.
    pub allow_duplicates: bool,

    /// Append a bracketed local timestamp to the back of the card. Default: false.
    pub add_timestamp: bool,

    /// Per-request timeout for AnkiConnect calls and image downloads. Default: 30.
    pub request_timeout_secs: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            service_host: DEFAULT_HOST.to_string(),
            service_port: DEFAULT_PORT,
            deck_name: DEFAULT_DECK.to_string(),
            template_name: DEFAULT_TEMPLATE.to_string(),
            fast_add_enabled: false,
            allow_duplicates: true,
            add_timestamp: false,
            request_timeout_secs: 30,
        }
    }
}

impl Configuration {
    /// Create a new builder seeded with the defaults.
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder {
            config: Self::default(),
        }
    }

    /// Start a builder from this snapshot, for edits before [`Configuration::save`].
    pub fn to_builder(&self) -> ConfigurationBuilder {
        ConfigurationBuilder {
            config: self.clone(),
        }
    }

    /// `http://{host}:{port}`
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.service_host, self.service_port)
    }

    /// Read every key once, keeping the default for anything missing or mistyped.
    pub fn load(store: &dyn ConfigStore) -> Self {
        let d = Self::default();
        Self {
            service_host: read(store, keys::SERVICE_HOST, d.service_host, |v| {
                v.as_str().filter(|s| !s.trim().is_empty()).map(str::to_string)
            }),
            service_port: read(store, keys::SERVICE_PORT, d.service_port, |v| {
                v.as_u64()
                    .and_then(|n| u16::try_from(n).ok())
                    .filter(|&p| p != 0)
            }),
            deck_name: read(store, keys::DECK_NAME, d.deck_name, |v| {
                v.as_str().filter(|s| !s.trim().is_empty()).map(str::to_string)
            }),
            template_name: read(store, keys::TEMPLATE_NAME, d.template_name, |v| {
                v.as_str().filter(|s| !s.trim().is_empty()).map(str::to_string)
            }),
            fast_add_enabled: read(store, keys::FAST_ADD_ENABLED, d.fast_add_enabled, Value::as_bool),
            allow_duplicates: read(store, keys::ALLOW_DUPLICATES, d.allow_duplicates, Value::as_bool),
            add_timestamp: read(store, keys::ADD_TIMESTAMP, d.add_timestamp, Value::as_bool),
            request_timeout_secs: read(
                store,
                keys::REQUEST_TIMEOUT_SECS,
                d.request_timeout_secs,
                |v| v.as_u64().filter(|&s| s >= 1),
            ),
        }
    }

    /// Validate `next`, write each key to `store`, and return it as the new
    /// active snapshot.
    pub fn save(next: Configuration, store: &mut dyn ConfigStore) -> Result<Configuration, Page2AnkiError> {
        let next = next.to_builder().build()?;

        store.set(keys::SERVICE_HOST, Value::from(next.service_host.clone()))?;
        store.set(keys::SERVICE_PORT, Value::from(next.service_port))?;
        store.set(keys::DECK_NAME, Value::from(next.deck_name.clone()))?;
        store.set(keys::TEMPLATE_NAME, Value::from(next.template_name.clone()))?;
        store.set(keys::ALLOW_DUPLICATES, Value::from(next.allow_duplicates))?;
        store.set(keys::ADD_TIMESTAMP, Value::from(next.add_timestamp))?;
        store.set(keys::FAST_ADD_ENABLED, Value::from(next.fast_add_enabled))?;
        store.set(keys::REQUEST_TIMEOUT_SECS, Value::from(next.request_timeout_secs))?;

        Ok(next)
    }
}

fn read<T>(store: &dyn ConfigStore, key: &str, default: T, parse: impl Fn(&Value) -> Option<T>) -> T {
    match store.get(key) {
        None => default,
        Some(raw) => match parse(&raw) {
            Some(v) => v,
            None => {
                warn!("Ignoring invalid stored value for '{}': {}", key, raw);
                default
            }
        },
    }
}

/// Builder for [`Configuration`].
#[derive(Debug)]
pub struct ConfigurationBuilder {
    config: Configuration,
}

impl ConfigurationBuilder {
    pub fn service_host(mut self, host: impl Into<String>) -> Self {
        self.config.service_host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.service_port = port;
        self
    }

    pub fn deck_name(mut self, deck: impl Into<String>) -> Self {
        self.config.deck_name = deck.into();
        self
    }

    pub fn template_name(mut self, template: impl Into<String>) -> Self {
        self.config.template_name = template.into();
        self
    }

    pub fn fast_add_enabled(mut self, v: bool) -> Self {
        self.config.fast_add_enabled = v;
        self
    }

    pub fn allow_duplicates(mut self, v: bool) -> Self {
        self.config.allow_duplicates = v;
        self
    }

    pub fn add_timestamp(mut self, v: bool) -> Self {
        self.config.add_timestamp = v;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<Configuration, Page2AnkiError> {
        let c = &self.config;
        if c.service_host.trim().is_empty() {
            return Err(Page2AnkiError::InvalidConfig("Host must not be empty".into()));
        }
        if c.service_port == 0 {
            return Err(Page2AnkiError::InvalidConfig("Port must be 1–65535".into()));
        }
        if c.deck_name.trim().is_empty() {
            return Err(Page2AnkiError::InvalidConfig("Deck name must not be empty".into()));
        }
        if c.template_name.trim().is_empty() {
            return Err(Page2AnkiError::InvalidConfig(
                "Note type name must not be empty".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(Page2AnkiError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
