//! Breaker configuration read from a backend's extra config.
//!
//! Two shapes coexist, each under its own namespace:
//!
//! ```json
//! "extra_config": {
//!     "qos/circuit-breaker/consecutive": { "error": 5, "success": 2, "timeout": "10s" },
//!     "qos/circuit-breaker": { "interval": 60, "timeout": 10, "maxErrors": 5, "logStatusChange": true, "name": "users" }
//! }
//! ```
//!
//! Extraction never fails. A missing entry, an entry that is not an object, or
//! an object whose fields are all unusable decodes to the zero configuration,
//! which disables the breaker for that backend.

use crate::decode::{self, format_duration};
use proxy_breaker_core::ExtraConfig;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::time::Duration;

/// Namespace of the count-threshold configuration.
pub const CONSECUTIVE_NAMESPACE: &str = "qos/circuit-breaker/consecutive";

/// Namespace of the interval configuration.
pub const INTERVAL_NAMESPACE: &str = "qos/circuit-breaker";

/// Count-threshold configuration.
///
/// Opens after `failures_to_open` consecutive failures, closes again after
/// `successes_to_close` consecutive successes while half-open, and waits
/// `cooldown` before letting trial calls through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ConsecutiveConfig {
    #[serde(rename = "error")]
    pub failures_to_open: u32,
    #[serde(rename = "success")]
    pub successes_to_close: u32,
    #[serde(rename = "timeout", serialize_with = "serialize_duration")]
    pub cooldown: Duration,
}

impl ConsecutiveConfig {
    /// Reads the entry stored under [`CONSECUTIVE_NAMESPACE`].
    pub fn from_extra(extra: &ExtraConfig) -> Self {
        match extra.get(CONSECUTIVE_NAMESPACE).and_then(Value::as_object) {
            Some(map) => Self::from_map(map),
            None => Self::default(),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let mut cfg = Self::default();
        if let Some(n) = decode::uint32(map.get("error")) {
            cfg.failures_to_open = n;
        }
        if let Some(n) = decode::uint32(map.get("success")) {
            cfg.successes_to_close = n;
        }
        if let Some(d) = decode::duration(map.get("timeout")) {
            cfg.cooldown = d;
        }
        cfg
    }

    /// Returns true for the zero configuration.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Interval configuration.
///
/// Opens once consecutive failures exceed `max_errors`, waits `timeout_secs`
/// before a trial call, and forgets closed-state counts every
/// `interval_secs`. Transitions are logged when `log_status_change` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct IntervalConfig {
    #[serde(rename = "interval")]
    pub interval_secs: u64,
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,
    #[serde(rename = "maxErrors")]
    pub max_errors: u32,
    #[serde(rename = "logStatusChange")]
    pub log_status_change: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IntervalConfig {
    /// Reads the entry stored under [`INTERVAL_NAMESPACE`].
    ///
    /// `maxErrors` and `logStatusChange` are the canonical keys; the older
    /// `max_errors` and `log_status_change` spellings are still read when the
    /// canonical key is absent.
    pub fn from_extra(extra: &ExtraConfig) -> Self {
        match extra.get(INTERVAL_NAMESPACE).and_then(Value::as_object) {
            Some(map) => Self::from_map(map),
            None => Self::default(),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let mut cfg = Self::default();
        if let Some(n) = decode::uint(map.get("interval")) {
            cfg.interval_secs = n;
        }
        if let Some(n) = decode::uint(map.get("timeout")) {
            cfg.timeout_secs = n;
        }
        if let Some(n) = decode::uint32(decode::aliased(map, "maxErrors", "max_errors")) {
            cfg.max_errors = n;
        }
        if let Some(b) = decode::boolean(decode::aliased(map, "logStatusChange", "log_status_change"))
        {
            cfg.log_status_change = b;
        }
        cfg.name = decode::string(map.get("name"));
        cfg
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// The breaker configuration of one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BreakerConfig {
    /// No usable configuration; the backend is not guarded.
    #[default]
    Disabled,
    Consecutive(ConsecutiveConfig),
    Interval(IntervalConfig),
}

impl BreakerConfig {
    /// Picks the configuration for a backend.
    ///
    /// The count-threshold namespace is checked first. If it decodes to the
    /// zero configuration the interval namespace is tried, and if that is
    /// zero as well the breaker is disabled.
    pub fn from_extra(extra: &ExtraConfig) -> Self {
        let consecutive = ConsecutiveConfig::from_extra(extra);
        if !consecutive.is_zero() {
            return BreakerConfig::Consecutive(consecutive);
        }
        let interval = IntervalConfig::from_extra(extra);
        if !interval.is_zero() {
            return BreakerConfig::Interval(interval);
        }
        BreakerConfig::Disabled
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, BreakerConfig::Disabled)
    }
}

impl From<ConsecutiveConfig> for BreakerConfig {
    fn from(cfg: ConsecutiveConfig) -> Self {
        if cfg.is_zero() {
            BreakerConfig::Disabled
        } else {
            BreakerConfig::Consecutive(cfg)
        }
    }
}

impl From<IntervalConfig> for BreakerConfig {
    fn from(cfg: IntervalConfig) -> Self {
        if cfg.is_zero() {
            BreakerConfig::Disabled
        } else {
            BreakerConfig::Interval(cfg)
        }
    }
}

fn serialize_duration<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*d))
}
