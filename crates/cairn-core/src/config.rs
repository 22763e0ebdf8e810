use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::LedgerError;

/// Settings that govern one ledger.
///
/// Loaded from `.cairn/config.toml`, then overlaid with the `config` events
/// recorded in the ledger itself (see [`LedgerConfig::with_overrides`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Call `sync_data` after every append.
    #[serde(default = "default_true")]
    pub durable: bool,
    #[serde(default = "default_max_decompose_depth")]
    pub max_decompose_depth: u32,
    /// Rejections after which a task is reported as an escalation.
    #[serde(default = "default_max_rejections")]
    pub max_rejections: u32,
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            durable: default_true(),
            max_decompose_depth: default_max_decompose_depth(),
            max_rejections: default_max_rejections(),
            validation: ValidationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub strict: bool,
    #[serde(default = "default_min_name_len")]
    pub min_name_len: usize,
    #[serde(default = "default_min_notes_len")]
    pub min_notes_len: usize,
    #[serde(default = "default_min_accept_len")]
    pub min_accept_len: usize,
    #[serde(default = "default_min_description_len")]
    pub min_description_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: default_true(),
            min_name_len: default_min_name_len(),
            min_notes_len: default_min_notes_len(),
            min_accept_len: default_min_accept_len(),
            min_description_len: default_min_description_len(),
        }
    }
}

impl LedgerConfig {
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Apply the ledger's `config` snapshot on top of the file settings.
    ///
    /// Keys may be bare (`strict`) or dotted (`validation.strict`). Values may
    /// be JSON scalars or their string spellings, since `cairn config set`
    /// records whatever the user typed. Unknown keys and unparseable values
    /// are left alone.
    #[must_use]
    pub fn with_overrides(mut self, snapshot: &BTreeMap<String, Value>) -> Self {
        for (key, value) in snapshot {
            match self.apply(key, value) {
                Some(true) => {}
                Some(false) => {
                    tracing::warn!(key = %key, value = %value, "ignoring config value of the wrong type");
                }
                None => tracing::debug!(key = %key, "ignoring unknown config key"),
            }
        }
        self
    }

    /// Check that `key = value` is an override this build understands.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Config`] naming the known keys when `key` is
    /// unknown, or when `value` does not fit the key's type.
    pub fn check_override(key: &str, value: &Value) -> Result<(), LedgerError> {
        match Self::default().apply(key, value) {
            Some(true) => Ok(()),
            Some(false) => Err(LedgerError::Config(format!(
                "config key {key} does not accept {value}"
            ))),
            None => Err(LedgerError::Config(format!(
                "unknown config key {key}; known keys: {}",
                OVERRIDE_KEYS.join(", ")
            ))),
        }
    }

    /// `None` for an unknown key, `Some(false)` for a value of the wrong type.
    fn apply(&mut self, key: &str, value: &Value) -> Option<bool> {
        let applied = match key {
            "lock_timeout_ms" => set(&mut self.lock_timeout_ms, as_u64(value)),
            "durable" => set(&mut self.durable, as_bool(value)),
            "max_decompose_depth" => set(&mut self.max_decompose_depth, as_u32(value)),
            "max_rejections" => set(&mut self.max_rejections, as_u32(value)),
            "strict" | "validation.strict" => set(&mut self.validation.strict, as_bool(value)),
            "min_name_len" | "validation.min_name_len" => {
                set(&mut self.validation.min_name_len, as_usize(value))
            }
            "min_notes_len" | "validation.min_notes_len" => {
                set(&mut self.validation.min_notes_len, as_usize(value))
            }
            "min_accept_len" | "validation.min_accept_len" => {
                set(&mut self.validation.min_accept_len, as_usize(value))
            }
            "min_description_len" | "validation.min_description_len" => {
                set(&mut self.validation.min_description_len, as_usize(value))
            }
            _ => return None,
        };
        Some(applied)
    }
}

/// Keys accepted by `config` events, in their bare spelling.
pub const OVERRIDE_KEYS: &[&str] = &[
    "lock_timeout_ms",
    "durable",
    "max_decompose_depth",
    "max_rejections",
    "strict",
    "min_name_len",
    "min_notes_len",
    "min_accept_len",
    "min_description_len",
];

/// Load `.cairn/config.toml` under `root`, or defaults when it is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(root: &Path) -> Result<LedgerConfig> {
    let path = root.join(".cairn/config.toml");
    if !path.exists() {
        return Ok(LedgerConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<LedgerConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn set<T>(slot: &mut T, value: Option<T>) -> bool {
    value.map(|v| *slot = v).is_some()
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|n| u32::try_from(n).ok())
}

fn as_usize(value: &Value) -> Option<usize> {
    as_u64(value).and_then(|n| usize::try_from(n).ok())
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

const fn default_true() -> bool {
    true
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}

const fn default_max_decompose_depth() -> u32 {
    3
}

const fn default_max_rejections() -> u32 {
    3
}

const fn default_min_name_len() -> usize {
    5
}

const fn default_min_notes_len() -> usize {
    40
}

const fn default_min_accept_len() -> usize {
    10
}

const fn default_min_description_len() -> usize {
    10
}
