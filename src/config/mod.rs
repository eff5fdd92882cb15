// src/config/mod.rs
//! Static pipeline configuration: allow-lists, keyword sets, currency markers
//! and dedup tuning. Loaded once at startup; never hot-reloaded.
//!
//! Lookup order for [`PipelineConfig::load_default`]:
//! 1) `$PIPELINE_CONFIG_PATH` (must exist)
//! 2) `config/pipeline.toml`
//! 3) `config/pipeline.json`
//! 4) compiled-in defaults
//!
//! `DEDUP_WINDOW_SECS` / `DEDUP_CAPACITY` override the file values.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const ENV_DEDUP_WINDOW_SECS: &str = "DEDUP_WINDOW_SECS";
pub const ENV_DEDUP_CAPACITY: &str = "DEDUP_CAPACITY";

pub const DEFAULT_CONFIG_TOML: &str = "config/pipeline.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/pipeline.json";

/// Upper bound for `dedup.window_secs` (one day).
pub const MAX_DEDUP_WINDOW_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A payment app recognised by package identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub package: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// An SMS sender token (matched as a case-insensitive substring).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderEntry {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A literal currency marker and the canonical code it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyMarker {
    pub marker: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionKeywords {
    pub credit: Vec<String>,
    pub debit: Vec<String>,
}

impl Default for DirectionKeywords {
    fn default() -> Self {
        Self {
            credit: strings(&["credited", "received"]),
            debit: strings(&["paid", "debited"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    pub window_secs: u64,
    pub capacity: usize,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub apps: Vec<AppEntry>,
    /// Optional narrower list for the accessibility channel. `None` shares `apps`.
    pub accessibility_apps: Option<Vec<String>>,
    pub senders: Vec<SenderEntry>,
    pub keywords: Vec<String>,
    pub currency_markers: Vec<CurrencyMarker>,
    pub direction: DirectionKeywords,
    /// Max whitespace tokens allowed between a currency marker and its number.
    pub amount_token_window: usize,
    pub dedup: DedupSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            apps: vec![
                app("com.google.android.apps.nbu.paisa.user", "Google Pay"),
                app("com.phonepe.app", "PhonePe"),
                app("net.one97.paytm", "Paytm"),
                app("in.org.npci.upiapp", "BHIM UPI"),
                app("in.amazon.mShop.android.shopping", "Amazon Pay"),
                app("com.amazon.mShop.android.shopping", "Amazon Pay"),
                app("com.mobikwik_new", "MobiKwik"),
                app("com.freecharge.android", "FreeCharge"),
                app("com.axis.mobile", "Axis Mobile"),
                app("com.sbi.upi", "SBI Pay"),
                app("com.icicibank.pockets", "ICICI Pockets"),
            ],
            accessibility_apps: None,
            senders: vec![
                sender("GPAY", "Google Pay"),
                sender("GOOGLEPAY", "Google Pay"),
                sender("PHONEPE", "PhonePe"),
                sender("PAYTM", "Paytm"),
                sender("BHIMUPI", "BHIM UPI"),
                sender("AMAZONPAY", "Amazon Pay"),
                sender("MOBIKWIK", "MobiKwik"),
                sender("FREECHARGE", "FreeCharge"),
                sender("AXISBANK", "Axis Bank"),
                sender("SBIUPI", "SBI Pay"),
                sender("ICICIBANK", "ICICI Bank"),
                sender("HDFCBANK", "HDFC Bank"),
            ],
            keywords: strings(&[
                "credited",
                "received",
                "paid",
                "upi",
                "transaction",
                "amount",
            ]),
            currency_markers: vec![
                marker("₹", "INR"),
                marker("rs.", "INR"),
                marker("inr", "INR"),
            ],
            direction: DirectionKeywords::default(),
            amount_token_window: 2,
            dedup: DedupSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Load using env var + fallbacks (see module docs), then apply env overrides.
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut cfg = match resolve_path()? {
            Some(path) => Self::load_from(&path)?,
            None => {
                tracing::info!(target: "config", "no pipeline config file, using defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.sanitize()?;
        Ok(cfg)
    }

    /// Load from an explicit path. `.json` is parsed as JSON, anything else as TOML.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = if ext == "json" {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        tracing::info!(
            target: "config",
            path = %path.display(),
            apps = cfg.apps.len(),
            senders = cfg.senders.len(),
            "pipeline config loaded"
        );
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut cfg: PipelineConfig = toml::from_str(s)?;
        cfg.sanitize()?;
        Ok(cfg)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let mut cfg: PipelineConfig = serde_json::from_str(s)?;
        cfg.sanitize()?;
        Ok(cfg)
    }

    /// Package identities accepted on the accessibility channel.
    pub fn accessibility_packages(&self) -> Vec<String> {
        match &self.accessibility_apps {
            Some(list) => list.clone(),
            None => self.apps.iter().map(|a| a.package.clone()).collect(),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env::<u64>(ENV_DEDUP_WINDOW_SECS) {
            self.dedup.window_secs = v;
        }
        if let Some(v) = parse_env::<usize>(ENV_DEDUP_CAPACITY) {
            self.dedup.capacity = v;
        }
    }

    /// Trim, drop empties, de-duplicate, clamp numeric knobs.
    fn sanitize(&mut self) -> Result<(), ConfigError> {
        self.apps = dedup_by(
            std::mem::take(&mut self.apps)
                .into_iter()
                .map(|mut a| {
                    a.package = a.package.trim().to_string();
                    a.name = clean_name(a.name);
                    a
                })
                .filter(|a| !a.package.is_empty()),
            |a| a.package.to_ascii_lowercase(),
        );
        self.accessibility_apps = self.accessibility_apps.take().map(clean_list);
        self.senders = dedup_by(
            std::mem::take(&mut self.senders)
                .into_iter()
                .map(|mut s| {
                    s.token = s.token.trim().to_string();
                    s.name = clean_name(s.name);
                    s
                })
                .filter(|s| !s.token.is_empty()),
            |s| s.token.to_lowercase(),
        );
        self.keywords = clean_list(std::mem::take(&mut self.keywords));
        self.direction.credit = clean_list(std::mem::take(&mut self.direction.credit));
        self.direction.debit = clean_list(std::mem::take(&mut self.direction.debit));

        let mut markers = Vec::with_capacity(self.currency_markers.len());
        for m in std::mem::take(&mut self.currency_markers) {
            let marker = m.marker.trim().to_string();
            if marker.is_empty() {
                continue;
            }
            let code = m.code.trim().to_ascii_uppercase();
            if code.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "currency marker `{marker}` has an empty code"
                )));
            }
            markers.push(CurrencyMarker { marker, code });
        }
        self.currency_markers = dedup_by(markers.into_iter(), |m| m.marker.to_lowercase());

        if self.dedup.window_secs > MAX_DEDUP_WINDOW_SECS {
            tracing::warn!(
                target: "config",
                window_secs = self.dedup.window_secs,
                max = MAX_DEDUP_WINDOW_SECS,
                "dedup window too large, clamping"
            );
        }
        self.dedup.window_secs = self.dedup.window_secs.clamp(1, MAX_DEDUP_WINDOW_SECS);
        if self.dedup.capacity == 0 {
            self.dedup.capacity = 1;
        }
        Ok(())
    }
}

fn resolve_path() -> Result<Option<PathBuf>, ConfigError> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(ConfigError::Invalid(format!(
            "{ENV_CONFIG_PATH} points to non-existent path {}",
            pb.display()
        )));
    }
    for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    dedup_by(
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        |s| s.to_lowercase(),
    )
}

/// Keeps first occurrence per key, preserving order.
fn dedup_by<T, K, I, F>(items: I, key: F) -> Vec<T>
where
    I: Iterator<Item = T>,
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items.filter(|it| seen.insert(key(it))).collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn app(package: &str, name: &str) -> AppEntry {
    AppEntry {
        package: package.into(),
        name: Some(name.into()),
    }
}

fn sender(token: &str, name: &str) -> SenderEntry {
    SenderEntry {
        token: token.into(),
        name: Some(name.into()),
    }
}

fn marker(marker: &str, code: &str) -> CurrencyMarker {
    CurrencyMarker {
        marker: marker.into(),
        code: code.into(),
    }
}
