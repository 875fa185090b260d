//! Persisted configuration (`telsuit-config.json`).
//!
//! Single-writer discipline: the interactive shell owns persistence. The
//! pipeline and the sweeps read a snapshot at startup and never write back.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{compose::CallToAction, pipeline::PipelineSettings, Error, Result};

pub const CONFIG_FILE: &str = "telsuit-config.json";

/// MTProto credentials for one admin account, keyed by phone number in the
/// config file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminCredentials {
    pub api_id: i32,
    pub api_hash: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanerConfig {
    /// Keyword trial order for SKU extraction; first match wins.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Pacing knobs; the defaults match what the platform tolerates.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacingConfig {
    #[serde(default = "default_inter_task_ms")]
    pub inter_task_ms: u64,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
    #[serde(default = "default_probe_limit")]
    pub probe_limit: usize,
}

fn default_inter_task_ms() -> u64 {
    2000
}

fn default_batch_pause_ms() -> u64 {
    400
}

fn default_scan_limit() -> usize {
    crate::dedup::DEFAULT_SCAN_LIMIT
}

fn default_probe_limit() -> usize {
    crate::dedup::DEFAULT_PROBE_LIMIT
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            inter_task_ms: default_inter_task_ms(),
            batch_pause_ms: default_batch_pause_ms(),
            scan_limit: default_scan_limit(),
            probe_limit: default_probe_limit(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Admin accounts, keyed by phone number.
    #[serde(default)]
    pub admins: BTreeMap<String, AdminCredentials>,
    /// Channels to monitor (usernames, with or without a leading '@').
    #[serde(default)]
    pub channels: Vec<String>,
    /// Emoji literal → custom-glyph document id.
    #[serde(default)]
    pub glyphs: HashMap<String, i64>,
    #[serde(default)]
    pub cleaner: CleanerConfig,
    #[serde(default)]
    pub call_to_action: Option<CallToAction>,
    #[serde(default)]
    pub pacing: PacingConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Missing file yields the default schema, like a first run.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let pretty = serde_json::to_string_pretty(self)?;
        fs::write(path, pretty)?;
        Ok(())
    }

    /// Snapshot of the knobs the enhancement worker needs.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            glyphs: self.glyphs.clone(),
            keywords: self.cleaner.keywords.clone(),
            call_to_action: self.call_to_action.clone(),
            inter_task_delay: Duration::from_millis(self.pacing.inter_task_ms),
            probe_limit: self.pacing.probe_limit,
            batch_pause: Duration::from_millis(self.pacing.batch_pause_ms),
        }
    }

    /// Append keywords from a comma-separated line, then normalize.
    pub fn add_keywords(&mut self, raw: &str) {
        let mut keywords = self.cleaner.keywords.clone();
        keywords.extend(raw.split(',').map(|s| s.trim().to_string()));
        self.set_keywords(keywords);
    }

    /// Trim, drop empties, and deduplicate case-insensitively. The first
    /// spelling of a keyword wins; list order is preserved (it is the SKU
    /// extraction priority).
    pub fn set_keywords(&mut self, keywords: impl IntoIterator<Item = String>) {
        let mut normalized = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for keyword in keywords {
            let keyword = keyword.trim().to_string();
            if keyword.is_empty() {
                continue;
            }
            if seen.insert(keyword.to_lowercase()) {
                normalized.push(keyword);
            }
        }
        self.cleaner.keywords = normalized;
    }

    pub fn remove_keyword(&mut self, index: usize) -> Option<String> {
        if index < self.cleaner.keywords.len() {
            Some(self.cleaner.keywords.remove(index))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tmp_path(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis();
        PathBuf::from(format!("/tmp/{prefix}-{}-{ts}.json", std::process::id()))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load_from(Path::new("/tmp/definitely-not-there.json")).unwrap();
        assert!(cfg.admins.is_empty());
        assert!(cfg.channels.is_empty());
        assert_eq!(cfg.pacing.inter_task_ms, 2000);
    }

    #[test]
    fn round_trips_through_disk() {
        let path = tmp_path("telsuit-config-test");

        let mut cfg = Config::default();
        cfg.channels.push("@shop".to_string());
        cfg.glyphs.insert("🔥".to_string(), 5368);
        cfg.add_keywords("شناسه محصول, SKU");
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.channels, vec!["@shop".to_string()]);
        assert_eq!(loaded.glyphs.get("🔥"), Some(&5368));
        assert_eq!(
            loaded.cleaner.keywords,
            vec!["شناسه محصول".to_string(), "SKU".to_string()]
        );

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn keywords_deduplicate_case_insensitively() {
        let mut cfg = Config::default();
        cfg.add_keywords(" SKU , sku, Code,  , code ");
        assert_eq!(
            cfg.cleaner.keywords,
            vec!["SKU".to_string(), "Code".to_string()]
        );
    }

    #[test]
    fn remove_keyword_by_index() {
        let mut cfg = Config::default();
        cfg.add_keywords("a, b");
        assert_eq!(cfg.remove_keyword(0).as_deref(), Some("a"));
        assert_eq!(cfg.cleaner.keywords, vec!["b".to_string()]);
        assert_eq!(cfg.remove_keyword(5), None);
    }

    #[test]
    fn malformed_json_names_the_file() {
        let path = tmp_path("telsuit-config-bad");
        fs::write(&path, "{not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("telsuit-config-bad"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let path = tmp_path("telsuit-config-partial");
        fs::write(&path, r#"{"channels": ["@x"]}"#).unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.channels, vec!["@x".to_string()]);
        assert_eq!(cfg.pacing.batch_pause_ms, 400);
        assert!(cfg.call_to_action.is_none());

        let _ = fs::remove_file(&path);
    }
}
