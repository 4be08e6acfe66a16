// src/config/datasets.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATASETS_CONFIG_PATH: &str = "DATASETS_CONFIG_PATH";
pub const ENV_DATA_DIR: &str = "DATA_DIR";
pub const DEFAULT_DATASETS_CONFIG_PATH: &str = "config/datasets.toml";

/// Where and how one dataset is scraped and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetConfig {
    pub ttl_hours: u64,
    pub cache_file: String,
    pub override_file: String,
    pub base_url: String,
    pub first_page_url: String,
    /// Tried in order for pages after the first; `{page}` is substituted.
    pub page_url_templates: Vec<String>,
    pub max_pages: u32,
    pub page_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl DatasetConfig {
    pub fn spaces_default() -> Self {
        Self {
            ttl_hours: 24,
            cache_file: "youth_spaces_cache.json".into(),
            override_file: "youth_spaces_overrides.json".into(),
            base_url: "https://young.busan.go.kr".into(),
            first_page_url: "https://young.busan.go.kr/space/list.nm".into(),
            page_url_templates: vec![
                "https://young.busan.go.kr/space/list.nm?pageIndex={page}".into(),
                "https://young.busan.go.kr/space/list.nm?page={page}".into(),
            ],
            max_pages: 3,
            page_delay_ms: 1000,
            request_timeout_secs: 15,
        }
    }

    pub fn programs_default() -> Self {
        Self {
            ttl_hours: 6,
            cache_file: "youth_programs_cache.json".into(),
            override_file: "youth_programs_overrides.json".into(),
            base_url: "https://young.busan.go.kr".into(),
            first_page_url: "https://young.busan.go.kr/policySupport/act.nm?menuCd=261".into(),
            page_url_templates: vec![
                "https://young.busan.go.kr/policySupport/act.nm?menuCd=261&pageIndex={page}".into(),
                "https://young.busan.go.kr/policySupport/act.nm?menuCd=261&page={page}".into(),
                "https://young.busan.go.kr/policySupport/act.nm?menuCd=261&currentPage={page}"
                    .into(),
            ],
            max_pages: 5,
            page_delay_ms: 1000,
            request_timeout_secs: 15,
        }
    }

    /// Saturates instead of overflowing; `from_toml_str` rejects such values.
    pub fn ttl(&self) -> chrono::Duration {
        checked_ttl(self.ttl_hours).unwrap_or(chrono::Duration::MAX)
    }

    fn validate(&self, section: &str) -> Result<()> {
        if checked_ttl(self.ttl_hours).is_none() {
            bail!(
                "[{section}] ttl_hours = {} is too large to be a duration",
                self.ttl_hours
            );
        }
        Ok(())
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// URLs to try, in order, for a 1-based page number.
    pub fn candidate_urls(&self, page: u32) -> Vec<String> {
        candidate_urls(&self.first_page_url, &self.page_url_templates, page)
    }
}

fn checked_ttl(hours: u64) -> Option<chrono::Duration> {
    i64::try_from(hours).ok().and_then(chrono::Duration::try_hours)
}

pub fn candidate_urls(first_page_url: &str, templates: &[String], page: u32) -> Vec<String> {
    if page <= 1 {
        return vec![first_page_url.to_string()];
    }
    templates
        .iter()
        .map(|t| t.replace("{page}", &page.to_string()))
        .collect()
}

/// A `[spaces]` / `[programs]` TOML section; missing keys keep the
/// dataset's defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetSection {
    ttl_hours: Option<u64>,
    cache_file: Option<String>,
    override_file: Option<String>,
    base_url: Option<String>,
    first_page_url: Option<String>,
    page_url_templates: Option<Vec<String>>,
    max_pages: Option<u32>,
    page_delay_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl DatasetSection {
    fn apply(self, mut base: DatasetConfig) -> DatasetConfig {
        if let Some(v) = self.ttl_hours {
            base.ttl_hours = v;
        }
        if let Some(v) = self.cache_file {
            base.cache_file = v;
        }
        if let Some(v) = self.override_file {
            base.override_file = v;
        }
        if let Some(v) = self.base_url {
            base.base_url = v;
        }
        if let Some(v) = self.first_page_url {
            base.first_page_url = v;
        }
        if let Some(v) = self.page_url_templates {
            base.page_url_templates = v;
        }
        if let Some(v) = self.max_pages {
            base.max_pages = v;
        }
        if let Some(v) = self.page_delay_ms {
            base.page_delay_ms = v;
        }
        if let Some(v) = self.request_timeout_secs {
            base.request_timeout_secs = v;
        }
        base
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetsFile {
    data_dir: Option<PathBuf>,
    #[serde(default)]
    spaces: DatasetSection,
    #[serde(default)]
    programs: DatasetSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetsConfig {
    /// Directory relative cache/override file names resolve against.
    pub data_dir: PathBuf,
    pub spaces: DatasetConfig,
    pub programs: DatasetConfig,
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("instance"),
            spaces: DatasetConfig::spaces_default(),
            programs: DatasetConfig::programs_default(),
        }
    }
}

impl DatasetsConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: DatasetsFile = toml::from_str(s).context("parsing datasets config")?;
        let defaults = Self::default();
        let cfg = Self {
            data_dir: file.data_dir.unwrap_or(defaults.data_dir),
            spaces: file.spaces.apply(defaults.spaces),
            programs: file.programs.apply(defaults.programs),
        };
        cfg.spaces.validate("spaces")?;
        cfg.programs.validate("programs")?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading datasets config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $DATASETS_CONFIG_PATH (must exist when set)
    /// 2) config/datasets.toml
    /// 3) built-in defaults
    ///
    /// `$DATA_DIR` overrides `data_dir` in every case.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_DATASETS_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_DATASETS_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            Self::load_from(&pb)?
        } else {
            let default_path = PathBuf::from(DEFAULT_DATASETS_CONFIG_PATH);
            if default_path.exists() {
                Self::load_from(&default_path)?
            } else {
                Self::default()
            }
        };

        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                cfg.data_dir = PathBuf::from(dir);
            }
        }
        Ok(cfg)
    }

    /// Resolve a configured file name against `data_dir` (absolute paths win).
    pub fn resolve(&self, file: &str) -> PathBuf {
        let p = Path::new(file);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.data_dir.join(p)
        }
    }
}
