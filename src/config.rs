use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::bins::DEFAULT_BIN_WIDTH;
use crate::directive::{ACCESSION_PLACEHOLDER, DEFAULT_URL_TEMPLATE};
use crate::domain::{OrganismKind, TaxId};
use crate::error::CuratorError;
use crate::reconcile::{DEFAULT_BACKOFF_MS, DEFAULT_MAX_ROUNDS, RetryPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "gbcur.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub taxon_ids: Vec<TaxonEntry>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub refseq_prefix: Option<String>,
    #[serde(default)]
    pub include_plasmids: Option<bool>,
    #[serde(default)]
    pub bin_width: Option<u64>,
    #[serde(default)]
    pub keep_bins: Option<bool>,
    #[serde(default)]
    pub extractor: Option<ExtractorKind>,
    #[serde(default)]
    pub fetch: FetchSection,
}

/// Taxon ids may be written as numbers or strings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TaxonEntry {
    Number(u32),
    Text(String),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FetchSection {
    #[serde(default)]
    pub strategy: Option<FetchStrategy>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub url_template: Option<String>,
    /// Absent means the default cap; an explicit `null` means unbounded.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: Option<u32>,
    #[serde(default)]
    pub backoff_ms: Option<u64>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            strategy: None,
            program: None,
            url_template: None,
            max_rounds: default_max_rounds(),
            backoff_ms: None,
        }
    }
}

fn default_max_rounds() -> Option<u32> {
    Some(DEFAULT_MAX_ROUNDS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    #[default]
    Script,
    Http,
}

/// How bin slices are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    #[default]
    File,
    Cut,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub strategy: FetchStrategy,
    pub program: String,
    pub url_template: String,
    pub policy: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub kind: OrganismKind,
    pub taxon_ids: BTreeSet<TaxId>,
    pub data_dir: Option<Utf8PathBuf>,
    pub refseq_prefix: String,
    pub include_plasmids: bool,
    pub bin_width: u64,
    pub keep_bins: bool,
    pub extractor: ExtractorKind,
    pub fetch: FetchSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CuratorError> {
        Self::resolve_config(Self::load(path)?)
    }

    pub fn load(path: Option<&str>) -> Result<Config, CuratorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(CuratorError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CuratorError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| CuratorError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CuratorError> {
        let kind: OrganismKind = config
            .kind
            .as_deref()
            .ok_or_else(|| CuratorError::InvalidConfig("kind is required".to_string()))?
            .parse()?;

        let taxon_ids = config
            .taxon_ids
            .into_iter()
            .map(|entry| match entry {
                TaxonEntry::Number(value) => Ok(TaxId(value)),
                TaxonEntry::Text(value) => value.parse(),
            })
            .collect::<Result<BTreeSet<_>, CuratorError>>()?;
        if taxon_ids.is_empty() {
            return Err(CuratorError::InvalidConfig(
                "at least one taxon id is required".to_string(),
            ));
        }

        let bin_width = config.bin_width.unwrap_or(DEFAULT_BIN_WIDTH);
        if bin_width == 0 {
            return Err(CuratorError::InvalidConfig(
                "bin_width must be positive".to_string(),
            ));
        }

        let refseq_prefix = config.refseq_prefix.unwrap_or_else(|| "N".to_string());
        if refseq_prefix.trim().is_empty() {
            return Err(CuratorError::InvalidConfig(
                "refseq_prefix must not be empty".to_string(),
            ));
        }

        let url_template = config
            .fetch
            .url_template
            .unwrap_or_else(|| DEFAULT_URL_TEMPLATE.to_string());
        if !url_template.contains(ACCESSION_PLACEHOLDER) {
            return Err(CuratorError::InvalidConfig(format!(
                "fetch.url_template must contain {ACCESSION_PLACEHOLDER}"
            )));
        }
        if config.fetch.max_rounds == Some(0) {
            return Err(CuratorError::InvalidConfig(
                "fetch.max_rounds must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            kind,
            taxon_ids,
            data_dir: config.data_dir.map(Utf8PathBuf::from),
            refseq_prefix,
            include_plasmids: config.include_plasmids.unwrap_or(false),
            bin_width,
            keep_bins: config.keep_bins.unwrap_or(false),
            extractor: config.extractor.unwrap_or_default(),
            fetch: FetchSettings {
                strategy: config.fetch.strategy.unwrap_or_default(),
                program: config.fetch.program.unwrap_or_else(|| "wget".to_string()),
                url_template,
                policy: RetryPolicy {
                    max_rounds: config.fetch.max_rounds,
                    backoff: Duration::from_millis(
                        config.fetch.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS),
                    ),
                },
            },
        })
    }
}
