//! Website configuration loading and validation.
//!
//! The crawl configuration file lists the websites to ingest. JSON and YAML
//! are both accepted, selected by file extension, and the parsed document is
//! validated before use: URL patterns must compile, freshness windows must be
//! positive, and the namespaces derived from website names must be unique.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors raised while loading or validating the crawl configuration.
///
/// All of these are fatal at startup; steady-state operation never touches
/// the configuration file again.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file at {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration document.
    #[error("failed to parse {format} config: {source}")]
    Parse {
        format: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Unsupported configuration file extension.
    #[error("unsupported config file format: {path} (must be .json, .yaml, or .yml)")]
    UnsupportedFormat { path: PathBuf },

    /// A URL pattern failed to compile as a regular expression.
    #[error("invalid pattern {pattern:?} for website {website:?}: {source}")]
    InvalidPattern {
        website: String,
        pattern: String,
        source: regex::Error,
    },

    /// A freshness window was zero.
    #[error("website {website:?} has freshness_days of 0 (must be at least 1)")]
    InvalidFreshness { website: String },

    /// Two website names normalize to the same namespace.
    #[error("websites {first:?} and {second:?} derive the same namespace {namespace:?}")]
    DuplicateNamespace {
        first: String,
        second: String,
        namespace: String,
    },
}

/// Derive the vector store namespace for a website name.
///
/// Lowercases and replaces spaces with underscores. Must stay deterministic:
/// the crawl orchestrator and the retrieval tool set both rely on it.
#[must_use]
pub fn derive_namespace(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

fn default_freshness_days() -> u32 {
    7
}

/// Configuration for one website to crawl.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebsiteConfig {
    /// Website name, used for identification and namespace derivation.
    pub name: String,
    /// URL of the website's XML sitemap.
    pub xml_sitemap: Url,
    /// Description of the website's content, surfaced as the retrieval
    /// tool description so the model can route questions.
    pub description: String,
    /// Days before crawled content is considered stale.
    #[serde(default = "default_freshness_days")]
    pub freshness_days: u32,
    /// URL patterns (regex) excluded from crawling.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// URL patterns (regex) exclusively included in crawling, when non-empty.
    #[serde(default)]
    pub include_only_patterns: Vec<String>,
}

impl WebsiteConfig {
    /// The vector store namespace for this website.
    #[must_use]
    pub fn namespace(&self) -> String {
        derive_namespace(&self.name)
    }

    fn compile_patterns(
        &self,
        patterns: &[String],
    ) -> Result<Vec<Regex>, ConfigError> {
        patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    website: self.name.clone(),
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Compiled exclude patterns.
    pub fn exclude_regexes(&self) -> Result<Vec<Regex>, ConfigError> {
        self.compile_patterns(&self.exclude_patterns)
    }

    /// Compiled include-only patterns.
    pub fn include_only_regexes(&self) -> Result<Vec<Regex>, ConfigError> {
        self.compile_patterns(&self.include_only_patterns)
    }
}

/// The full crawl configuration: every website to ingest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Websites to crawl and answer questions about.
    pub websites: Vec<WebsiteConfig>,
}

impl CrawlConfig {
    /// Load and validate a configuration file (JSON or YAML by extension).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                format: "JSON",
                source: Box::new(e),
            })?,
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                    format: "YAML",
                    source: Box::new(e),
                })?
            }
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration without touching the filesystem.
    ///
    /// Checks pattern compilation, freshness windows, and that no two
    /// website names normalize to the same namespace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut owners: Vec<(String, String)> = Vec::new();

        for website in &self.websites {
            if website.freshness_days == 0 {
                return Err(ConfigError::InvalidFreshness {
                    website: website.name.clone(),
                });
            }
            website.exclude_regexes()?;
            website.include_only_regexes()?;

            let namespace = website.namespace();
            if !seen.insert(namespace.clone()) {
                let first = owners
                    .iter()
                    .find(|(ns, _)| *ns == namespace)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_default();
                return Err(ConfigError::DuplicateNamespace {
                    first,
                    second: website.name.clone(),
                    namespace,
                });
            }
            owners.push((namespace, website.name.clone()));
        }

        Ok(())
    }
}
