use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::cache::ArtifactFormat;
use crate::cli::{Cli, RunArgs};
use crate::profile::{ResourceDetector, ResourceProfile};

pub const CONFIG_FILE_NAME: &str = "discovery.json";
pub const CACHE_PATH_ENV: &str = "DISCOVERY_CACHE_PATH";
const DEFAULT_SOURCE_DIR: &str = "app";
const DEFAULT_CACHE_DIR: &str = "bootstrap/cache/discovery";

/// Ordered set of target interface names; re-adding a name keeps its first
/// position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct InterfaceSet {
    names: Vec<String>,
}

impl InterfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.names.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}

impl From<Vec<String>> for InterfaceSet {
    fn from(names: Vec<String>) -> Self {
        let mut set = Self::new();
        for name in names {
            set.insert(name);
        }
        set
    }
}

impl From<InterfaceSet> for Vec<String> {
    fn from(set: InterfaceSet) -> Self {
        set.names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub base_path: PathBuf,
    pub source_dir: PathBuf,
    pub cache_path: PathBuf,
    pub interfaces: InterfaceSet,
    pub vendors: Vec<String>,
    search_vendors: bool,
    search_all_vendors: bool,
    pub memory_limit: Option<String>,
    pub artifact_format: ArtifactFormat,
    #[serde(skip)]
    resource_profile: OnceLock<ResourceProfile>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

impl DiscoveryConfig {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            cache_path: base_path.join(DEFAULT_CACHE_DIR),
            base_path,
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            interfaces: InterfaceSet::new(),
            vendors: Vec::new(),
            search_vendors: false,
            search_all_vendors: false,
            memory_limit: None,
            artifact_format: ArtifactFormat::default(),
            resource_profile: OnceLock::new(),
        }
    }

    /// Load `discovery.json`-style settings. Relative paths in the file are
    /// resolved against `base_path`.
    pub fn load(path: &Path, base_path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.base_path = rebase(base_path, &config.base_path);
        if config.cache_path.is_relative() {
            config.cache_path = rebase(&config.base_path, &config.cache_path);
        }
        Ok(config)
    }

    pub fn add_interface(&mut self, name: impl Into<String>) -> &mut Self {
        self.interfaces.insert(name);
        self
    }

    pub fn add_vendor(&mut self, vendor: impl Into<String>) -> &mut Self {
        self.search_vendors(true);
        self.vendors.push(vendor.into());
        self
    }

    pub fn search_vendors(&mut self, enable: bool) -> &mut Self {
        self.search_vendors = enable;
        self
    }

    pub fn search_all_vendors(&mut self, enable: bool) -> &mut Self {
        self.search_all_vendors = enable;
        self
    }

    pub fn should_search_vendors(&self) -> bool {
        self.search_vendors
    }

    pub fn should_search_all_vendors(&self) -> bool {
        self.search_all_vendors
    }

    pub fn source_path(&self) -> PathBuf {
        self.base_path.join(&self.source_dir)
    }

    /// Pin the profile instead of probing the host on first use.
    pub fn with_resource_profile(mut self, profile: ResourceProfile) -> Self {
        self.resource_profile = OnceLock::from(profile);
        self
    }

    pub fn resource_profile(&self) -> &ResourceProfile {
        self.resource_profile.get_or_init(|| {
            ResourceDetector::new()
                .with_memory_limit(self.memory_limit.clone())
                .detect()
        })
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    base.join(path.strip_prefix(".").unwrap_or(path))
}

pub fn resolve_base_path(cli: &Cli) -> Result<PathBuf> {
    match cli.base.clone() {
        Some(p) => Ok(p),
        None => env::current_dir().context("Failed to resolve current directory"),
    }
}

pub fn resolve_config(cli: &Cli) -> Result<DiscoveryConfig> {
    let base_path = resolve_base_path(cli)?;

    let config_file = cli
        .config
        .clone()
        .unwrap_or_else(|| base_path.join(CONFIG_FILE_NAME));
    let mut config = if config_file.exists() {
        DiscoveryConfig::load(&config_file, &base_path)?
    } else if cli.config.is_some() {
        anyhow::bail!("Config file not found: {}", config_file.display());
    } else {
        DiscoveryConfig::new(base_path)
    };

    if let Ok(p) = env::var(CACHE_PATH_ENV) {
        config.cache_path = PathBuf::from(p);
    }

    if let Some(p) = cli.cache_dir.clone() {
        config.cache_path = p;
    }

    Ok(config)
}

pub fn apply_run_args(config: &mut DiscoveryConfig, args: &RunArgs) {
    for name in &args.interfaces {
        config.add_interface(name.clone());
    }
    for vendor in &args.vendors {
        config.add_vendor(vendor.clone());
    }
    if args.all_vendors {
        config.search_all_vendors(true);
    }
    if let Some(limit) = args.memory_limit.clone() {
        config.memory_limit = Some(limit);
    }
    if let Some(format) = args.artifact_format {
        config.artifact_format = format;
    }
}

pub fn clear_cache(cache_path: &Path) -> Result<()> {
    if cache_path.exists() {
        std::fs::remove_dir_all(cache_path).with_context(|| {
            format!("Failed to remove cache directory: {}", cache_path.display())
        })?;
    }
    Ok(())
}
