//! End-to-end discovery run: enumerate, schedule, match, persist.

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::cache::ArtifactCache;
use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::filter::PathFilter;
use crate::scan::{DirectoryCollector, scan_roots};
use crate::scheduler::{BatchScheduler, ScanStats};
use crate::visitor::{ImplementorFinder, ImplementorIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    NoInterfaces,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceSummary {
    pub interface: String,
    pub implementors: usize,
    pub artifact: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub status: RunStatus,
    pub roots: Vec<String>,
    pub files_found: usize,
    pub interfaces: Vec<InterfaceSummary>,
    pub stats: Option<ScanStats>,
    pub cache_path: String,
    pub duration_ms: u64,
}

impl DiscoveryReport {
    fn no_interfaces(config: &DiscoveryConfig, start: Instant) -> Self {
        Self {
            status: RunStatus::NoInterfaces,
            roots: Vec::new(),
            files_found: 0,
            interfaces: Vec::new(),
            stats: None,
            cache_path: config.cache_path.to_string_lossy().to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub fn total_implementors(&self) -> usize {
        self.interfaces.iter().map(|i| i.implementors).sum()
    }
}

pub struct DiscoveryService<'a> {
    config: &'a DiscoveryConfig,
}

impl<'a> DiscoveryService<'a> {
    pub fn new(config: &'a DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Scan every configured root once and write one artifact per interface.
    ///
    /// An empty interface set is a no-op: nothing is enumerated and no
    /// artifacts are written.
    pub fn discover_all(&self) -> Result<DiscoveryReport> {
        let start = Instant::now();
        let interfaces = self.config.interfaces.as_slice();

        if interfaces.is_empty() {
            warn!("No interfaces configured, skipping discovery");
            return Ok(DiscoveryReport::no_interfaces(self.config, start));
        }
        if interfaces.iter().any(String::is_empty) {
            return Err(DiscoveryError::EmptyInterfaceName.into());
        }

        let profile = self.config.resource_profile();
        info!(
            cores = profile.cpu_cores,
            cpu_score = profile.cpu_score,
            memory_score = profile.memory_score,
            disk_io_score = profile.disk_io_score,
            "Resource profile"
        );

        let roots = scan_roots(self.config);
        let collector = DirectoryCollector::new(&self.config.base_path, PathFilter::new()?);
        let files = collector.collect(&roots)?;
        info!(files = files.len(), roots = roots.len(), "Collected candidate files");

        let finder = ImplementorFinder::new(interfaces);
        let stats = if files.is_empty() {
            warn!("No source files found, writing empty artifacts");
            None
        } else {
            let scheduler = BatchScheduler::new(profile)?;
            Some(scheduler.process(&files, &finder)?)
        };
        let index = finder.into_index();

        let cache = ArtifactCache::new(&self.config.cache_path, self.config.artifact_format);
        let artifacts = cache.write_all(interfaces, &index)?;

        let report = DiscoveryReport {
            status: RunStatus::Completed,
            roots: roots.iter().map(|r| r.to_string_lossy().to_string()).collect(),
            files_found: files.len(),
            interfaces: summarize(interfaces, &index, artifacts),
            stats,
            cache_path: self.config.cache_path.to_string_lossy().to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            interfaces = report.interfaces.len(),
            implementors = report.total_implementors(),
            duration_ms = report.duration_ms,
            "Discovery complete"
        );
        Ok(report)
    }
}

fn summarize(
    interfaces: &[String],
    index: &ImplementorIndex,
    artifacts: Vec<PathBuf>,
) -> Vec<InterfaceSummary> {
    interfaces
        .iter()
        .zip(artifacts)
        .map(|(interface, artifact)| InterfaceSummary {
            interface: interface.clone(),
            implementors: index.implementors(interface).len(),
            artifact: artifact.to_string_lossy().to_string(),
        })
        .collect()
}
