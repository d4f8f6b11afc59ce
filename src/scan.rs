use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::debug;

use crate::config::DiscoveryConfig;
use crate::filter::{PathFilter, normalize_path};

pub const SOURCE_EXTENSION: &str = "php";
const MODULE_DIRS: [&str; 2] = ["app_modules", "app-modules"];
const VENDOR_DIR: &str = "vendor";

/// A source file found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    /// `/`-separated path relative to the project base, used for exclusion
    /// matching.
    pub normalized: String,
}

/// Roots to enumerate, in scan order.
///
/// Searching all vendors adds the vendor root once and suppresses the
/// per-package vendor roots for this run.
pub fn scan_roots(config: &DiscoveryConfig) -> Vec<PathBuf> {
    let base = &config.base_path;
    let mut roots = vec![config.source_path()];

    for dir in MODULE_DIRS {
        let path = base.join(dir);
        if path.is_dir() {
            roots.push(path);
        }
    }

    if config.should_search_all_vendors() {
        roots.push(base.join(VENDOR_DIR));
        return roots;
    }

    if config.should_search_vendors() {
        for vendor in &config.vendors {
            roots.push(base.join(VENDOR_DIR).join(vendor));
        }
    }

    roots
}

pub struct DirectoryCollector {
    base_path: PathBuf,
    filter: PathFilter,
}

impl DirectoryCollector {
    pub fn new(base_path: impl Into<PathBuf>, filter: PathFilter) -> Self {
        Self {
            base_path: base_path.into(),
            filter,
        }
    }

    pub fn collect(&self, roots: &[PathBuf]) -> Result<Vec<CandidateFile>> {
        let mut files = Vec::new();
        for root in roots {
            if !root.is_dir() {
                debug!(root = %root.display(), "skipping missing scan root");
                continue;
            }
            let mut found = self.collect_root(root);
            debug!(root = %root.display(), files = found.len(), "enumerated scan root");
            found.sort_by(|a, b| a.path.cmp(&b.path));
            files.append(&mut found);
        }
        Ok(files)
    }

    fn collect_root(&self, root: &Path) -> Vec<CandidateFile> {
        let (tx, rx) = mpsc::channel();

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build_parallel();

        walker.run(|| {
            let tx = tx.clone();
            Box::new(move |entry| {
                if let Ok(entry) = entry
                    && entry.file_type().is_some_and(|t| t.is_file())
                    && entry.path().extension().is_some_and(|e| e == SOURCE_EXTENSION)
                {
                    let _ = tx.send(entry.into_path());
                }
                ignore::WalkState::Continue
            })
        });

        drop(tx);
        rx.iter()
            .filter_map(|path| {
                let normalized = self.normalize(&path);
                if self.filter.is_excluded(&normalized) {
                    return None;
                }
                Some(CandidateFile { path, normalized })
            })
            .collect()
    }

    fn normalize(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.base_path).unwrap_or(path);
        normalize_path(&relative.to_string_lossy())
    }
}
