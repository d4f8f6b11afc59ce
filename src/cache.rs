//! Per-interface lookup artifacts.
//!
//! Each configured interface gets one file under the cache directory named
//! after the interface's short name. The default `php` format is the literal
//! array the host runtime `require`s; `json` is a plain string array.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::visitor::ImplementorIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Php,
    Json,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Php => "php",
            ArtifactFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
    format: ArtifactFormat,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>, format: ArtifactFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn artifact_path(&self, interface: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", short_name(interface), self.format.extension()))
    }

    /// Write one artifact per interface, including interfaces with no
    /// implementors. Existing artifacts are overwritten.
    pub fn write_all(&self, interfaces: &[String], index: &ImplementorIndex) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;

        interfaces
            .iter()
            .map(|interface| self.write(interface, index.implementors(interface)))
            .collect()
    }

    pub fn write(&self, interface: &str, classes: &[String]) -> Result<PathBuf> {
        let path = self.artifact_path(interface);
        let content = match self.format {
            ArtifactFormat::Php => render_php(classes),
            ArtifactFormat::Json => format!("{}\n", serde_json::to_string_pretty(classes)?),
        };
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
        Ok(path)
    }

    /// Read back the implementors recorded for `interface`.
    pub fn load(&self, interface: &str) -> Result<Vec<String>> {
        let path = self.artifact_path(interface);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact: {}", path.display()))?;
        match self.format {
            ArtifactFormat::Php => parse_php(&raw)
                .with_context(|| format!("Malformed artifact: {}", path.display())),
            ArtifactFormat::Json => serde_json::from_str(&raw)
                .with_context(|| format!("Malformed artifact: {}", path.display())),
        }
    }
}

pub fn short_name(interface: &str) -> &str {
    interface.rsplit('\\').next().unwrap_or(interface)
}

fn render_php(classes: &[String]) -> String {
    let mut out = String::from("<?php\n\nreturn array (\n");
    for (i, class) in classes.iter().enumerate() {
        out.push_str(&format!("  {i} => '{}',\n", escape_php(class)));
    }
    out.push_str(");\n");
    out
}

fn escape_php(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn parse_php(raw: &str) -> Result<Vec<String>> {
    let body = raw
        .split_once("array (")
        .map(|(_, rest)| rest)
        .context("missing array literal")?;

    let mut classes = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(')') {
            continue;
        }
        let Some((_, value)) = line.split_once("=>") else {
            bail!("unexpected line: {line}");
        };
        let quoted = value.trim().trim_end_matches(',');
        let inner = quoted
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .with_context(|| format!("unquoted value: {quoted}"))?;
        classes.push(unescape_php(inner));
    }
    Ok(classes)
}

fn unescape_php(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\\' | '\'')) => out.push(next),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "discovery_cache_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    #[test]
    fn php_artifact_matches_var_export_layout() -> Result<()> {
        let dir = temp_dir("php_layout");
        let cache = ArtifactCache::new(&dir, ArtifactFormat::Php);
        std::fs::create_dir_all(&dir)?;
        let path = cache.write("Handler", &["App\\Foo".to_string(), "\\Bar".to_string()])?;

        assert_eq!(path, dir.join("Handler.php"));
        assert_eq!(
            std::fs::read_to_string(&path)?,
            "<?php\n\nreturn array (\n  0 => 'App\\\\Foo',\n  1 => '\\\\Bar',\n);\n"
        );
        assert_eq!(cache.load("Handler")?, vec!["App\\Foo", "\\Bar"]);

        let _ = std::fs::remove_dir_all(dir);
        Ok(())
    }

    #[test]
    fn empty_list_still_produces_artifact() -> Result<()> {
        let dir = temp_dir("empty");
        let cache = ArtifactCache::new(&dir, ArtifactFormat::Php);
        let written = cache.write_all(&["Unused".to_string()], &ImplementorIndex::default())?;

        assert_eq!(written, vec![dir.join("Unused.php")]);
        assert_eq!(
            std::fs::read_to_string(&written[0])?,
            "<?php\n\nreturn array (\n);\n"
        );
        assert!(cache.load("Unused")?.is_empty());

        let _ = std::fs::remove_dir_all(dir);
        Ok(())
    }

    #[test]
    fn json_artifact_uses_short_interface_name() -> Result<()> {
        let dir = temp_dir("json");
        let cache = ArtifactCache::new(&dir, ArtifactFormat::Json);
        std::fs::create_dir_all(&dir)?;
        let path = cache.write("Vendor\\Pkg\\Listener", &["App\\L".to_string()])?;

        assert_eq!(path, dir.join("Listener.json"));
        assert_eq!(cache.load("Listener")?, vec!["App\\L"]);

        let _ = std::fs::remove_dir_all(dir);
        Ok(())
    }

    #[test]
    fn unwritable_cache_dir_is_fatal() -> Result<()> {
        let dir = temp_dir("blocked");
        std::fs::create_dir_all(&dir)?;
        let blocker = dir.join("file");
        std::fs::write(&blocker, "x")?;

        let cache = ArtifactCache::new(blocker.join("cache"), ArtifactFormat::Php);
        let err = cache
            .write_all(&["Handler".to_string()], &ImplementorIndex::default())
            .unwrap_err();
        assert!(err.to_string().contains("Failed to create cache directory"));

        let _ = std::fs::remove_dir_all(dir);
        Ok(())
    }

    #[test]
    fn unescape_round_trips_quotes() {
        let raw = "weird'name\\Cls";
        assert_eq!(unescape_php(&escape_php(raw)), raw);
    }
}
