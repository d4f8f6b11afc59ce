//! Host resource profiling used to size batches and worker pools.
//!
//! Every probe is best-effort: a failing probe falls through to the next one
//! or to a fixed default, and detection as a whole never fails.

use serde::Serialize;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

const DEFAULT_CPU_CORES: usize = 2;
const UNLIMITED_MEMORY: u64 = 2048 * 1024 * 1024;
const NEUTRAL_DISK_SCORE: f64 = 0.5;
const DISK_PROBE_PAYLOAD: &str = "test data ";
const DISK_PROBE_REPEAT: usize = 1000;

static PROBE_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceProfile {
    pub cpu_cores: usize,
    pub cpu_score: f64,
    pub memory_available: u64,
    pub memory_score: f64,
    pub disk_io_score: f64,
    /// Built with optimizations (release profile).
    pub optimized_build: bool,
    /// More than one hardware thread is available for true parallelism.
    pub parallel_runtime: bool,
    /// Worker threads can be spawned on this host.
    pub task_support: bool,
}

impl ResourceProfile {
    pub fn combined_score(&self) -> f64 {
        (self.cpu_score + self.memory_score) / 2.0
    }

    pub fn optimal_batch_size(&self) -> usize {
        let combined = self.combined_score();
        if combined >= 0.8 {
            2000
        } else if combined >= 0.5 {
            1000
        } else if combined >= 0.3 {
            500
        } else {
            100
        }
    }

    pub fn optimal_concurrency(&self) -> usize {
        let base = self.cpu_cores.saturating_sub(1).max(1);
        if self.memory_score < 0.3 {
            return (base / 2).max(1);
        }
        base
    }

    pub fn should_use_progressive_scanning(&self) -> bool {
        self.memory_score < 0.4
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceDetector {
    memory_limit: Option<String>,
}

impl ResourceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit memory ceiling (`512M`, `2G`, `-1`, ...) instead of
    /// reading the cgroup limit.
    pub fn with_memory_limit(mut self, limit: Option<String>) -> Self {
        self.memory_limit = limit;
        self
    }

    pub fn detect(&self) -> ResourceProfile {
        let cpu_cores = detect_cpu_cores();
        let memory_available = self.detect_available_memory();
        let profile = ResourceProfile {
            cpu_cores,
            cpu_score: cpu_score(cpu_cores),
            memory_available,
            memory_score: memory_score(memory_available),
            disk_io_score: measure_disk_io_in(&std::env::temp_dir()),
            optimized_build: cfg!(not(debug_assertions)),
            parallel_runtime: std::thread::available_parallelism()
                .map(|n| n.get() > 1)
                .unwrap_or(false),
            task_support: can_spawn_workers(),
        };
        debug!(?profile, "detected resource profile");
        profile
    }

    fn detect_available_memory(&self) -> u64 {
        available_memory(self.memory_limit.as_deref(), cgroup_memory_ceiling)
    }
}

/// Resolve the memory budget: an explicit limit wins, then the container
/// ceiling, then the fixed 2 GiB stand-in for "unlimited".
pub fn available_memory(limit: Option<&str>, ceiling: impl FnOnce() -> Option<u64>) -> u64 {
    match limit.map(str::trim) {
        Some("-1") | Some("max") => UNLIMITED_MEMORY,
        Some(raw) => parse_memory_limit(raw),
        None => ceiling().unwrap_or(UNLIMITED_MEMORY),
    }
}

pub fn cpu_score(cores: usize) -> f64 {
    match cores {
        8.. => 1.0,
        4.. => 0.8,
        2.. => 0.6,
        _ => 0.3,
    }
}

pub fn memory_score(bytes: u64) -> f64 {
    let mib = bytes as f64 / (1024.0 * 1024.0);
    if mib >= 2048.0 {
        1.0
    } else if mib >= 1024.0 {
        0.8
    } else if mib >= 512.0 {
        0.6
    } else if mib >= 256.0 {
        0.4
    } else {
        0.2
    }
}

pub fn disk_score(read_time: Duration) -> f64 {
    let secs = read_time.as_secs_f64();
    if secs < 0.001 {
        1.0
    } else if secs < 0.005 {
        0.8
    } else if secs < 0.01 {
        0.6
    } else {
        0.3
    }
}

/// Parse a memory size with an optional `G`/`M`/`K` suffix.
///
/// Unparseable input yields 0 rather than an error.
pub fn parse_memory_limit(raw: &str) -> u64 {
    let raw = raw.trim();
    let Some(unit) = raw.chars().last() else {
        return 0;
    };
    let multiplier: Option<u64> = match unit.to_ascii_uppercase() {
        'G' => Some(1024 * 1024 * 1024),
        'M' => Some(1024 * 1024),
        'K' => Some(1024),
        _ => None,
    };
    match multiplier {
        Some(m) => leading_int(&raw[..raw.len() - unit.len_utf8()]).saturating_mul(m),
        None => leading_int(raw),
    }
}

fn leading_int(s: &str) -> u64 {
    let digits: String = s
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

pub fn cores_from_hint(hint: Option<&str>) -> Option<usize> {
    hint.and_then(|h| h.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
}

fn detect_cpu_cores() -> usize {
    let hint = std::env::var("NUMBER_OF_PROCESSORS").ok();
    cores_or_default(hint.as_deref(), probe_cores_with_shell)
}

/// The env hint if numeric, else the shell probe, else 2.
pub fn cores_or_default(hint: Option<&str>, probe: impl FnOnce() -> Option<usize>) -> usize {
    cores_from_hint(hint)
        .or_else(probe)
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_CPU_CORES)
}

fn probe_cores_with_shell() -> Option<usize> {
    if cfg!(windows) && !has_valid_shell() {
        return None;
    }
    run_probe("nproc", &[]).or_else(|| run_probe("sysctl", &["-n", "hw.ncpu"]))
}

fn run_probe(program: &str, args: &[&str]) -> Option<usize> {
    let output = Command::new(program)
        .args(args)
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<usize>()
        .ok()
}

fn has_valid_shell() -> bool {
    Command::new("cmd")
        .args(["/C", "echo test"])
        .stderr(Stdio::null())
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim() == "test")
        .unwrap_or(false)
}

fn cgroup_memory_ceiling() -> Option<u64> {
    let mut sys = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
    );
    sys.refresh_memory();
    sys.cgroup_limits()
        .map(|limits| limits.total_memory)
        .filter(|bytes| *bytes > 0)
}

/// Time a small read from a scratch file under `dir`. Any I/O failure
/// scores 0.5.
pub fn measure_disk_io_in(dir: &Path) -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let path = dir.join(format!(
        "discovery_io_test_{}_{}_{}",
        std::process::id(),
        nanos,
        PROBE_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    if std::fs::write(&path, DISK_PROBE_PAYLOAD.repeat(DISK_PROBE_REPEAT)).is_err() {
        return NEUTRAL_DISK_SCORE;
    }

    let start = Instant::now();
    let read = std::fs::read(&path);
    let elapsed = start.elapsed();
    let _ = std::fs::remove_file(&path);

    match read {
        Ok(_) => disk_score(elapsed),
        Err(_) => NEUTRAL_DISK_SCORE,
    }
}

fn can_spawn_workers() -> bool {
    std::thread::Builder::new()
        .name("discovery-probe".to_string())
        .spawn(|| ())
        .map(|handle| handle.join().is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) fn synthetic_profile(cpu_cores: usize, cpu_score: f64, memory_score: f64) -> ResourceProfile {
    ResourceProfile {
        cpu_cores,
        cpu_score,
        memory_available: UNLIMITED_MEMORY,
        memory_score,
        disk_io_score: 1.0,
        optimized_build: false,
        parallel_runtime: cpu_cores > 1,
        task_support: true,
    }
}
