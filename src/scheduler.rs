//! Batch scheduling of the parse + match pipeline.
//!
//! Files are processed in consecutive batches sized from the resource
//! profile. Each batch is split into chunks that run as independent units on
//! a rayon pool sized to the profile's concurrency degree; batch N+1 starts
//! only after every unit of batch N has finished.

use anyhow::{Context, Result};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::parse::{SourceFile, SourceParser};
use crate::profile::ResourceProfile;
use crate::scan::CandidateFile;
use crate::visitor::ImplementorFinder;

pub const PROGRESSIVE_FILE_THRESHOLD: usize = 5000;
const RECLAIM_MEMORY_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Concurrent,
    Progressive,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanStats {
    pub mode: ScanMode,
    pub batch_size: usize,
    pub concurrency: usize,
    pub batches: usize,
    pub files: usize,
    /// Files handed to the parser; never more than one per file.
    pub parse_attempts: usize,
    pub parsed: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct Counters {
    parse_attempts: AtomicUsize,
    parsed: AtomicUsize,
    skipped: AtomicUsize,
}

pub fn select_mode(profile: &ResourceProfile, file_count: usize) -> ScanMode {
    if !profile.task_support
        || (profile.should_use_progressive_scanning() && file_count > PROGRESSIVE_FILE_THRESHOLD)
    {
        ScanMode::Progressive
    } else {
        ScanMode::Concurrent
    }
}

pub fn chunk_size(batch_len: usize, concurrency: usize) -> usize {
    (batch_len / concurrency.max(1)).max(1)
}

pub struct BatchScheduler<'a> {
    profile: &'a ResourceProfile,
    concurrency: usize,
    pool: Option<ThreadPool>,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(profile: &'a ResourceProfile) -> Result<Self> {
        let concurrency = profile.optimal_concurrency();
        let pool = if profile.task_support {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(concurrency)
                    .thread_name(|i| format!("discovery-worker-{i}"))
                    .build()
                    .context("Failed to build discovery worker pool")?,
            )
        } else {
            None
        };
        Ok(Self {
            profile,
            concurrency,
            pool,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.profile.optimal_batch_size()
    }

    pub fn process(&self, files: &[CandidateFile], finder: &ImplementorFinder) -> Result<ScanStats> {
        let mode = select_mode(self.profile, files.len());
        let batch_size = self.batch_size();
        let reclaim_each_batch = mode == ScanMode::Progressive
            || self.profile.memory_score < RECLAIM_MEMORY_SCORE;

        if mode == ScanMode::Progressive {
            info!(batch_size, "Using progressive scanning mode");
        }

        let counters = Counters::default();
        let mut batches = 0usize;
        for batch in files.chunks(batch_size) {
            self.process_batch(batch, finder, &counters)?;
            batches += 1;
            debug!(batch = batches, files = batch.len(), "batch complete");

            if reclaim_each_batch {
                finder.reclaim();
            }
        }

        Ok(ScanStats {
            mode,
            batch_size,
            concurrency: self.concurrency,
            batches,
            files: files.len(),
            parse_attempts: counters.parse_attempts.load(Ordering::Relaxed),
            parsed: counters.parsed.load(Ordering::Relaxed),
            skipped: counters.skipped.load(Ordering::Relaxed),
        })
    }

    fn process_batch(
        &self,
        batch: &[CandidateFile],
        finder: &ImplementorFinder,
        counters: &Counters,
    ) -> Result<()> {
        let size = chunk_size(batch.len(), self.concurrency);
        let run_chunk = |chunk: &[CandidateFile]| -> Result<()> {
            let mut parser = SourceParser::new()?;
            for file in chunk {
                process_file(&mut parser, finder, file, counters)?;
            }
            Ok(())
        };

        match self.pool.as_ref() {
            Some(pool) => pool.install(|| batch.par_chunks(size).try_for_each(run_chunk)),
            None => batch.chunks(size).try_for_each(run_chunk),
        }
    }
}

fn process_file(
    parser: &mut SourceParser,
    finder: &ImplementorFinder,
    file: &CandidateFile,
    counters: &Counters,
) -> Result<()> {
    let source = match SourceFile::open(&file.path) {
        Ok(Some(source)) => source,
        Ok(None) => {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(file = %file.normalized, "skipping empty file");
            return Ok(());
        }
        Err(e) => {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(file = %file.normalized, error = %e, "skipping unreadable file");
            return Ok(());
        }
    };

    counters.parse_attempts.fetch_add(1, Ordering::Relaxed);
    let tree = match parser.parse(source.bytes()) {
        Ok(tree) => tree,
        Err(failure) => {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(file = %file.normalized, error = %failure, "skipping file with parse errors");
            return Ok(());
        }
    };
    counters.parsed.fetch_add(1, Ordering::Relaxed);

    if tree.is_empty() {
        return Ok(());
    }
    finder.visit(&tree)?;
    Ok(())
}
