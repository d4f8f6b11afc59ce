//! # implementor-discovery
//!
//! Build-time discovery of PHP classes that implement a configured set of
//! interfaces, persisted as one lookup artifact per interface.
//!
//! ## Architecture
//!
//! - **profile**: Host resource detection and the batch/concurrency policies derived from it
//! - **filter**: Fixed directory exclusion globs
//! - **scan**: Scan roots and recursive `.php` enumeration
//! - **parse**: Memory-mapped sources and tree-sitter PHP parsing
//! - **visitor**: Single-pass namespace-aware `implements` matching
//! - **scheduler**: Batched, chunked processing on a rayon pool
//! - **cache**: Artifact writing and loading (`php` / `json`)
//! - **discovery**: Orchestration of a full run
//! - **config** / **cli**: Settings resolution and the command-line surface

pub mod cache;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod parse;
pub mod profile;
pub mod scan;
pub mod scheduler;
pub mod visitor;
