use thiserror::Error;

/// Configuration problems that make a discovery run meaningless.
///
/// These are fatal: they surface immediately instead of being counted and
/// skipped like per-file failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("Interface Names Cannot Be Empty")]
    EmptyInterfaceSet,
    #[error("Interface Name Cannot Be Empty String")]
    EmptyInterfaceName,
}

/// A single source file that could not be turned into a usable syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("syntax error near line {line}")]
    Syntax { line: usize },
    #[error("parser produced no tree")]
    NoTree,
    #[error("failed to load PHP grammar: {0}")]
    Language(String),
}
