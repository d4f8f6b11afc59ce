use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Directories that never hold discoverable classes.
pub const EXCLUDED_DIR_PATTERNS: &[&str] = &[
    "*/tests/*",
    "*/test/*",
    "*/Test/*",
    "*/Tests/*",
    "*/docs/*",
    "*/doc/*",
    "*/documentation/*",
    "*/examples/*",
    "*/example/*",
    "*/fixtures/*",
    "*/stubs/*",
    "*/stub/*",
    "*/resources/views/*",
    "*/resources/lang/*",
    "*/resources/css/*",
    "*/resources/js/*",
    "*/public/*",
    "*/storage/*",
    "*/node_modules/*",
    "*/assets/*",
    "*/build/*",
    "*/dist/*",
    "*/vendor/bin/*",
    "*/database/migrations/*",
    "*/database/seeds/*",
    "*/database/factories/*",
];

/// Path-aware exclusion matcher over normalized (`/`-separated) paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    excluded: GlobSet,
}

impl PathFilter {
    pub fn new() -> Result<Self> {
        Self::with_patterns(EXCLUDED_DIR_PATTERNS)
    }

    pub fn with_patterns(patterns: &[&str]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let anchored = anchor_to_segments(pattern);
            let glob = GlobBuilder::new(&anchored)
                .literal_separator(true)
                .build()
                .with_context(|| format!("Invalid exclusion pattern: {pattern}"))?;
            builder.add(glob);
        }
        let excluded = builder
            .build()
            .context("Failed to compile exclusion patterns")?;
        Ok(Self { excluded })
    }

    pub fn is_excluded(&self, normalized_path: &str) -> bool {
        self.excluded.is_match(normalized_path)
    }
}

pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

// `*/tests/*` must match a `tests` segment at any depth, with anything below
// it. Inner wildcards keep their single-segment meaning.
fn anchor_to_segments(pattern: &str) -> String {
    let mut anchored = pattern.to_string();
    if let Some(rest) = anchored.strip_prefix("*/") {
        anchored = format!("**/{rest}");
    }
    if let Some(rest) = anchored.strip_suffix("/*") {
        anchored = format!("{rest}/**");
    }
    anchored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_tests_directories_at_any_depth() -> Result<()> {
        let filter = PathFilter::new()?;
        assert!(filter.is_excluded("app/tests/FooTest.php"));
        assert!(filter.is_excluded("tests/Unit/FooTest.php"));
        assert!(filter.is_excluded("vendor/acme/pkg/Tests/Feature/BarTest.php"));
        assert!(filter.is_excluded("app/database/migrations/2024_create_users.php"));
        assert!(filter.is_excluded("vendor/bin/phpunit.php"));
        Ok(())
    }

    #[test]
    fn keeps_regular_source_files() -> Result<()> {
        let filter = PathFilter::new()?;
        assert!(!filter.is_excluded("app/Models/User.php"));
        assert!(!filter.is_excluded("app/Testing/Helper.php"));
        assert!(!filter.is_excluded("vendor/acme/pkg/src/Contest.php"));
        assert!(!filter.is_excluded("app/database/Connection.php"));
        Ok(())
    }

    #[test]
    fn inner_wildcards_do_not_cross_separators() -> Result<()> {
        let filter = PathFilter::with_patterns(&["*/resources/*/cache/*"])?;
        assert!(filter.is_excluded("app/resources/views/cache/a.php"));
        assert!(!filter.is_excluded("app/resources/views/nested/cache/a.php"));
        Ok(())
    }

    #[test]
    fn normalize_path_uses_forward_slashes() {
        assert_eq!(normalize_path(r"C:\proj\app\tests\A.php"), "C:/proj/app/tests/A.php");
    }
}
