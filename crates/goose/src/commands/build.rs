//! One-shot site build.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use goose_static::{rebuild_site, BuildConfig};

/// Build the site from `source` into `destination`.
///
/// Returns the build configuration so serve mode can rebuild with it.
pub fn run(source: &Path, destination: PathBuf) -> Result<BuildConfig> {
    let config = BuildConfig::from_source(source, destination);

    let report = rebuild_site(&config)
        .with_context(|| format!("Failed to build site from {}", source.display()))?;

    tracing::info!(
        "Built {} pages and copied {} static files in {}ms",
        report.pages,
        report.static_files,
        report.duration_ms
    );
    tracing::info!("Output: {}", report.output_dir.display());

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn builds_into_destination() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("site");
        fs::create_dir_all(source.join("templates")).unwrap();
        fs::create_dir_all(source.join("pages")).unwrap();
        fs::write(
            source.join("templates/base.html"),
            "<body>{% block content %}{% endblock %}</body>",
        )
        .unwrap();
        fs::write(source.join("pages/index.html"), "{% block content %}hi{% endblock %}").unwrap();

        let destination = temp.path().join("public");
        let config = run(&source, destination.clone()).unwrap();

        assert_eq!(config.output_dir, destination);
        assert_eq!(
            fs::read_to_string(destination.join("index.html")).unwrap(),
            "<body>hi</body>"
        );
    }

    #[test]
    fn reports_missing_source() {
        let temp = tempdir().unwrap();

        let err = run(&temp.path().join("missing"), temp.path().join("dist")).unwrap_err();

        assert!(err.to_string().contains("Failed to build site"));
    }
}
