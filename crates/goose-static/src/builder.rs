//! Static site builder.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::assets::{copy_dir_contents, is_hidden};
use crate::templates::{compose_layout, PageData, TemplateEngine};

/// Extensions recognised for layout fragments and pages.
const TEMPLATE_EXTENSIONS: &[&str] = &["html", "gohtml"];

/// Leaf name of every generated page.
const INDEX_HTML: &str = "index.html";

/// Configuration for building a static site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Content pages, mirroring the output URL structure
    pub pages_dir: PathBuf,

    /// Assets copied verbatim (optional)
    pub static_dir: PathBuf,

    /// Layout fragments composed into the `base` template
    pub templates_dir: PathBuf,

    /// Output directory, removed and regenerated on every build
    pub output_dir: PathBuf,
}

impl BuildConfig {
    /// Conventional layout: `pages/`, `static/` and `templates/` under `source`.
    pub fn from_source(source: impl AsRef<Path>, output_dir: impl Into<PathBuf>) -> Self {
        let source = source.as_ref();
        Self {
            pages_dir: source.join("pages"),
            static_dir: source.join("static"),
            templates_dir: source.join("templates"),
            output_dir: output_dir.into(),
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildReport {
    /// Number of pages generated
    pub pages: usize,

    /// Number of static files copied
    pub static_files: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error(
        "Error removing destination directory: {0}. Try removing it manually and try again."
    )]
    CleanDestination(PathBuf),

    #[error("Failed to render template {name}: {source}")]
    Template {
        name: String,
        source: minijinja::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to copy static content: {0}")]
    CopyStatic(io::Error),
}

/// A template source file read from disk.
#[derive(Debug)]
struct SourceFile {
    /// Path relative to the directory it was discovered in
    relative_path: PathBuf,

    /// File contents
    contents: String,
}

/// A page ready to be rendered.
#[derive(Debug)]
struct PageInfo {
    /// Template name, the page's relative path with `/` separators
    name: String,

    /// Output file
    output_path: PathBuf,

    /// Render context
    data: PageData,
}

/// Static site builder.
pub struct StaticBuilder {
    config: BuildConfig,
}

impl StaticBuilder {
    /// Create a new static builder.
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Regenerate the whole output directory.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        tracing::info!("Generating site at `{}`...", self.config.output_dir.display());

        let fragments = read_template_files(&self.config.templates_dir)?;
        let sources = read_template_files(&self.config.pages_dir)?;

        let layout = compose_layout(fragments.iter().map(|f| f.contents.as_str()));
        let mut engine = TemplateEngine::new(layout).map_err(|source| BuildError::Template {
            name: self.config.templates_dir.display().to_string(),
            source,
        })?;

        let mut pages = Vec::with_capacity(sources.len());
        for source in &sources {
            let page = self.page_info(&source.relative_path);
            engine
                .add_page(&page.name, &source.contents)
                .map_err(|source| BuildError::Template {
                    name: page.name.clone(),
                    source,
                })?;
            pages.push(page);
        }

        // Render everything before touching the output tree.
        let rendered: Vec<(&PageInfo, String)> = pages
            .par_iter()
            .map(|page| {
                engine
                    .render_page(&page.name, &page.data)
                    .map(|html| (page, html))
                    .map_err(|source| BuildError::Template {
                        name: page.name.clone(),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;

        self.clean_output()?;

        for (page, html) in &rendered {
            write_page(&page.output_path, html)?;
        }

        let static_files = self.copy_static()?;

        let report = BuildReport {
            pages: rendered.len(),
            static_files,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        };
        tracing::info!("Site generated!");

        Ok(report)
    }

    /// Remove the previous output; a missing directory is fine.
    fn clean_output(&self) -> Result<(), BuildError> {
        match fs::remove_dir_all(&self.config.output_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::debug!("remove_dir_all failed: {}", e);
                Err(BuildError::CleanDestination(self.config.output_dir.clone()))
            }
        }
    }

    /// Copy `static/` into the output, if present.
    fn copy_static(&self) -> Result<usize, BuildError> {
        if !self.config.static_dir.exists() {
            return Ok(0);
        }

        tracing::info!("Copying static content...");
        copy_dir_contents(&self.config.static_dir, &self.config.output_dir)
            .map_err(BuildError::CopyStatic)
    }

    /// Work out where a page is written and how it is addressed.
    fn page_info(&self, relative: &Path) -> PageInfo {
        let url_dir = page_url_dir(relative);

        let mut output_path = self.config.output_dir.clone();
        output_path.extend(&url_dir);
        output_path.push(INDEX_HTML);

        PageInfo {
            name: path_to_slashes(relative.components()),
            output_path,
            data: PageData {
                this_page: format!("/{}", url_dir.join("/")),
            },
        }
    }
}

/// Rebuild the site described by `config`.
pub fn rebuild_site(config: &BuildConfig) -> Result<BuildReport, BuildError> {
    StaticBuilder::new(config.clone()).build()
}

/// Output directory segments for a page, relative to the output root.
///
/// `index.html` maps to the directory that contains it, any other page to a
/// directory named after the file without its extension:
///
/// - `index.html` → `[]`
/// - `about/index.html` → `["about"]`
/// - `about/nested.html` → `["about", "nested"]`
fn page_url_dir(relative: &Path) -> Vec<String> {
    let mut segments: Vec<String> = relative
        .parent()
        .map(|p| {
            p.components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let is_index = relative.file_name().and_then(|n| n.to_str()) == Some(INDEX_HTML);
    if !is_index {
        if let Some(stem) = relative.file_stem() {
            segments.push(stem.to_string_lossy().into_owned());
        }
    }

    segments
}

fn path_to_slashes<'a>(components: impl Iterator<Item = Component<'a>>) -> String {
    components
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read every `.html`/`.gohtml` file under `dir`, in path order.
fn read_template_files(dir: &Path) -> Result<Vec<SourceFile>, BuildError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|e| BuildError::Read {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !TEMPLATE_EXTENSIONS.contains(&ext) {
            continue;
        }

        let contents = fs::read_to_string(path).map_err(|source| BuildError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        files.push(SourceFile {
            relative_path: path.strip_prefix(dir).unwrap_or(path).to_path_buf(),
            contents,
        });
    }

    Ok(files)
}

fn write_page(path: &Path, html: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| BuildError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, html).map_err(|source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    })
}
