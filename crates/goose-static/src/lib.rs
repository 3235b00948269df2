//! Static site builder for goose.
//!
//! Composes the layout fragments under `templates/` into a single `base`
//! template, renders every page under `pages/` into it, and copies the
//! optional `static/` tree next to the generated pages.

pub mod assets;
pub mod builder;
pub mod templates;

pub use builder::{rebuild_site, BuildConfig, BuildError, BuildReport, StaticBuilder};
pub use templates::{PageData, TemplateEngine};
