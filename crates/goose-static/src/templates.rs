//! Template engine for rendering pages into the composed layout.

use std::collections::BTreeMap;

use minijinja::value::{Rest, Value};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, State};
use serde::Serialize;

/// Name of the composed layout template that every page extends.
pub const BASE_TEMPLATE: &str = "base";

/// Context for rendering a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageData {
    /// Root-relative URL of the page, e.g. `/` or `/about/nested`
    pub this_page: String,
}

impl PageData {
    /// Recover the page context of the template currently being rendered.
    fn from_state(state: &State) -> Option<Self> {
        let this_page = state.lookup("this_page")?;
        Some(Self {
            this_page: this_page.as_str()?.to_string(),
        })
    }
}

/// Template engine using minijinja.
///
/// Holds the composed layout as the `base` template plus one template per
/// page. Pages are compiled as children of `base`, so a page only has to
/// provide the blocks the layout declares.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine around the composed layout.
    pub fn new(layout: String) -> Result<Self, Error> {
        let mut env = Environment::new();

        // Output is written verbatim, like any text template.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        env.add_function("map", map);
        env.add_template_owned(BASE_TEMPLATE, layout)?;

        Ok(Self { env })
    }

    /// Compile a page under `name`, substituting its blocks into the layout.
    pub fn add_page(&mut self, name: &str, source: &str) -> Result<(), Error> {
        let source = format!("{{% extends \"{BASE_TEMPLATE}\" %}}\n{source}");
        self.env.add_template_owned(name.to_string(), source)
    }

    /// Render a previously added page.
    pub fn render_page(&self, name: &str, data: &PageData) -> Result<String, Error> {
        self.env.get_template(name)?.render(data)
    }
}

/// Concatenate layout fragments, in order, into one layout source.
pub fn compose_layout<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    fragments.into_iter().collect()
}

/// `map(key, value, ...)`: build an ad-hoc lookup table for a template.
///
/// The table always carries a `Root` entry holding the current page context.
fn map(state: &State, args: Rest<Value>) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "odd number of args passed into key-value map",
        ));
    }

    let mut table: BTreeMap<String, Value> = BTreeMap::new();
    if let Some(root) = PageData::from_state(state) {
        table.insert("Root".to_string(), Value::from_serialize(&root));
    }

    for pair in args.chunks(2) {
        let key = pair[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "key must be a string"))?;
        table.insert(key.to_string(), pair[1].clone());
    }

    Ok(Value::from_serialize(&table))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"<html><body>{% block content %}{% endblock %}</body></html>"#;

    fn page(this_page: &str) -> PageData {
        PageData {
            this_page: this_page.to_string(),
        }
    }

    #[test]
    fn renders_page_into_layout() {
        let mut engine = TemplateEngine::new(LAYOUT.to_string()).unwrap();
        engine
            .add_page("index.html", "{% block content %}<h1>Home</h1>{% endblock %}")
            .unwrap();

        let html = engine.render_page("index.html", &page("/")).unwrap();

        assert_eq!(html, "<html><body><h1>Home</h1></body></html>");
    }

    #[test]
    fn exposes_this_page() {
        let mut engine = TemplateEngine::new(LAYOUT.to_string()).unwrap();
        engine
            .add_page("about.html", "{% block content %}{{ this_page }}{% endblock %}")
            .unwrap();

        let html = engine.render_page("about.html", &page("/about")).unwrap();

        assert!(html.contains("<body>/about</body>"));
    }

    #[test]
    fn does_not_escape_output() {
        let mut engine = TemplateEngine::new(LAYOUT.to_string()).unwrap();
        engine
            .add_page("raw.html", r#"{% block content %}{{ "<b>" }}{% endblock %}"#)
            .unwrap();

        let html = engine.render_page("raw.html", &page("/raw")).unwrap();

        assert!(html.contains("<b>"));
    }

    #[test]
    fn layout_fragments_share_blocks() {
        let layout = compose_layout([
            "{% macro nav(current) %}<nav>{{ current }}</nav>{% endmacro %}",
            "<body>{{ nav(this_page) }}{% block content %}{% endblock %}</body>",
        ]);
        let mut engine = TemplateEngine::new(layout).unwrap();
        engine
            .add_page("index.html", "{% block content %}hi{% endblock %}")
            .unwrap();

        let html = engine.render_page("index.html", &page("/")).unwrap();

        assert_eq!(html, "<body><nav>/</nav>hi</body>");
    }

    #[test]
    fn map_helper_carries_root() {
        let mut engine = TemplateEngine::new(LAYOUT.to_string()).unwrap();
        engine
            .add_page(
                "card.html",
                r#"{% block content %}{% set m = map("title", "Card", "count", 3) %}{{ m.title }}:{{ m.count }}:{{ m.Root.this_page }}{% endblock %}"#,
            )
            .unwrap();

        let html = engine.render_page("card.html", &page("/card")).unwrap();

        assert!(html.contains("Card:3:/card"));
    }

    #[test]
    fn map_helper_rejects_odd_arguments() {
        let mut engine = TemplateEngine::new(LAYOUT.to_string()).unwrap();
        engine
            .add_page("odd.html", r#"{% block content %}{{ map("a") }}{% endblock %}"#)
            .unwrap();

        let err = engine.render_page("odd.html", &page("/odd")).unwrap_err();

        assert!(err.to_string().contains("odd number of args"));
    }

    #[test]
    fn map_helper_rejects_non_string_keys() {
        let mut engine = TemplateEngine::new(LAYOUT.to_string()).unwrap();
        engine
            .add_page("key.html", r#"{% block content %}{{ map(1, "a") }}{% endblock %}"#)
            .unwrap();

        let err = engine.render_page("key.html", &page("/key")).unwrap_err();

        assert!(err.to_string().contains("key must be a string"));
    }

    #[test]
    fn reports_layout_syntax_errors() {
        assert!(TemplateEngine::new("{% block content %}".to_string()).is_err());
    }
}
