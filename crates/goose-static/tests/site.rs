use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use goose_static::{rebuild_site, BuildConfig};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use walkdir::WalkDir;

fn write(path: &Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Source tree with nested pages and static assets.
fn fixture(root: &Path) {
    write(
        &root.join("templates/0_head.gohtml"),
        br#"<!DOCTYPE html>
<html>
<head><title>{% block title %}Site{% endblock %}</title></head>
"#,
    );
    write(
        &root.join("templates/1_body.html"),
        br#"<body>
{% block content %}{% endblock %}
</body>
</html>
"#,
    );
    write(
        &root.join("pages/index.html"),
        br#"{% block content %}<a href="/"{% if this_page == "/" %} class="active"{% endif %}>Home</a>{% endblock %}"#,
    );
    write(
        &root.join("pages/about/index.html"),
        br#"{% block title %}About{% endblock %}{% block content %}About us{% endblock %}"#,
    );
    write(
        &root.join("pages/about/nested.html"),
        br#"{% block content %}{% set p = map("heading", "Nested") %}<h1>{{ p.heading }}</h1>{{ p.Root.this_page }}{% endblock %}"#,
    );
    write(&root.join("static/CNAME"), b"example.com\n");
    write(&root.join("static/style.css"), b"body { margin: 0; }\n");
    write(&root.join("static/img/favicon.ico"), &[0, 0, 1, 0]);
    write(&root.join("static/.hidden"), b"secret");
}

/// Relative path → contents for every file under `dir`.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            (
                e.path().strip_prefix(dir).unwrap().to_path_buf(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect()
}

#[test]
fn generates_expected_tree() {
    let temp = tempdir().unwrap();
    let root = temp.path().join("site");
    fixture(&root);
    let dist = temp.path().join("dist");

    let report = rebuild_site(&BuildConfig::from_source(&root, &dist)).unwrap();

    assert_eq!(report.pages, 3);
    assert_eq!(report.static_files, 3);

    let files: Vec<PathBuf> = snapshot(&dist).into_keys().collect();
    let expected: Vec<PathBuf> = [
        "CNAME",
        "about/index.html",
        "about/nested/index.html",
        "img/favicon.ico",
        "index.html",
        "style.css",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    assert_eq!(files, expected);

    let mut top_level: Vec<String> = fs::read_dir(&dist)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    top_level.sort();
    assert_eq!(
        top_level,
        vec!["CNAME", "about", "img", "index.html", "style.css"]
    );
}

#[test]
fn renders_pages_through_layout() {
    let temp = tempdir().unwrap();
    let root = temp.path().join("site");
    fixture(&root);
    let dist = temp.path().join("dist");

    rebuild_site(&BuildConfig::from_source(&root, &dist)).unwrap();

    let index = fs::read_to_string(dist.join("index.html")).unwrap();
    assert!(index.contains("<title>Site</title>"));
    assert!(index.contains(r#"<a href="/" class="active">Home</a>"#));

    let about = fs::read_to_string(dist.join("about/index.html")).unwrap();
    assert!(about.contains("<title>About</title>"));
    assert!(about.contains("About us"));

    let nested = fs::read_to_string(dist.join("about/nested/index.html")).unwrap();
    assert!(nested.contains("<h1>Nested</h1>/about/nested"));
    assert!(nested.trim_end().ends_with("</html>"));
}

#[test]
fn copies_static_files_verbatim() {
    let temp = tempdir().unwrap();
    let root = temp.path().join("site");
    fixture(&root);
    let dist = temp.path().join("dist");

    rebuild_site(&BuildConfig::from_source(&root, &dist)).unwrap();

    assert_eq!(fs::read(dist.join("CNAME")).unwrap(), b"example.com\n");
    assert_eq!(
        fs::read(dist.join("style.css")).unwrap(),
        b"body { margin: 0; }\n"
    );
    assert_eq!(fs::read(dist.join("img/favicon.ico")).unwrap(), vec![0, 0, 1, 0]);
    assert!(!dist.join(".hidden").exists());
}

#[test]
fn rebuild_is_idempotent() {
    let temp = tempdir().unwrap();
    let root = temp.path().join("site");
    fixture(&root);
    let dist = temp.path().join("dist");
    let config = BuildConfig::from_source(&root, &dist);

    rebuild_site(&config).unwrap();
    let first = snapshot(&dist);
    rebuild_site(&config).unwrap();
    let second = snapshot(&dist);

    assert_eq!(first, second);
}
