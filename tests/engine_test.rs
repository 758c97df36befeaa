//! File-based rendering: layouts, partials and the production cache.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use vellum::{EngineConfig, Error, FsLoader, ViewEngine, ViewLoader};

fn view_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let views = dir.path().join("views");
    let partials = views.join("partials");
    std::fs::create_dir_all(&partials).unwrap();
    std::fs::write(
        views.join("main.html"),
        "<html><title>@title</title>@renderBody()</html>",
    )
    .unwrap();
    std::fs::write(views.join("index.html"), "<p>@title</p>").unwrap();
    std::fs::write(views.join("noslot.html"), "<html>no slot here</html>").unwrap();
    std::fs::write(
        views.join("with_partial.html"),
        "<div>@renderPartial('nav')</div>",
    )
    .unwrap();
    std::fs::write(partials.join("nav.html"), "<nav>@site</nav>").unwrap();
    std::fs::write(partials.join("badge.html"), "<span>@label</span>").unwrap();
    std::fs::write(partials.join("loop.html"), "@renderPartial('loop')").unwrap();
    std::fs::write(views.join("broken.html"), "@{var x = 1;").unwrap();
    dir
}

fn config_for(dir: &TempDir) -> EngineConfig {
    EngineConfig {
        views_dir: dir.path().join("views").to_string_lossy().into_owned(),
        partial_dir: dir
            .path()
            .join("views/partials")
            .to_string_lossy()
            .into_owned(),
        ..EngineConfig::default()
    }
}

fn index_path(dir: &TempDir) -> PathBuf {
    dir.path().join("views/index.html")
}

#[test]
fn renders_view_file_without_layout() {
    let dir = view_tree();
    let engine = ViewEngine::new(config_for(&dir));
    let html = engine
        .render_view(index_path(&dir), &json!({"title": "Home"}))
        .unwrap();
    assert_eq!(html, "<p>Home</p>");
}

#[test]
fn model_layout_field_composes() {
    let dir = view_tree();
    let engine = ViewEngine::new(config_for(&dir));
    let html = engine
        .render_view(index_path(&dir), &json!({"title": "Home", "layout": "main"}))
        .unwrap();
    assert_eq!(html, "<html><title>Home</title><p>Home</p></html>");
}

#[test]
fn configured_default_layout_applies() {
    let dir = view_tree();
    let config = EngineConfig {
        default_layout: "main".to_string(),
        ..config_for(&dir)
    };
    let engine = ViewEngine::new(config);
    let html = engine
        .render_view(index_path(&dir), &json!({"title": "T"}))
        .unwrap();
    assert_eq!(html, "<html><title>T</title><p>T</p></html>");
}

#[test]
fn explicit_falsy_layout_renders_bare() {
    let dir = view_tree();
    let config = EngineConfig {
        default_layout: "main".to_string(),
        ..config_for(&dir)
    };
    let engine = ViewEngine::new(config);
    for layout in [json!(null), json!(false), json!("")] {
        let html = engine
            .render_view(index_path(&dir), &json!({"title": "T", "layout": layout}))
            .unwrap();
        assert_eq!(html, "<p>T</p>");
    }
}

#[test]
fn layout_without_render_body_is_an_error() {
    let dir = view_tree();
    let engine = ViewEngine::new(config_for(&dir));
    let err = engine
        .render_view(index_path(&dir), &json!({"title": "T", "layout": "noslot"}))
        .unwrap_err();
    match err {
        Error::Layout { message, path } => {
            assert!(message.contains("renderBody"));
            assert!(path.unwrap().ends_with("noslot"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn partial_resolves_against_partial_dir() {
    let dir = view_tree();
    let engine = ViewEngine::new(config_for(&dir));
    let html = engine
        .render_view(
            dir.path().join("views/with_partial.html"),
            &json!({"site": "Docs"}),
        )
        .unwrap();
    assert_eq!(html, "<div><nav>Docs</nav></div>");
}

#[test]
fn partial_accepts_an_explicit_model() {
    let dir = view_tree();
    let engine = ViewEngine::new(config_for(&dir));
    let html = engine
        .render_str(
            "@renderPartial('badge', user)",
            &json!({"user": {"label": "New"}}),
        )
        .unwrap();
    assert_eq!(html, "<span>New</span>");
}

#[test]
fn self_including_partial_is_bounded() {
    let dir = view_tree();
    let engine = ViewEngine::new(config_for(&dir));
    let err = engine
        .render_str("@renderPartial('loop')", &json!({}))
        .unwrap_err();
    assert!(err.to_string().contains("nesting"), "{err}");
}

#[test]
fn missing_view_surfaces_io_error() {
    let dir = view_tree();
    let engine = ViewEngine::new(config_for(&dir));
    let err = engine
        .render_view(dir.path().join("views/absent.html"), &json!({}))
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn broken_view_reports_its_path() {
    let dir = view_tree();
    let engine = ViewEngine::new(config_for(&dir));
    let err = engine
        .render_view(dir.path().join("views/broken.html"), &json!({}))
        .unwrap_err();
    assert!(matches!(err, Error::Syntax { .. }));
    assert!(err.to_string().contains("broken.html"));
}

/// Loader that records every requested path before delegating to disk.
struct RecordingLoader {
    inner: FsLoader,
    loads: Mutex<Vec<PathBuf>>,
}

impl RecordingLoader {
    fn new() -> Self {
        RecordingLoader {
            inner: FsLoader::new("html"),
            loads: Mutex::new(Vec::new()),
        }
    }

    fn loaded(&self) -> Vec<PathBuf> {
        self.loads.lock().unwrap().clone()
    }
}

impl ViewLoader for RecordingLoader {
    fn load(&self, path: &Path) -> vellum::Result<String> {
        self.loads.lock().unwrap().push(path.to_path_buf());
        self.inner.load(path)
    }
}

#[test]
fn production_mode_compiles_each_view_once() {
    let dir = view_tree();
    let loader = Arc::new(RecordingLoader::new());
    let config = EngineConfig {
        production: true,
        ..config_for(&dir)
    };
    let engine = ViewEngine::with_loader(config, loader.clone());
    let path = index_path(&dir);
    engine.render_view(&path, &json!({"title": "a"})).unwrap();
    engine.render_view(&path, &json!({"title": "b"})).unwrap();
    assert_eq!(loader.loaded().len(), 1);
}

#[test]
fn development_mode_recompiles_every_render() {
    let dir = view_tree();
    let loader = Arc::new(RecordingLoader::new());
    let engine = ViewEngine::with_loader(config_for(&dir), loader.clone());
    let path = index_path(&dir);
    engine.render_view(&path, &json!({"title": "a"})).unwrap();
    engine.render_view(&path, &json!({"title": "b"})).unwrap();
    assert_eq!(loader.loaded().len(), 2);
}

#[test]
fn suppressed_layout_is_never_loaded() {
    let dir = view_tree();
    let loader = Arc::new(RecordingLoader::new());
    let config = EngineConfig {
        default_layout: "main".to_string(),
        ..config_for(&dir)
    };
    let engine = ViewEngine::with_loader(config, loader.clone());
    let path = index_path(&dir);
    engine
        .render_view(&path, &json!({"title": "T", "layout": null}))
        .unwrap();
    let loaded = loader.loaded();
    assert_eq!(loaded, vec![path]);
}

#[tokio::test]
async fn deferred_render_matches_sync() {
    let dir = view_tree();
    let engine = ViewEngine::new(config_for(&dir));
    let model = json!({"title": "Async", "layout": "main"});
    let sync = engine.render_view(index_path(&dir), &model).unwrap();
    let deferred = engine
        .render_view_deferred(index_path(&dir), &model)
        .await
        .unwrap();
    assert_eq!(sync, deferred);
}

#[test]
fn engine_clones_share_the_cache() {
    let dir = view_tree();
    let loader = Arc::new(RecordingLoader::new());
    let config = EngineConfig {
        production: true,
        ..config_for(&dir)
    };
    let engine = ViewEngine::with_loader(config, loader.clone());
    let clone = engine.clone();
    let path = index_path(&dir);
    engine.render_view(&path, &json!({"title": "a"})).unwrap();
    clone.render_view(&path, &json!({"title": "b"})).unwrap();
    assert_eq!(loader.loaded().len(), 1);
}
