//! The view engine: render entry points and layout/partial composition.

use crate::cache::TemplateCache;
use crate::compiler::{self, CompiledTemplate};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::loader::{FsLoader, ViewLoader};
use crate::script::interp::RenderHooks;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Maximum layout/partial nesting before composition is aborted; guards
/// against a partial that includes itself.
const MAX_RENDER_DEPTH: usize = 16;

/// Configuration, compiled-template cache and file loader for a family
/// of views. Cheap to clone and share across threads.
#[derive(Clone)]
pub struct ViewEngine {
    config: Arc<EngineConfig>,
    cache: TemplateCache,
    loader: Arc<dyn ViewLoader>,
}

impl ViewEngine {
    pub fn new(config: EngineConfig) -> Self {
        let loader = Arc::new(FsLoader::new(config.extension.clone()));
        ViewEngine {
            config: Arc::new(config),
            cache: TemplateCache::new(),
            loader,
        }
    }

    /// Engine with a custom loader; the loader owns extension handling.
    pub fn with_loader(config: EngineConfig, loader: Arc<dyn ViewLoader>) -> Self {
        ViewEngine {
            config: Arc::new(config),
            cache: TemplateCache::new(),
            loader,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compile template text. No file, no cache.
    pub fn compile(&self, template: &str) -> Result<CompiledTemplate> {
        compiler::compile(template)
    }

    /// Render template text against a model, including the layout pass.
    pub fn render_str(&self, template: &str, model: &Value) -> Result<String> {
        let compiled = compiler::compile(template)?;
        self.render_compiled(&compiled, model, 0)
    }

    /// Load, compile (or fetch from cache) and render a view file,
    /// including the layout pass. Synchronous form.
    pub fn render_view(&self, path: impl AsRef<Path>, model: &Value) -> Result<String> {
        let compiled = self.load_compiled(path.as_ref())?;
        self.render_compiled(&compiled, model, 0)
    }

    /// Deferred form: runs the whole load/compile/render composition on
    /// the blocking pool so a long render never stalls the reactor.
    pub async fn render_view_deferred(
        &self,
        path: impl AsRef<Path>,
        model: &Value,
    ) -> Result<String> {
        let engine = self.clone();
        let path = path.as_ref().to_path_buf();
        let model = model.clone();
        match tokio::task::spawn_blocking(move || engine.render_view(&path, &model)).await {
            Ok(result) => result,
            Err(join) => Err(Error::runtime(format!("deferred render aborted: {}", join))),
        }
    }

    /// The compiled unit for a view path. The cache is consulted only
    /// in production mode; otherwise every call recompiles.
    fn load_compiled(&self, path: &Path) -> Result<Arc<CompiledTemplate>> {
        let key = path.to_string_lossy().into_owned();
        if self.config.production {
            if let Some(hit) = self.cache.get(&key) {
                log::trace!("template cache hit for {}", key);
                return Ok(hit);
            }
        }
        let text = self.loader.load(path)?;
        let compiled = Arc::new(compiler::compile_with_path(&text, Some(path))?);
        if self.config.production {
            self.cache.put(&key, Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    /// Content pass, then at most one layout pass. The layout receives
    /// the same model with its `layout` field cleared, and the rendered
    /// body through a side channel rather than a model key.
    fn render_compiled(
        &self,
        compiled: &CompiledTemplate,
        model: &Value,
        depth: usize,
    ) -> Result<String> {
        let hooks = EngineHooks {
            engine: self,
            body: None,
            depth,
        };
        let content = compiled.invoke(model, &hooks)?;
        if self.config.debug {
            log::debug!("rendered {} chars of content", content.html.len());
        }

        let Some(layout_name) = self.resolve_layout(model) else {
            return Ok(content.html);
        };
        if depth >= MAX_RENDER_DEPTH {
            return Err(Error::layout(
                format!("layout nesting exceeded {} levels", MAX_RENDER_DEPTH),
                None,
            ));
        }
        let layout_path = Path::new(&self.config.views_dir).join(&layout_name);
        let layout = self.load_compiled(&layout_path)?;
        let mut layout_model = model.clone();
        if let Value::Object(map) = &mut layout_model {
            map.insert("layout".to_string(), Value::Null);
        }
        let hooks = EngineHooks {
            engine: self,
            body: Some(content.html),
            depth: depth + 1,
        };
        let composed = layout.invoke(&layout_model, &hooks)?;
        if !composed.body_called {
            return Err(Error::layout(
                "layout never invokes renderBody()",
                Some(layout_path),
            ));
        }
        Ok(composed.html)
    }

    /// Layout choice for a model: an absent field falls back to the
    /// configured default, an explicit falsy value (null, false, "")
    /// suppresses the layout entirely.
    fn resolve_layout(&self, model: &Value) -> Option<String> {
        match model.get("layout") {
            None => {
                if self.config.default_layout.is_empty() {
                    None
                } else {
                    Some(self.config.default_layout.clone())
                }
            }
            Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
            Some(_) => None,
        }
    }

    /// Partials resolve against `partial_dir` and never trigger a
    /// layout pass of their own.
    fn render_partial(&self, name: &str, model: &Value, depth: usize) -> Result<String> {
        if depth >= MAX_RENDER_DEPTH {
            return Err(Error::runtime(format!(
                "partial nesting exceeded {} levels at '{}'",
                MAX_RENDER_DEPTH, name
            )));
        }
        let path = Path::new(&self.config.partial_dir).join(name);
        let compiled = self.load_compiled(&path)?;
        let hooks = EngineHooks {
            engine: self,
            body: None,
            depth,
        };
        Ok(compiled.invoke(model, &hooks)?.html)
    }
}

/// Hooks wiring a template invocation back into its engine.
struct EngineHooks<'a> {
    engine: &'a ViewEngine,
    body: Option<String>,
    depth: usize,
}

impl RenderHooks for EngineHooks<'_> {
    fn render_partial(&self, path: &str, model: &Value) -> Result<String> {
        self.engine.render_partial(path, model, self.depth + 1)
    }

    fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_str_without_layout() {
        let engine = ViewEngine::new(EngineConfig::default());
        let html = engine
            .render_str("<p>@name</p>", &json!({"name": "Ada"}))
            .unwrap();
        assert_eq!(html, "<p>Ada</p>");
    }

    #[test]
    fn default_config_applies_no_layout() {
        let engine = ViewEngine::new(EngineConfig::default());
        assert_eq!(engine.resolve_layout(&json!({})), None);
    }

    #[test]
    fn explicit_falsy_layout_suppresses_default() {
        let config = EngineConfig {
            default_layout: "main".to_string(),
            ..EngineConfig::default()
        };
        let engine = ViewEngine::new(config);
        assert_eq!(engine.resolve_layout(&json!({})), Some("main".to_string()));
        assert_eq!(engine.resolve_layout(&json!({"layout": null})), None);
        assert_eq!(engine.resolve_layout(&json!({"layout": false})), None);
        assert_eq!(engine.resolve_layout(&json!({"layout": ""})), None);
        assert_eq!(
            engine.resolve_layout(&json!({"layout": "other"})),
            Some("other".to_string())
        );
    }
}
