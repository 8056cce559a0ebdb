//! `<partial file-name="...">` template inclusion.
//!
//! The template is rendered with the page metadata, the element's `data-*`
//! attributes and the element's inner markup under `partialBody`. The
//! rendered output replaces the element and the pass is marked dirty, since
//! partials commonly expand to more custom tags.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use handlebars::Handlebars;
use serde_json::Value;

use crate::domain::errors::{EngineResult, RenderError};
use crate::domain::models::{DirtyFlag, Metadata, Options};
use crate::domain::ports::{ElementReplacer, HandlerContext, PartialRenderer, TemplateEngine};
use crate::infrastructure::dom::Element;
use crate::services::handler_group::{HandlerGroup, Member};

pub const GROUP_NAME: &str = "partial";

/// Key under which the element's inner markup is passed to the template.
pub const PARTIAL_BODY_KEY: &str = "partialBody";

/// Option naming the directories searched for partials.
pub const PARTIAL_DIRS_OPTION: &str = "partial_dirs";

/// Build the partial group backed by a [`FileRenderer`] without extra directories.
pub fn group(options: Options) -> EngineResult<HandlerGroup> {
    group_with_renderer(options, Arc::new(FileRenderer::new(Vec::new())))
}

/// Build the partial group backed by `renderer`.
pub fn group_with_renderer(
    options: Options,
    renderer: Arc<dyn PartialRenderer>,
) -> EngineResult<HandlerGroup> {
    let mut group = HandlerGroup::new(GROUP_NAME, options);
    group.add(Member::replacer(Partial::new(renderer)))?;
    Ok(group)
}

// ---------------------------------------------------------------------------
// Partial handler
// ---------------------------------------------------------------------------

pub struct Partial {
    renderer: Arc<dyn PartialRenderer>,
}

impl Partial {
    pub fn new(renderer: Arc<dyn PartialRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait(?Send)]
impl ElementReplacer for Partial {
    fn element_name(&self) -> &str {
        "partial"
    }

    async fn process(
        &self,
        element: &Element,
        metadata: &mut Metadata,
        dirty: &DirtyFlag,
        ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        let Some(file_name) = element.non_empty_attr("file-name") else {
            anyhow::bail!("No file-name in partial tag");
        };

        let mut data = metadata.as_map().clone();
        data.extend(element.data());
        data.insert(
            PARTIAL_BODY_KEY.to_string(),
            Value::String(element.inner_html()?),
        );

        dirty.set_dirty();

        let rendered = self
            .renderer
            .render(&file_name, &Value::Object(data), ctx.options())
            .await?;
        Ok(Some(rendered))
    }
}

// ---------------------------------------------------------------------------
// File renderer
// ---------------------------------------------------------------------------

/// Finds partials on disk and renders them by file extension.
///
/// Directories named by the group's `partial_dirs` option are searched when
/// present, otherwise the renderer's own directories, otherwise the current
/// directory.
pub struct FileRenderer {
    dirs: Vec<PathBuf>,
    engines: Vec<Box<dyn TemplateEngine>>,
}

impl FileRenderer {
    /// A renderer with the Handlebars, Liquid, Nunjucks and plain HTML
    /// engines registered.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            engines: vec![
                Box::new(HandlebarsEngine::new()),
                Box::new(LiquidEngine),
                Box::new(NunjucksEngine::new()),
                Box::new(PlainHtmlEngine),
            ],
        }
    }

    /// Register another dialect. Later registrations win on shared extensions.
    #[must_use]
    pub fn with_engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.engines.insert(0, Box::new(engine));
        self
    }

    /// Directories searched when the options name none.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn search_dirs(&self, options: &Options) -> Vec<PathBuf> {
        let from_options = options.get_str_list(PARTIAL_DIRS_OPTION);
        if !from_options.is_empty() {
            return from_options.into_iter().map(PathBuf::from).collect();
        }
        if !self.dirs.is_empty() {
            return self.dirs.clone();
        }
        vec![PathBuf::from(".")]
    }

    fn engine_for(&self, path: &Path) -> Option<&dyn TemplateEngine> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.engines
            .iter()
            .find(|engine| engine.extensions().contains(&extension.as_str()))
            .map(|engine| &**engine)
    }
}

async fn find_partial(dirs: &[PathBuf], file_name: &str) -> Option<PathBuf> {
    for dir in dirs {
        let candidate = dir.join(file_name);
        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => return Some(candidate),
            Ok(_) => {}
            Err(err) => {
                tracing::trace!(path = %candidate.display(), error = %err, "Partial not in directory");
            }
        }
    }
    None
}

#[async_trait]
impl PartialRenderer for FileRenderer {
    async fn render(
        &self,
        file_name: &str,
        data: &Value,
        options: &Options,
    ) -> Result<String, RenderError> {
        let dirs = self.search_dirs(options);
        let Some(path) = find_partial(&dirs, file_name).await else {
            return Err(RenderError::NotFound {
                file_name: file_name.to_string(),
                dirs: dirs.iter().map(|d| d.display().to_string()).collect(),
            });
        };

        let engine = self
            .engine_for(&path)
            .ok_or_else(|| RenderError::Unsupported(file_name.to_string()))?;

        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| RenderError::Read {
                path: path.display().to_string(),
                source,
            })?;

        tracing::debug!(partial = file_name, path = %path.display(), engine = engine.name(), "Rendering partial");
        engine.render(&source, data, file_name)
    }
}

// ---------------------------------------------------------------------------
// Template engines
// ---------------------------------------------------------------------------

/// Handlebars templates. Output is not HTML-escaped.
pub struct HandlebarsEngine {
    registry: Handlebars<'static>,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }
}

impl Default for HandlebarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn name(&self) -> &str {
        "Handlebars"
    }

    fn extensions(&self) -> &[&str] {
        &["handlebars", "hbs"]
    }

    fn render(&self, source: &str, data: &Value, file_name: &str) -> Result<String, RenderError> {
        self.registry
            .render_template(source, data)
            .map_err(|e| template_error(self.name(), file_name, e))
    }
}

fn template_error(engine: &str, file_name: &str, reason: impl ToString) -> RenderError {
    RenderError::Template {
        engine: engine.to_string(),
        file_name: file_name.to_string(),
        reason: reason.to_string(),
    }
}

/// Liquid templates with the standard filter and tag library.
pub struct LiquidEngine;

impl TemplateEngine for LiquidEngine {
    fn name(&self) -> &str {
        "Liquid"
    }

    fn extensions(&self) -> &[&str] {
        &["liquid"]
    }

    fn render(&self, source: &str, data: &Value, file_name: &str) -> Result<String, RenderError> {
        let fail = |e: liquid::Error| template_error(self.name(), file_name, e);
        let parser = liquid::ParserBuilder::with_stdlib().build().map_err(fail)?;
        let globals = liquid::to_object(data).map_err(fail)?;
        parser
            .parse(source)
            .and_then(|template| template.render(&globals))
            .map_err(fail)
    }
}

/// Nunjucks-style templates (`{{ var }}`, `{% if %}`, filters), rendered by
/// minijinja with autoescaping off.
pub struct NunjucksEngine {
    env: minijinja::Environment<'static>,
}

impl NunjucksEngine {
    /// An environment with autoescaping disabled for every template.
    pub fn new() -> Self {
        let mut env = minijinja::Environment::new();
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
        Self { env }
    }
}

impl Default for NunjucksEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for NunjucksEngine {
    fn name(&self) -> &str {
        "Nunjucks"
    }

    fn extensions(&self) -> &[&str] {
        &["njk"]
    }

    fn render(&self, source: &str, data: &Value, file_name: &str) -> Result<String, RenderError> {
        self.env
            .render_str(source, data)
            .map_err(|e| template_error(self.name(), file_name, e))
    }
}

/// Markup copied through verbatim. `partialBody` is not used.
pub struct PlainHtmlEngine;

impl TemplateEngine for PlainHtmlEngine {
    fn name(&self) -> &str {
        "HTML"
    }

    fn extensions(&self) -> &[&str] {
        &["html", "xhtml", "htm"]
    }

    fn render(&self, source: &str, _data: &Value, _file_name: &str) -> Result<String, RenderError> {
        Ok(source.to_string())
    }
}
