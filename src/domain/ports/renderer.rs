//! Rendering ports used by the partial handler.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::RenderError;
use crate::domain::models::Options;

/// Renders one template dialect.
pub trait TemplateEngine: Send + Sync {
    /// Label used in error messages, e.g. `Handlebars`.
    fn name(&self) -> &str;

    /// File extensions (without the dot) this engine claims.
    fn extensions(&self) -> &[&str];

    /// Render template text. `file_name` is the name the partial was requested by.
    fn render(&self, source: &str, data: &Value, file_name: &str) -> Result<String, RenderError>;
}

/// Resolves a partial by file name and renders it with `data`.
#[async_trait]
pub trait PartialRenderer: Send + Sync {
    async fn render(
        &self,
        file_name: &str,
        data: &Value,
        options: &Options,
    ) -> Result<String, RenderError>;
}
