//! Report body renderers.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use reporthub_core::error::AppError;
use reporthub_core::result::AppResult;
use reporthub_entity::job::{Language, ReportFormat};

use crate::csv;

/// Turns a produced report body into the bytes of the requested format.
///
/// Bad input (a body that cannot be expressed in `format`) is reported as a
/// `Validation` error so callers can treat it as permanent.
#[async_trait]
pub trait Renderer: Send + Sync + std::fmt::Debug + 'static {
    /// Render `body` as `format` for the given `language`.
    async fn render(&self, body: &Value, format: ReportFormat, language: Language) -> AppResult<Bytes>;
}

/// Built-in renderer for JSON and CSV.
///
/// PDF and Excel have no native layout engine here. With `document_fallback`
/// enabled they are written as the pretty-printed JSON document; otherwise
/// they are rejected.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    document_fallback: bool,
}

impl ReportRenderer {
    /// Create a renderer.
    pub fn new(document_fallback: bool) -> Self {
        Self { document_fallback }
    }

    fn render_json(body: &Value) -> AppResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec_pretty(body)?))
    }

    fn render_csv(body: &Value, language: Language) -> AppResult<Bytes> {
        let table = csv::to_csv(body).ok_or_else(|| {
            AppError::validation("CSV output requires a non-empty 'data' array of objects")
        })?;
        let text = if language.includes_arabic() {
            format!("{}{}", csv::UTF8_BOM, table)
        } else {
            table
        };
        Ok(Bytes::from(text))
    }
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Renderer for ReportRenderer {
    async fn render(&self, body: &Value, format: ReportFormat, language: Language) -> AppResult<Bytes> {
        let bytes = match format {
            ReportFormat::Json => Self::render_json(body)?,
            ReportFormat::Csv => Self::render_csv(body, language)?,
            ReportFormat::Pdf | ReportFormat::Excel if self.document_fallback => {
                Self::render_json(body)?
            }
            ReportFormat::Pdf | ReportFormat::Excel => {
                return Err(AppError::validation(format!(
                    "Unsupported report format: {}",
                    format.as_str()
                )));
            }
        };
        debug!(format = format.as_str(), bytes = bytes.len(), "Rendered report");
        Ok(bytes)
    }
}
