//! Tera rendering engine for run summaries.
//!
//! Templates are embedded at compile time. Partials live under `shared/` and
//! are pulled in with `{% include %}`.

use tera::Tera;

use crate::context::SummaryContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

pub const SUMMARY_TEMPLATE: &str = "summary/run_summary.md.tera";

const TPLS: &[(&str, &str)] = &[
    ("shared/_header.tera", include_str!("templates/_partials/header.tera")),
    ("shared/_outcomes.tera", include_str!("templates/_partials/outcomes.tera")),
    (SUMMARY_TEMPLATE, include_str!("templates/run_summary.md.tera")),
];

fn build_tera() -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TPLS.iter().copied())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders [`SummaryContext`] values. Create once with [`Renderer::new`] and reuse.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { tera: build_tera()? })
    }

    /// Render the Markdown run summary. Output always uses LF line endings.
    pub fn render_summary(&self, ctx: &SummaryContext) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let rendered = self.tera.render(SUMMARY_TEMPLATE, &tera_ctx)?;
        Ok(rendered.replace("\r\n", "\n"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
