//! Error types for policyship-renderer.

use thiserror::Error;

/// All errors that can arise from summary rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),
}
