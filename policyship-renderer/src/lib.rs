//! # policyship-renderer
//!
//! Tera-based rendering of the run summary as Markdown, suitable for a CI
//! step summary (`$GITHUB_STEP_SUMMARY`) or a release comment.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use policyship_renderer::{Renderer, SummaryContext};
//!
//! fn print_summary(ctx: &SummaryContext) {
//!     if let Ok(renderer) = Renderer::new() {
//!         if let Ok(markdown) = renderer.render_summary(ctx) {
//!             println!("{markdown}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{table_cell, CountsCtx, OutcomeRow, SummaryContext};
pub use engine::Renderer;
pub use error::RenderError;
