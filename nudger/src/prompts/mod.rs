//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for each phase.
//!
//! Template loading chain:
//! 1. `~/.config/nudger/prompts/{name}.pmt` (user override)
//! 2. `prompts/{name}.pmt` (working directory)
//! 3. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

mod context;
pub mod embedded;
mod loader;

pub use context::PromptContext;
pub use loader::PromptLoader;
