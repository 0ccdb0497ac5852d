//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use tracing::debug;

use super::PromptContext;
use super::embedded;
use crate::domain::Phase;

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `~/.config/nudger/prompts/`)
    user_dir: Option<PathBuf>,
    /// Working-directory defaults (e.g., `prompts/`)
    repo_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `user_dir`, then `./prompts`, then the embedded set
    pub fn new(user_dir: Option<impl AsRef<Path>>) -> Self {
        let user_dir = user_dir.map(|d| d.as_ref().to_path_buf()).filter(|d| d.exists());
        let repo_dir = Some(PathBuf::from("prompts")).filter(|d| d.exists());
        debug!(?user_dir, ?repo_dir, "PromptLoader::new: called");

        Self {
            hbs: Self::engine(),
            user_dir,
            repo_dir,
        }
    }

    /// Loader using the default user override dir
    pub fn with_default_dirs() -> Self {
        Self::new(dirs::config_dir().map(|d| d.join("nudger").join("prompts")))
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
            repo_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text, not HTML
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `{user_dir}/{name}.pmt`
    /// 2. Working directory: `prompts/{name}.pmt`
    /// 3. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        for dir in [&self.user_dir, &self.repo_dir].into_iter().flatten() {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        debug!(%name, "PromptLoader::load_template: not found anywhere");
        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        debug!(%template_name, phase = %context.phase, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map(|s| s.trim().to_string())
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// System prompt followed by the instructions for `phase`
    pub fn phase_prompt(&self, phase: Phase, context: &PromptContext) -> Result<String> {
        let system = self.render("system", context)?;
        let phase_part = self.render(phase.as_str(), context)?;
        Ok(format!("{}\n\n{}", system, phase_part))
    }

    /// System prompt followed by support-mode instructions
    pub fn interrupt_prompt(&self, context: &PromptContext) -> Result<String> {
        let system = self.render("system", context)?;
        let support = self.render("interrupt", context)?;
        Ok(format!("{}\n\n{}", system, support))
    }

    /// System prompt followed by the resume instructions
    pub fn resume_prompt(&self, context: &PromptContext) -> Result<String> {
        let system = self.render("system", context)?;
        let resume = self.render("resume", context)?;
        Ok(format!("{}\n\n{}", system, resume))
    }
}
