//! Brand-compliance review of generated answers.
//!
//! A post-generation pass that checks a draft answer against brand
//! guidelines, loaded from a configured file or falling back to a built-in
//! generic set. The reviewer may return the text unchanged, a minimally
//! edited version, or declare it unanswerable.

use std::sync::Arc;

use tracing::{info, warn};

use crate::providers::{CompletionProvider, ProviderError};
use crate::settings::Settings;

/// Sentinel the reviewer emits when the draft cannot be made compliant.
pub const UNANSWERABLE_SENTINEL: &str = "<unanswerable>";

const DEFAULT_GUIDELINES: &str = "\
General brand guidelines:
- Be helpful, clear, and concise
- Maintain a professional but friendly tone
- Avoid excessive jargon
- Respect user privacy
- Don't make claims that cannot be substantiated
- Don't promise features or functionality not offered
- Always be accurate and truthful";

/// Verdict of one review pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReviewVerdict {
    /// The answer as-is or with minimal compliance edits.
    Revised(String),
    /// The draft cannot be made compliant.
    Unanswerable,
}

/// Reviews answers against brand guidelines via the completion capability.
pub struct BrandReviewer {
    provider: Arc<dyn CompletionProvider>,
    guidelines: String,
}

impl BrandReviewer {
    /// Build a reviewer, loading guidelines from the configured file when
    /// one is set and readable, otherwise using the built-in defaults.
    #[must_use]
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: &Settings) -> Self {
        let guidelines = match &settings.brand_guidelines_file {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(err) => {
                    warn!(%path, error = %err, "failed to load brand guidelines file, using defaults");
                    DEFAULT_GUIDELINES.to_string()
                }
            },
            None => {
                warn!("no brand guidelines file configured, using defaults");
                DEFAULT_GUIDELINES.to_string()
            }
        };
        Self {
            provider,
            guidelines,
        }
    }

    /// Review a draft answer against the guidelines.
    pub async fn review(&self, draft: &str) -> Result<ReviewVerdict, ProviderError> {
        let prompt = format!(
            "# Brand Guidelines\n{guidelines}\n\n\
             # Task\n\
             Review the following AI response against our brand guidelines.\n\
             Make minimal changes necessary to align with our guidelines.\n\n\
             # Response to Review\n{draft}\n\n\
             # Instructions\n\
             1. Evaluate if the response follows the brand guidelines.\n\
             2. If compliant, return it unchanged.\n\
             3. If revision is needed, make minimal edits to align it with guidelines.\n\
             4. If unable to revise adequately, clearly state \"{sentinel}\".\n\n\
             # Output Format\n\
             Return ONLY the revised response text or the fallback message.",
            guidelines = self.guidelines,
            sentinel = UNANSWERABLE_SENTINEL,
        );

        let reviewed = self
            .provider
            .prompt("You review answers for brand compliance.", &prompt)
            .await?;
        let reviewed = reviewed.trim();

        if reviewed.eq_ignore_ascii_case(UNANSWERABLE_SENTINEL) {
            info!("brand review declared the draft unanswerable");
            return Ok(ReviewVerdict::Unanswerable);
        }
        Ok(ReviewVerdict::Revised(reviewed.to_string()))
    }
}
