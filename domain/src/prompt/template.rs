//! Prompt templates for the consensus pipeline

use crate::consensus::value_objects::DraftReview;
use crate::core::input::{ConsensusInput, Depth};
use crate::core::provider::ProviderId;

/// A prompt ready to send to a provider: system instructions plus user turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Character length of both parts
    pub fn char_len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// Templates for generating prompts at each phase
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for the independent drafting phase
    pub fn drafting_system() -> &'static str {
        r#"You are a knowledgeable analyst contributing one independent answer to a panel.
Answer the topic using the supplied sources where they are relevant.
Be accurate and well-structured. State uncertainty explicitly instead of guessing."#
    }

    /// User prompt for drafting; identical for every provider
    pub fn drafting_prompt(input: &ConsensusInput, depth: Depth) -> Prompt {
        let mut user = format!("Topic:\n{}\n", input.topic());

        if !input.sources().is_empty() {
            user.push_str("\nSources:\n");
            for (i, source) in input.sources().iter().enumerate() {
                user.push_str(&format!("\n--- Source {} ---\n{}\n", i + 1, source));
            }
        }

        user.push_str(match depth {
            Depth::Standard => "\nWrite a concise, well-organized answer.",
            Depth::Detailed => {
                "\nWrite a thorough answer with sections, supporting evidence and caveats."
            }
        });

        Prompt::new(Self::drafting_system(), user)
    }

    /// System prompt for the peer review phase
    pub fn review_system() -> &'static str {
        r#"You are a critical reviewer evaluating an answer written by another analyst.
Assess accuracy, completeness, clarity and use of sources.
Be fair but thorough. Identify both strengths and weaknesses and suggest concrete fixes."#
    }

    /// User prompt asking one provider to review one anonymized draft
    pub fn review_prompt(topic: &str, draft: &str) -> Prompt {
        let user = format!(
            r#"Original topic: {}

--- Draft under review ---
{}

Provide:
1. A brief assessment (2-3 sentences)
2. Key strengths
3. Errors or omissions
4. A score from 1-10"#,
            topic, draft
        );
        Prompt::new(Self::review_system(), user)
    }

    /// System prompt for the arbitration phase
    pub fn arbitration_system() -> &'static str {
        r#"You are the arbiter of a panel of analysts.
You receive their independent drafts and the peer reviews of those drafts.
Produce a single final answer that:
1. Keeps points the drafts agree on
2. Resolves disagreements in favor of the better-supported position
3. Fixes errors the reviews identified
Return only the final answer."#
    }

    /// User prompt for the arbiter with every surviving draft and review
    pub fn arbitration_prompt(
        topic: &str,
        drafts: &[(ProviderId, String)],
        reviews: &[DraftReview],
    ) -> Prompt {
        let mut user = format!("Original topic: {}\n\nDrafts:\n", topic);

        for (i, (_, content)) in drafts.iter().enumerate() {
            user.push_str(&format!("\n--- {} ---\n{}\n", draft_label(i), content));
        }

        if !reviews.is_empty() {
            user.push_str("\nPeer reviews:\n");
            for review in reviews {
                let label = drafts
                    .iter()
                    .position(|(author, _)| *author == review.author)
                    .map(draft_label)
                    .unwrap_or_else(|| "Draft ?".to_string());
                user.push_str(&format!("\n--- Review of {} ---\n{}\n", label, review.content));
            }
        }

        user.push_str("\nWrite the final consensus answer.");
        Prompt::new(Self::arbitration_system(), user)
    }
}

/// Anonymous label for the draft at `index` (`Draft A`, `Draft B`, ...)
fn draft_label(index: usize) -> String {
    let letter = (b'A' + (index % 26) as u8) as char;
    format!("Draft {}", letter)
}
