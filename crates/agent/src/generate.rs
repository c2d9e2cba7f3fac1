//! Turn generation: drafting the next conversational question. The draft
//! is only a candidate; the orchestrator validates it and substitutes a
//! deterministic fallback when it breaks the dialogue protocol.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;

use civiform_core::{Category, ChatTurn, Speaker, UnfilledField};

use crate::llm::LlmClient;

/// Replies longer than this are cut at the character boundary; a chat
/// surface never needs more than a short paragraph.
const MAX_REPLY_CHARS: usize = 500;

/// Everything the generator may see about the session. Deliberately a
/// projection: no raw field ids for filled data, no completion state.
pub struct GenerationContext<'a> {
    pub category: Category,
    pub unfilled: &'a [UnfilledField],
    pub filled: &'a [(String, String)],
    pub just_extracted: &'a [(String, String)],
    pub history: &'a [ChatTurn],
    pub utterance: &'a str,
}

pub struct DialogueGenerator {
    llm: Arc<dyn LlmClient>,
}

impl DialogueGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn next_turn(&self, context: &GenerationContext<'_>) -> Result<String> {
        let prompt = build_prompt(context);
        let reply = self.llm.complete(&prompt).await?;
        Ok(truncate_reply(reply.trim()))
    }
}

fn build_prompt(context: &GenerationContext<'_>) -> String {
    let mut prompt = format!(
        "You are a civil-service assistant helping a citizen fill out the \
         {} application forms.\n\
         Acknowledge what the citizen just provided, then ask for exactly \
         one missing item. Ask in plain language using the item's \
         description, never its internal id. Your reply must end with a \
         question. Never declare the forms finished.\n",
        context.category.display_name()
    );

    if !context.just_extracted.is_empty() {
        prompt.push_str("\nJust provided by the citizen:\n");
        for (description, value) in context.just_extracted {
            let _ = writeln!(prompt, "- {description}: {value}");
        }
    }
    if !context.filled.is_empty() {
        prompt.push_str("\nAlready collected (do not ask again):\n");
        for (description, value) in context.filled {
            let _ = writeln!(prompt, "- {description}: {value}");
        }
    }
    prompt.push_str("\nStill missing (ask for the first one):\n");
    for candidate in context.unfilled.iter().take(5) {
        let _ = writeln!(prompt, "- {}", candidate.description);
    }

    if !context.history.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        for turn in context.history {
            let speaker = match turn.speaker {
                Speaker::User => "Citizen",
                Speaker::Assistant => "Assistant",
            };
            let _ = writeln!(prompt, "{speaker}: {}", turn.text);
        }
    }

    let _ = writeln!(prompt, "\nCitizen: {}", context.utterance);
    prompt.push_str("Assistant:");
    prompt
}

fn truncate_reply(reply: &str) -> String {
    if reply.chars().count() <= MAX_REPLY_CHARS {
        return reply.to_owned();
    }
    reply.chars().take(MAX_REPLY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use civiform_core::{Category, UnfilledField};

    use super::{truncate_reply, DialogueGenerator, GenerationContext};
    use crate::llm::ScriptedLlm;

    #[test]
    fn short_replies_pass_through_untouched() {
        assert_eq!(truncate_reply("What is your name?"), "What is your name?");
    }

    #[test]
    fn long_replies_are_cut_at_a_character_boundary() {
        let long = "한".repeat(600);
        let cut = truncate_reply(&long);
        assert_eq!(cut.chars().count(), 500);
    }

    #[tokio::test]
    async fn generator_trims_and_returns_the_completion() {
        let llm = Arc::new(ScriptedLlm::new(["  What is your address?  "]));
        let generator = DialogueGenerator::new(llm);
        let unfilled = vec![UnfilledField {
            document: "delegation".to_owned(),
            field: "delegator.address".to_owned(),
            description: "your address".to_owned(),
        }];
        let context = GenerationContext {
            category: Category::YouthRentSubsidy,
            unfilled: &unfilled,
            filled: &[],
            just_extracted: &[],
            history: &[],
            utterance: "hello",
        };
        let reply = generator.next_turn(&context).await.unwrap();
        assert_eq!(reply, "What is your address?");
    }
}
