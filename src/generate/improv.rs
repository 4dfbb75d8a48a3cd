//! Deterministic offline narrator.
//!
//! Continues the story from the assembled prompt without any model: it
//! echoes the player action, weaves in the first remembered fact from the
//! prompt when one is present, and closes with a hook. Phrasing is chosen by
//! hashing the prompt, so identical prompts narrate identically. Used by the
//! demo loop and the integration tests.

use async_trait::async_trait;

use super::GenerateProvider;

const OPENERS: [&str; 4] = [
    "You press on.",
    "The air shifts around you.",
    "Somewhere far off, a bell answers.",
    "Your footsteps sound louder than they should.",
];

const HOOKS: [&str; 4] = [
    "What do you do next?",
    "The silence waits for your answer.",
    "Something stirs at the edge of your sight.",
    "The path ahead divides.",
];

pub struct ImprovNarrator;

impl ImprovNarrator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImprovNarrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerateProvider for ImprovNarrator {
    async fn generate(
        &self,
        prompt: &str,
        _temperature: f64,
        max_tokens: usize,
    ) -> anyhow::Result<String> {
        let seed = prompt
            .bytes()
            .fold(0xcbf29ce484222325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x100000001b3)
            }) as usize;

        let action = prompt
            .lines()
            .rev()
            .find_map(|line| line.strip_prefix("Current player action: "))
            .unwrap_or("")
            .trim();

        let memory = prompt
            .lines()
            .find_map(|line| line.strip_prefix("- "))
            .map(str::trim);

        let mut text = String::new();
        text.push_str(OPENERS[seed % OPENERS.len()]);
        if !action.is_empty() {
            text.push_str(&format!(" As you {}, the world answers in kind.", action));
        }
        if let Some(memory) = memory {
            text.push_str(&format!(" You recall what came before: {memory}"));
            if !text.ends_with('.') {
                text.push('.');
            }
        }
        text.push(' ');
        text.push_str(HOOKS[(seed / OPENERS.len()) % HOOKS.len()]);

        // max_tokens is a soft cap; four characters per token is the usual
        // rough estimate.
        let char_cap = max_tokens.saturating_mul(4);
        if text.len() > char_cap {
            let end = text
                .char_indices()
                .take_while(|(i, _)| *i < char_cap)
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(text.len());
            text.truncate(end);
        }
        Ok(text)
    }
}
