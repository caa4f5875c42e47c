// Reflection Composer (spec §4.5): a pure function of (strategy, step number,
// base prompt, optional custom template) deciding whether to inject a
// <reflection> fragment ahead of the next model call.
//
// New module; no direct teacher counterpart. Grounded on
// `capabilities.rs`'s deterministic ordered-concatenation idiom for composing
// system-prompt stanzas (`"{base}\n\n{fragment}"`), generalized from a fixed
// registry of capability stanzas to a single conditional fragment.

use serde::{Deserialize, Serialize};

const DEFAULT_TEMPLATE: &str = "<reflection>\n\
Re-state the original goal in one sentence.\n\
List what has been accomplished so far.\n\
Decide the next concrete action.\n\
</reflection>";

/// Reflection injection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionStrategy {
    /// Never inject a reflection fragment.
    None,
    /// Inject at every step after step 0.
    Reflact,
    /// Inject when `step > 0 && step % frequency == 0`.
    Periodic { frequency: usize },
}

impl Default for ReflectionStrategy {
    fn default() -> Self {
        ReflectionStrategy::None
    }
}

impl ReflectionStrategy {
    pub fn periodic_default() -> Self {
        ReflectionStrategy::Periodic { frequency: 3 }
    }

    fn should_inject(&self, step: usize) -> bool {
        match self {
            ReflectionStrategy::None => false,
            ReflectionStrategy::Reflact => step > 0,
            ReflectionStrategy::Periodic { frequency } => {
                *frequency > 0 && step > 0 && step % frequency == 0
            }
        }
    }
}

/// Composes the system prompt for the next model call, injecting a
/// reflection fragment when the strategy calls for it at this step.
/// The original base prompt is always preserved in full.
pub fn compose_system_prompt(
    strategy: ReflectionStrategy,
    step: usize,
    base_prompt: &str,
    custom_template: Option<&str>,
) -> String {
    if !strategy.should_inject(step) {
        return base_prompt.to_string();
    }
    let fragment = custom_template.unwrap_or(DEFAULT_TEMPLATE);
    format!("{base_prompt}\n\n{fragment}")
}

/// Approximate token count of the fragment this strategy would inject at
/// `step` (character count / 4; zero when nothing would be injected).
pub fn estimate_fragment_tokens(
    strategy: ReflectionStrategy,
    step: usize,
    custom_template: Option<&str>,
) -> usize {
    if !strategy.should_inject(step) {
        return 0;
    }
    let fragment = custom_template.unwrap_or(DEFAULT_TEMPLATE);
    fragment.len() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_injects() {
        let prompt = compose_system_prompt(ReflectionStrategy::None, 5, "base", None);
        assert_eq!(prompt, "base");
    }

    #[test]
    fn reflact_injects_after_step_zero() {
        assert_eq!(
            compose_system_prompt(ReflectionStrategy::Reflact, 0, "base", None),
            "base"
        );
        assert!(compose_system_prompt(ReflectionStrategy::Reflact, 1, "base", None).contains("<reflection>"));
        assert!(compose_system_prompt(ReflectionStrategy::Reflact, 7, "base", None).contains("<reflection>"));
    }

    #[test]
    fn periodic_injects_on_multiples_of_frequency() {
        let strategy = ReflectionStrategy::Periodic { frequency: 3 };
        for step in 0..9 {
            let injected =
                compose_system_prompt(strategy, step, "base", None).contains("<reflection>");
            assert_eq!(injected, step > 0 && step % 3 == 0, "step {step}");
        }
    }

    #[test]
    fn base_prompt_is_preserved_in_full() {
        let prompt = compose_system_prompt(ReflectionStrategy::Reflact, 1, "You are Agentloom.", None);
        assert!(prompt.starts_with("You are Agentloom.\n\n"));
    }

    #[test]
    fn custom_template_is_used_when_provided() {
        let prompt = compose_system_prompt(
            ReflectionStrategy::Reflact,
            1,
            "base",
            Some("<reflection>custom</reflection>"),
        );
        assert!(prompt.ends_with("<reflection>custom</reflection>"));
    }

    #[test]
    fn token_estimate_is_zero_when_not_injecting() {
        assert_eq!(estimate_fragment_tokens(ReflectionStrategy::None, 5, None), 0);
    }

    #[test]
    fn token_estimate_matches_char_count_over_four() {
        let estimate = estimate_fragment_tokens(ReflectionStrategy::Reflact, 1, None);
        assert_eq!(estimate, DEFAULT_TEMPLATE.len() / 4);
    }
}
