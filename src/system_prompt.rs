// System Prompt Builder (spec §4.8): deterministic, ordered composition of
// the agent's system prompt: base sentence, instructions, capabilities
// stanza, skills, environment/context, and (prepended) memory context.

use crate::memory::UserPreferences;

const CAPABILITIES_STANZA: &str = "\
You can read and write files, run shell commands, search code, browse the \
web, reason step by step, plan multi-step tasks, recall and store \
persistent memory, and respond conversationally to greetings and small talk.";

/// Environment facts resolved at agent initialisation (spec §3 `SystemContext`,
/// excluding the memory-derived preferences/profile block, which the caller
/// supplies separately via `MemoryContext`).
#[derive(Debug, Clone)]
pub struct SystemContext {
    pub current_time: String,
    pub date: String,
    pub timezone: String,
    pub locale: String,
    pub platform: String,
    pub hostname: String,
    pub user_name: Option<String>,
    pub workspace_root: Option<String>,
    pub workspace_map: Option<String>,
}

impl SystemContext {
    fn render(&self, preferences: &UserPreferences) -> String {
        let mut lines = vec![
            format!("Current time: {}", self.current_time),
            format!("Date: {}", self.date),
            format!("Timezone: {}", self.timezone),
            format!("Locale: {}", self.locale),
            format!("Platform: {}", self.platform),
            format!("Host: {}", self.hostname),
        ];
        if let Some(user) = &self.user_name {
            lines.push(format!("User: {user}"));
        }
        if let Some(root) = &self.workspace_root {
            lines.push(format!("Workspace root: {root}"));
        }
        if let Some(map) = &self.workspace_map {
            lines.push(format!("Workspace contents:\n{map}"));
        }
        if let Some(pref) = render_preferences(preferences) {
            lines.push(pref);
        }
        format!("<environment>\n{}\n</environment>", lines.join("\n"))
    }
}

fn render_preferences(preferences: &UserPreferences) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(name) = &preferences.name {
        parts.push(format!("Preferred name: {name}"));
    }
    if let Some(language) = &preferences.language {
        parts.push(format!("Preferred language: {language}"));
    }
    if let Some(style) = &preferences.communication_style {
        parts.push(format!("Preferred communication style: {style:?}"));
    }
    if let Some(code_style) = &preferences.code_style {
        parts.push(format!("Preferred code style: {code_style}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Inputs to the System Prompt Builder. All fields besides `agent_name` are
/// optional; omitting a section simply skips it (no empty stanza emitted).
#[derive(Debug, Clone, Default)]
pub struct SystemPromptInputs<'a> {
    pub agent_name: &'a str,
    pub instructions: Option<&'a str>,
    pub skills_block: Option<&'a str>,
    pub environment: Option<&'a SystemContext>,
    pub preferences: UserPreferences,
    /// The memory context block from §4.7, prepended on first init only.
    pub memory_context_block: Option<&'a str>,
}

/// Composes the system prompt in a fixed section order. Deterministic:
/// identical inputs always produce a byte-identical prompt.
pub fn build_system_prompt(inputs: &SystemPromptInputs) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(memory_block) = inputs.memory_context_block {
        if !memory_block.is_empty() {
            sections.push(memory_block.to_string());
        }
    }

    sections.push(format!(
        "You are {}, an autonomous coding and research agent.",
        inputs.agent_name
    ));

    if let Some(instructions) = inputs.instructions {
        if !instructions.is_empty() {
            sections.push(instructions.to_string());
        }
    }

    sections.push(CAPABILITIES_STANZA.to_string());

    if let Some(skills) = inputs.skills_block {
        if !skills.is_empty() {
            sections.push(skills.to_string());
        }
    }

    if let Some(env) = inputs.environment {
        sections.push(env.render(&inputs.preferences));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs<'a>(name: &'a str) -> SystemPromptInputs<'a> {
        SystemPromptInputs {
            agent_name: name,
            ..Default::default()
        }
    }

    #[test]
    fn identical_inputs_produce_identical_prompts() {
        let a = build_system_prompt(&base_inputs("agentloom"));
        let b = build_system_prompt(&base_inputs("agentloom"));
        assert_eq!(a, b);
    }

    #[test]
    fn base_sentence_identifies_agent_by_name() {
        let prompt = build_system_prompt(&base_inputs("coder-1"));
        assert!(prompt.contains("You are coder-1"));
    }

    #[test]
    fn instructions_are_included_when_present() {
        let mut inputs = base_inputs("agentloom");
        inputs.instructions = Some("Always write tests first.");
        let prompt = build_system_prompt(&inputs);
        assert!(prompt.contains("Always write tests first."));
    }

    #[test]
    fn capabilities_stanza_is_always_present() {
        let prompt = build_system_prompt(&base_inputs("agentloom"));
        assert!(prompt.contains("persistent memory"));
    }

    #[test]
    fn memory_context_is_prepended_before_base_sentence() {
        let mut inputs = base_inputs("agentloom");
        inputs.memory_context_block = Some("<persistent-context>note</persistent-context>");
        let prompt = build_system_prompt(&inputs);
        let memory_pos = prompt.find("persistent-context").unwrap();
        let base_pos = prompt.find("You are agentloom").unwrap();
        assert!(memory_pos < base_pos);
    }

    #[test]
    fn environment_block_includes_workspace_and_preferences() {
        let mut inputs = base_inputs("agentloom");
        let ctx = SystemContext {
            current_time: "12:00".into(),
            date: "2026-07-29".into(),
            timezone: "UTC".into(),
            locale: "en-US".into(),
            platform: "linux".into(),
            hostname: "box".into(),
            user_name: Some("jane".into()),
            workspace_root: Some("/workspace".into()),
            workspace_map: None,
        };
        inputs.environment = Some(&ctx);
        inputs.preferences = UserPreferences {
            name: Some("Jane".into()),
            ..Default::default()
        };
        let prompt = build_system_prompt(&inputs);
        assert!(prompt.contains("Workspace root: /workspace"));
        assert!(prompt.contains("Preferred name: Jane"));
    }

    #[test]
    fn empty_optional_sections_are_skipped_without_blank_stanzas() {
        let prompt = build_system_prompt(&base_inputs("agentloom"));
        assert!(!prompt.contains("\n\n\n\n"));
    }
}
