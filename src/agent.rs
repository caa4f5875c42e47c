// Agent factory and live instance (spec §3 `AgentConfig`/`Agent`, §6 external
// factory surface).
//
// `AgentConfig` keeps a fluent `with_*` builder. `Agent`'s lazy-exactly-once
// initialisation on first `stream()`/`init()` assembles the underlying
// engine from `AgentDeps` on first use and reuses it after.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::{sanitize_state_segment, BootConfig};
use crate::durable::RuntimeDetector;
use crate::error::Result;
use crate::guardrail::GuardrailRunner;
use crate::llm::LlmDriver;
use crate::loop_engine::{StreamHandle, ToolLoopEngine, UsageLimits};
use crate::memory::{load_memory_context, InMemoryMemoryStore, MemoryStore, UserPreferences};
use crate::reflection::ReflectionStrategy;
use crate::spawner::{ChildAgentSpec, CreateAgentFn, RoleRegistry, SpawnAgentTool, SpawnerConfig};
use crate::system_prompt::{build_system_prompt, SystemContext, SystemPromptInputs};
use crate::tool::{Tool, ToolRegistry};

const DEFAULT_MAX_STEPS: usize = 25;
const STATE_ROOT_DIRNAME: &str = ".agentloom";

/// Immutable agent definition (spec §3 `AgentConfig`). Construct with
/// [`AgentConfig::new`], customise with the `with_*` builders, then hand to
/// [`create_agent`].
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
    pub workspace_root: Option<String>,
    pub model: Option<String>,
    pub max_steps: usize,
    pub usage_limits: Option<UsageLimits>,
    tools: Vec<Arc<dyn Tool>>,
}

impl AgentConfig {
    /// `name` must be unique among an agent's siblings: it becomes both the
    /// loop's `agent_id` and (sanitised) its state-directory segment.
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            workspace_root: None,
            model: None,
            max_steps: DEFAULT_MAX_STEPS,
            usage_limits: None,
            tools: Vec::new(),
        }
    }

    pub fn with_workspace_root(mut self, root: impl Into<String>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_usage_limits(mut self, limits: UsageLimits) -> Self {
        self.usage_limits = Some(limits);
        self
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }
}

/// Collaborators shared across every agent a process creates: the LLM
/// driver(s), durable-runtime detector, memory store, guardrails, reflection
/// strategy, and sub-agent spawning policy. Cheap to clone — every field is
/// already reference-counted or `Copy`.
#[derive(Clone)]
pub struct AgentDeps {
    pub llm: Arc<dyn LlmDriver>,
    pub fast_llm: Arc<dyn LlmDriver>,
    pub default_model: String,
    pub fast_model: String,
    pub memory: Arc<dyn MemoryStore>,
    pub runtime_detector: Arc<RuntimeDetector>,
    pub guardrails: Arc<GuardrailRunner>,
    pub reflection_strategy: ReflectionStrategy,
    pub spawner_config: SpawnerConfig,
    pub role_registry: RoleRegistry,
    pub state_root: PathBuf,
}

impl AgentDeps {
    pub fn new(
        llm: Arc<dyn LlmDriver>,
        fast_llm: Arc<dyn LlmDriver>,
        default_model: impl Into<String>,
        fast_model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            fast_llm,
            default_model: default_model.into(),
            fast_model: fast_model.into(),
            memory: Arc::new(InMemoryMemoryStore::new()),
            runtime_detector: Arc::new(RuntimeDetector::new()),
            guardrails: Arc::new(GuardrailRunner::with_default_output_guardrails()),
            reflection_strategy: ReflectionStrategy::default(),
            spawner_config: SpawnerConfig::default(),
            role_registry: RoleRegistry::with_defaults(),
            state_root: default_state_root(),
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_runtime_detector(mut self, detector: Arc<RuntimeDetector>) -> Self {
        self.runtime_detector = detector;
        self
    }

    pub fn with_guardrails(mut self, guardrails: Arc<GuardrailRunner>) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_reflection_strategy(mut self, strategy: ReflectionStrategy) -> Self {
        self.reflection_strategy = strategy;
        self
    }

    pub fn with_spawner_config(mut self, config: SpawnerConfig) -> Self {
        self.spawner_config = config;
        self
    }

    pub fn with_role_registry(mut self, registry: RoleRegistry) -> Self {
        self.role_registry = registry;
        self
    }

    pub fn with_state_root(mut self, root: PathBuf) -> Self {
        self.state_root = root;
        self
    }

    /// Applies the `MODEL_FAST`/`MODEL_STANDARD`/`DEFAULT_MAX_SPAWN_DEPTH`
    /// overrides from a resolved `BootConfig`, keeping the caller-supplied
    /// defaults for anything boot config leaves unset.
    pub fn with_boot_config(mut self, boot: &BootConfig) -> Self {
        if let Some(model) = &boot.model_standard {
            self.default_model = model.clone();
        }
        if let Some(model) = &boot.model_fast {
            self.fast_model = model.clone();
        }
        self.spawner_config.max_spawn_depth = boot.default_max_spawn_depth;
        self
    }
}

fn default_state_root() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(STATE_ROOT_DIRNAME)
}

/// A live agent instance: `AgentConfig` plus the async resources (memory
/// recall, assembled tool registry, composed system prompt) assembled lazily
/// on first use (spec §3: "initialise lazily, exactly once, on first
/// `stream()`; subsequent calls await the same initialisation").
pub struct Agent {
    config: AgentConfig,
    deps: AgentDeps,
    agent_id: String,
    spawn_depth: usize,
    parent_agent_id: Option<String>,
    state_dir: PathBuf,
    engine: OnceCell<Arc<ToolLoopEngine>>,
}

/// Creates a top-level agent (spawn depth 0, no parent). This is the
/// `createAgent(config)` entry point from spec §6.
pub fn create_agent(config: AgentConfig, deps: AgentDeps) -> Arc<Agent> {
    let agent_id = config.name.clone();
    let state_dir = deps.state_root.join("agents").join(sanitize_state_segment(&config.name));
    Arc::new(Agent {
        config,
        deps,
        agent_id,
        spawn_depth: 0,
        parent_agent_id: None,
        state_dir,
        engine: OnceCell::new(),
    })
}

impl Agent {
    pub fn state_dir(&self) -> &std::path::Path {
        &self.state_dir
    }

    pub fn spawn_depth(&self) -> usize {
        self.spawn_depth
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn parent_agent_id(&self) -> Option<&str> {
        self.parent_agent_id.as_deref()
    }

    /// Resolves memory and assembles the tool-loop engine if this is the
    /// first call; idempotent and safe to call concurrently.
    pub async fn init(&self) -> Result<()> {
        self.engine_or_init().await.map(|_| ())
    }

    pub async fn stream(&self, prompt: impl Into<String>) -> Result<StreamHandle> {
        let engine = self.engine_or_init().await?;
        Ok(engine.stream(prompt))
    }

    pub async fn get_system_prompt(&self) -> Result<String> {
        let engine = self.engine_or_init().await?;
        Ok(engine.system_prompt.clone())
    }

    pub async fn get_tool_names(&self) -> Result<Vec<String>> {
        let engine = self.engine_or_init().await?;
        Ok(engine.tools.tool_names().into_iter().map(str::to_string).collect())
    }

    async fn engine_or_init(&self) -> Result<Arc<ToolLoopEngine>> {
        let engine = self.engine.get_or_try_init(|| self.build_engine()).await?;
        Ok(Arc::clone(engine))
    }

    async fn build_engine(&self) -> Result<Arc<ToolLoopEngine>> {
        let memory_context = load_memory_context(
            self.deps.memory.as_ref(),
            &self.config.instructions,
            UserPreferences::default(),
        )
        .await;

        let now = chrono::Utc::now();
        let environment = SystemContext {
            current_time: now.to_rfc3339(),
            date: now.format("%Y-%m-%d").to_string(),
            timezone: "UTC".to_string(),
            locale: "en-US".to_string(),
            platform: std::env::consts::OS.to_string(),
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            user_name: None,
            workspace_root: self.config.workspace_root.clone(),
            workspace_map: None,
        };

        let system_prompt = build_system_prompt(&SystemPromptInputs {
            agent_name: &self.config.name,
            instructions: Some(&self.config.instructions),
            skills_block: None,
            environment: Some(&environment),
            preferences: memory_context.preferences,
            memory_context_block: Some(&memory_context.context_block),
        });

        let mut registry = ToolRegistry::new();
        for tool in &self.config.tools {
            registry.register_arc(Arc::clone(tool));
        }

        let allow_spawn = self.spawn_depth < self.deps.spawner_config.max_spawn_depth;
        if allow_spawn {
            registry.register(SpawnAgentTool::new(
                self.agent_id.clone(),
                self.spawn_depth,
                self.deps.spawner_config.clone(),
                self.deps.role_registry.clone(),
                make_create_agent_fn(self.deps.clone()),
                Arc::clone(&self.deps.fast_llm),
                self.deps.fast_model.clone(),
                self.config.workspace_root.clone(),
            ));
        }

        let model = self.config.model.clone().unwrap_or_else(|| self.deps.default_model.clone());

        let mut engine = ToolLoopEngine::new(
            self.agent_id.clone(),
            Arc::new(registry),
            Arc::clone(&self.deps.llm),
            system_prompt,
            model,
        )
        .with_max_steps(self.config.max_steps)
        .with_reflection_strategy(self.deps.reflection_strategy)
        .with_guardrails(Arc::clone(&self.deps.guardrails))
        .with_runtime_detector(Arc::clone(&self.deps.runtime_detector));

        if let Some(limits) = self.config.usage_limits {
            engine = engine.with_usage_limits(limits);
        }

        Ok(Arc::new(engine))
    }
}

/// Builds the `CreateAgentFn` a `SpawnAgentTool` uses to materialise a child.
/// Children are assembled synchronously (spec §9 redesign note: spawning
/// must not itself suspend the parent's step), so a child gets a plain
/// `ToolLoopEngine` straight from its `ChildAgentSpec` rather than the full
/// memory-aware `Agent` lifecycle a top-level `create_agent` call goes
/// through — its instructions already come fully formed from the spawner's
/// `RoleRegistry`.
fn make_create_agent_fn(deps: AgentDeps) -> Arc<CreateAgentFn> {
    Arc::new(move |spec: ChildAgentSpec| build_child_engine(spec, &deps))
}

fn build_child_engine(spec: ChildAgentSpec, deps: &AgentDeps) -> Arc<ToolLoopEngine> {
    let mut registry = ToolRegistry::new();

    if spec.allow_spawn {
        registry.register(SpawnAgentTool::new(
            spec.agent_id.clone(),
            spec.spawn_depth,
            deps.spawner_config.clone(),
            deps.role_registry.clone(),
            make_create_agent_fn(deps.clone()),
            Arc::clone(&deps.fast_llm),
            deps.fast_model.clone(),
            spec.workspace_root.clone(),
        ));
    }

    let engine = ToolLoopEngine::new(
        spec.agent_id,
        Arc::new(registry),
        Arc::clone(&deps.llm),
        spec.instructions,
        deps.default_model.clone(),
    )
    .with_max_steps(spec.max_steps)
    .with_reflection_strategy(deps.reflection_strategy)
    .with_guardrails(Arc::clone(&deps.guardrails))
    .with_runtime_detector(Arc::clone(&deps.runtime_detector));

    Arc::new(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ScriptedLlmDriver, ScriptedResponse};

    fn deps_with(driver: ScriptedLlmDriver, tmp_root: PathBuf) -> AgentDeps {
        let llm: Arc<dyn LlmDriver> = Arc::new(driver);
        AgentDeps::new(Arc::clone(&llm), llm, "test-model", "test-model-fast").with_state_root(tmp_root)
    }

    #[tokio::test]
    async fn init_is_idempotent_and_assembles_a_usable_engine() {
        let driver = ScriptedLlmDriver::new();
        driver.add_response(ScriptedResponse::text("hello there")).await;
        let deps = deps_with(driver, std::env::temp_dir().join("agentloom-test-init"));

        let config = AgentConfig::new("greeter", "Greet the user warmly.");
        let agent = create_agent(config, deps);

        agent.init().await.unwrap();
        agent.init().await.unwrap();

        let prompt = agent.get_system_prompt().await.unwrap();
        assert!(prompt.contains("Greet the user warmly."));
        assert!(prompt.contains("You are greeter"));
    }

    #[tokio::test]
    async fn stream_triggers_lazy_init_on_first_call() {
        let driver = ScriptedLlmDriver::new();
        driver.add_response(ScriptedResponse::text("done")).await;
        let deps = deps_with(driver, std::env::temp_dir().join("agentloom-test-stream"));

        let config = AgentConfig::new("worker", "Do the task.");
        let agent = create_agent(config, deps);

        let handle = agent.stream("go").await.unwrap();
        let text = handle.text.await.unwrap();
        assert_eq!(text, "done");
    }

    #[tokio::test]
    async fn root_agent_registers_spawn_agent_tool_when_depth_allows() {
        let driver = ScriptedLlmDriver::new();
        let deps = deps_with(driver, std::env::temp_dir().join("agentloom-test-spawn"));

        let config = AgentConfig::new("lead", "Coordinate sub-agents.");
        let agent = create_agent(config, deps);

        let tools = agent.get_tool_names().await.unwrap();
        assert!(tools.contains(&"spawn_agent".to_string()));
    }

    #[tokio::test]
    async fn agent_with_max_spawn_depth_zero_has_no_spawn_tool() {
        let driver = ScriptedLlmDriver::new();
        let deps = deps_with(driver, std::env::temp_dir().join("agentloom-test-no-spawn"))
            .with_spawner_config(SpawnerConfig {
                max_spawn_depth: 0,
                ..SpawnerConfig::default()
            });

        let config = AgentConfig::new("solo", "Work alone.");
        let agent = create_agent(config, deps);

        let tools = agent.get_tool_names().await.unwrap();
        assert!(!tools.contains(&"spawn_agent".to_string()));
    }

    #[test]
    fn boot_config_overrides_models_and_spawn_depth() {
        let driver = ScriptedLlmDriver::new();
        let deps = deps_with(driver, std::env::temp_dir().join("agentloom-test-boot-config"));
        let boot = BootConfig {
            model_fast: Some("fast-override".to_string()),
            model_standard: Some("standard-override".to_string()),
            default_max_spawn_depth: 0,
            ..BootConfig::default()
        };
        let deps = deps.with_boot_config(&boot);
        assert_eq!(deps.fast_model, "fast-override");
        assert_eq!(deps.default_model, "standard-override");
        assert_eq!(deps.spawner_config.max_spawn_depth, 0);
    }

    #[test]
    fn state_dir_is_sanitised_under_the_state_root() {
        let driver = ScriptedLlmDriver::new();
        let root = std::env::temp_dir().join("agentloom-test-state-dir");
        let deps = deps_with(driver, root.clone());
        let config = AgentConfig::new("Research Agent #1", "x");
        let agent = create_agent(config, deps);
        assert_eq!(
            agent.state_dir(),
            root.join("agents").join("research_agent__1").as_path()
        );
    }
}
