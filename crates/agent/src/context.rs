//! Shared, immutable context for running conversations.
//!
//! Built once at startup and handed to every conversation through an
//! `Arc`. Nothing in here changes after construction.

use actloop_config::AppConfig;
use actloop_core::agent::{LoopConfig, MAX_ITERATIONS_CEILING};
use actloop_core::provider::Provider;
use actloop_core::tool::ToolRegistry;
use actloop_providers::OpenAiCompatProvider;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AgentContext {
    /// The model service
    pub provider: Arc<dyn Provider>,

    pub tools: Arc<ToolRegistry>,

    /// Loop settings
    pub config: LoopConfig,

    pub model: String,

    pub temperature: f32,

    pub max_tokens: Option<u32>,
}

impl AgentContext {
    /// Create a context with default loop settings and temperature 0.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            config: LoopConfig::default(),
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    /// Replace the loop settings. `max_iterations` is clamped to
    /// `1..=MAX_ITERATIONS_CEILING`.
    pub fn with_config(mut self, mut config: LoopConfig) -> Self {
        let clamped = config.max_iterations.clamp(1, MAX_ITERATIONS_CEILING);
        if clamped != config.max_iterations {
            warn!(
                requested = config.max_iterations,
                using = clamped,
                "max_iterations out of range, clamping"
            );
            config.max_iterations = clamped;
        }
        self.config = config;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Build the model client and the built-in tools from configuration.
    pub fn from_app_config(config: &AppConfig) -> actloop_core::Result<Self> {
        let provider = OpenAiCompatProvider::from_config(&config.provider)?;
        let tools = actloop_tools::default_registry(config.tools.orders.clone())?;

        info!(
            provider = %config.provider.name,
            base_url = %config.provider.base_url,
            model = %config.provider.model,
            tools = tools.len(),
            "Agent context ready"
        );

        let mut ctx = Self::new(Arc::new(provider), Arc::new(tools), config.provider.model.clone())
            .with_config(config.agent.clone())
            .with_temperature(config.provider.temperature);
        ctx.max_tokens = config.provider.max_tokens;
        Ok(ctx)
    }

    /// The system instruction sent ahead of every transcript.
    pub fn system_prompt(&self) -> String {
        crate::prompt::system_prompt(&self.config, &self.tools)
    }
}
