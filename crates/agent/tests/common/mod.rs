//! Shared helpers for the control loop integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use actloop_agent::{AgentContext, AgentLoop};
use actloop_core::agent::LoopConfig;
use actloop_core::error::ProviderError;
use actloop_core::message::{Message, MessageToolCall, Role};
use actloop_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use actloop_core::tool::ToolRegistry;

/// One scripted model turn.
#[derive(Clone)]
pub enum Turn {
    /// Streamed as several small text chunks
    Text(String),
    /// Structured tool calls with no text
    Calls(Vec<MessageToolCall>),
    /// The model service fails
    Fail(ProviderError),
    /// The stream opens but never produces anything
    Stall,
}

/// A mock provider that plays scripted turns in sequence.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<ProviderRequest>>,
    /// Keeps stalled streams open
    stalled: Mutex<Vec<tokio::sync::mpsc::Sender<Result<StreamChunk, ProviderError>>>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            stalled: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Turn::Text(t.to_string())).collect())
    }

    /// Number of model calls made so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_turn(&self, request: ProviderRequest) -> Turn {
        self.requests.lock().unwrap().push(request);
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Turn::Fail(ProviderError::NotConfigured("script exhausted".into())))
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let message = match self.next_turn(request) {
            Turn::Text(text) => Message::assistant(text),
            Turn::Calls(calls) => Message::assistant_with_calls("", calls),
            Turn::Fail(e) => return Err(e),
            Turn::Stall => std::future::pending().await,
        };
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "scripted".into(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let chunks: Vec<StreamChunk> = match self.next_turn(request) {
            Turn::Text(text) => split_text(&text)
                .into_iter()
                .map(|piece| StreamChunk {
                    content: Some(piece),
                    ..StreamChunk::default()
                })
                .chain(std::iter::once(StreamChunk {
                    done: true,
                    ..StreamChunk::default()
                }))
                .collect(),
            Turn::Calls(calls) => vec![StreamChunk {
                tool_calls: calls,
                done: true,
                ..StreamChunk::default()
            }],
            Turn::Fail(e) => return Err(e),
            Turn::Stall => {
                let (tx, rx) = tokio::sync::mpsc::channel(1);
                self.stalled.lock().unwrap().push(tx);
                return Ok(rx);
            }
        };

        let (tx, rx) = tokio::sync::mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            tx.send(Ok(chunk)).await.unwrap();
        }
        Ok(rx)
    }
}

/// Split into pieces of at most 7 characters.
fn split_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(7).map(|c| c.iter().collect()).collect()
}

/// Answers arithmetic requests of the form `add A B` by itself: asks for
/// the tool on the user's turn and relays the tool result afterwards.
/// Stateless, so any number of conversations can share it.
pub struct RuleProvider;

#[async_trait::async_trait]
impl Provider for RuleProvider {
    fn name(&self) -> &str {
        "rules"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let last = request
            .messages
            .last()
            .ok_or_else(|| ProviderError::NotConfigured("empty request".into()))?;

        let text = match last.role {
            Role::Tool => format!("The result is {}.", last.content),
            _ => {
                let parts: Vec<&str> = last.content.split_whitespace().collect();
                match parts.as_slice() {
                    ["add", x, y] => {
                        format!("Action: add\nAction Input: {{\"x\": {x}, \"y\": {y}}}")
                    }
                    _ => "I can only add.".to_string(),
                }
            }
        };

        tokio::task::yield_now().await;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: "rules".into(),
        })
    }
}

pub fn tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

pub fn directive(name: &str, input: &str) -> String {
    format!("Thought: I should use {name}.\nAction: {name}\nAction Input: {input}")
}

pub fn sample_orders() -> Vec<(String, String)> {
    vec![(
        "ORD12345".to_string(),
        "Order details for 'ORD12345': Status: Shipped, Items: 1x SuperWidget, Delivery Est: Tomorrow. (Source: OMS)"
            .to_string(),
    )]
}

pub fn registry() -> Arc<ToolRegistry> {
    Arc::new(actloop_tools::default_registry(sample_orders()).unwrap())
}

pub fn agent_with(provider: Arc<dyn Provider>, config: LoopConfig) -> AgentLoop {
    let ctx = AgentContext::new(provider, registry(), "test-model").with_config(config);
    AgentLoop::new(Arc::new(ctx))
}

pub fn agent(provider: Arc<dyn Provider>) -> AgentLoop {
    agent_with(provider, LoopConfig::default())
}

/// Install a test-friendly subscriber so `RUST_LOG` works in test runs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
