//! The control loop: call the model, parse, dispatch, repeat.
//!
//! One conversation runs strictly sequentially. Many conversations may run
//! at once against the same [`AgentContext`]; each keeps its own
//! [`LoopState`] and transcript.

use actloop_core::agent::{ActionFormat, FailurePolicy};
use actloop_core::message::{Message, Role, Transcript};
use actloop_core::provider::ProviderRequest;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::AgentContext;
use crate::dispatcher::{DispatchError, DispatchRecord, Dispatcher};
use crate::error::AgentError;
use crate::parser::{ParsedAction, ResponseParser};
use crate::state::{self, LoopState, Status, TerminationReason, Transition};
use crate::stream_event::LoopEvent;

/// Shown when the model's final answer is blank.
pub const EMPTY_ANSWER_MESSAGE: &str =
    "The model returned an empty answer. Please rephrase the request and try again.";

const CANCELLED_MESSAGE: &str = "The request was cancelled before it finished.";

/// How a conversation ended.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub reason: TerminationReason,
    pub status: Status,
    /// Human-readable text for the user, on every terminal path
    pub final_message: String,
    pub iterations: u32,
    pub tool_calls_made: u32,
    /// Every dispatch, in order
    pub dispatches: Vec<DispatchRecord>,
}

impl LoopOutcome {
    pub fn is_completed(&self) -> bool {
        self.reason == TerminationReason::Completed
    }
}

/// A conversation running in the background.
pub struct LoopStream {
    /// Events in order; `terminated` is always last
    pub events: mpsc::Receiver<LoopEvent>,
    /// Resolves to the final transcript and result
    pub handle: JoinHandle<(Transcript, Result<LoopOutcome, AgentError>)>,
}

fn count_since(transcript: &Transcript, start: usize, role: Role) -> u32 {
    transcript.messages()[start.min(transcript.len())..]
        .iter()
        .filter(|m| m.role == role)
        .count() as u32
}

/// The control loop. Cheap to clone; clones share the context.
#[derive(Clone)]
pub struct AgentLoop {
    ctx: Arc<AgentContext>,
}

impl AgentLoop {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// Run until a terminal state. The transcript must end with the user's
    /// message; model turns and tool results are appended to it.
    pub async fn run(&self, transcript: &mut Transcript) -> Result<LoopOutcome, AgentError> {
        self.run_with_cancel(transcript, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), stopping cooperatively once `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        transcript: &mut Transcript,
        cancel: CancellationToken,
    ) -> Result<LoopOutcome, AgentError> {
        self.drive(transcript, &cancel, None).await
    }

    /// Streaming variant of [`run`](Self::run).
    ///
    /// The loop runs in a background task. Dropping the event receiver
    /// cancels it; `cancel` itself is never triggered by this method.
    pub fn run_stream(&self, mut transcript: Transcript, cancel: CancellationToken) -> LoopStream {
        let (tx, rx) = mpsc::channel::<LoopEvent>(128);
        let this = self.clone();
        let cancel = cancel.child_token();

        let handle = tokio::spawn(async move {
            let start = transcript.len();
            let result = this.drive(&mut transcript, &cancel, Some(&tx)).await;

            let terminated = match &result {
                Ok(outcome) => LoopEvent::Terminated {
                    conversation_id: transcript.id.to_string(),
                    reason: outcome.reason,
                    final_message: outcome.final_message.clone(),
                    iterations: outcome.iterations,
                    tool_calls_made: outcome.tool_calls_made,
                },
                Err(e) => {
                    if let Some(kind) = e.kind() {
                        let error = LoopEvent::Error {
                            kind,
                            message: e.to_string(),
                        };
                        this.emit(Some(&tx), &cancel, error).await;
                    }
                    LoopEvent::Terminated {
                        conversation_id: transcript.id.to_string(),
                        reason: TerminationReason::ModelUnavailable,
                        final_message: format!("I could not reach the language model: {e}"),
                        iterations: count_since(&transcript, start, Role::Assistant),
                        tool_calls_made: count_since(&transcript, start, Role::Tool),
                    }
                }
            };
            this.emit(Some(&tx), &cancel, terminated).await;

            (transcript, result)
        });

        LoopStream { events: rx, handle }
    }

    async fn drive(
        &self,
        transcript: &mut Transcript,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<LoopEvent>>,
    ) -> Result<LoopOutcome, AgentError> {
        if transcript.count_role(Role::User) == 0 {
            return Err(AgentError::EmptyTranscript);
        }

        let config = &self.ctx.config;
        let max_iterations = config.max_iterations;
        let parser = ResponseParser::from_config(config);
        let dispatcher = Dispatcher::new(&self.ctx.tools);
        let mut state = LoopState::new();
        let mut dispatches: Vec<DispatchRecord> = Vec::new();

        info!(
            conversation_id = %transcript.id,
            max_iterations,
            model = %self.ctx.model,
            "Starting control loop"
        );

        loop {
            // ── awaiting_model ──
            if cancel.is_cancelled() {
                return Ok(self.cancelled(&mut state, dispatches));
            }

            debug!(
                conversation_id = %transcript.id,
                iteration = state.iteration_count + 1,
                "Awaiting model"
            );

            let Some(message) = self.model_turn(transcript, cancel, events).await? else {
                return Ok(self.cancelled(&mut state, dispatches));
            };

            // ── parsing ──
            transcript.push(message);
            state.begin_parsing();
            let parsed = parser.parse_transcript(transcript, &self.ctx.tools);

            let mut call = match state::decide(
                &parsed,
                state.iteration_count,
                max_iterations,
                state.failed_dispatch_pending,
            ) {
                Transition::Dispatch(call) => call,
                Transition::Terminate(reason) => {
                    let message = self.explain(reason, &parsed, transcript, dispatches.last());
                    return Ok(self.finish(&mut state, reason, message, dispatches));
                }
            };

            // ── dispatching ──
            state.begin_dispatch();
            let call_id = call
                .call_id
                .get_or_insert_with(|| format!("call_{}", uuid::Uuid::new_v4().simple()))
                .clone();
            self.emit(
                events,
                cancel,
                LoopEvent::ToolStarted {
                    call_id,
                    name: call.tool_name.clone(),
                    input: serde_json::Value::Object(call.arguments.clone()),
                },
            )
            .await;

            let dispatched = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = dispatcher.dispatch(&call, transcript) => Some(result),
            };

            let record = match dispatched {
                None => {
                    return Ok(self.cancelled(&mut state, dispatches));
                }
                Some(Ok(record)) => record,
                Some(Err(DispatchError::UnknownTool(name))) => {
                    // The parser only yields registered names; treat a miss like one
                    let parsed = ParsedAction::UnknownTool { name };
                    let reason = TerminationReason::UnknownTool;
                    let message = self.explain(reason, &parsed, transcript, None);
                    return Ok(self.finish(&mut state, reason, message, dispatches));
                }
            };

            self.emit(
                events,
                cancel,
                LoopEvent::ToolFinished {
                    call_id: record.call_id.clone(),
                    name: record.tool_name.clone(),
                    output: record.content.clone(),
                    outcome: record.outcome,
                },
            )
            .await;

            let failed = record.outcome.is_failure();
            state.finish_dispatch(failed);
            dispatches.push(record);

            if failed && config.on_tool_error == FailurePolicy::Terminate {
                let reason = TerminationReason::DispatchFailed;
                let message = self.explain(reason, &parsed, transcript, dispatches.last());
                return Ok(self.finish(&mut state, reason, message, dispatches));
            }
        }
    }

    /// One model call. `None` if cancelled before the response completed.
    async fn model_turn(
        &self,
        transcript: &Transcript,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<LoopEvent>>,
    ) -> Result<Option<Message>, AgentError> {
        let request = self.build_request(transcript);

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            stream = self.ctx.provider.stream(request) => stream,
        };
        let mut rx = stream.map_err(|e| {
            warn!(provider = %self.ctx.provider.name(), error = %e, "Model call failed");
            AgentError::ModelUnavailable(e)
        })?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                next = rx.recv() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if let Some(text) = chunk.content
                        && !text.is_empty()
                    {
                        content.push_str(&text);
                        self.emit(events, cancel, LoopEvent::ModelChunk { content: text }).await;
                    }
                    tool_calls.extend(chunk.tool_calls);
                    if chunk.done {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(provider = %self.ctx.provider.name(), error = %e, "Model stream failed");
                    return Err(AgentError::ModelUnavailable(e));
                }
                None => break,
            }
        }

        Ok(Some(Message::assistant_with_calls(content, tool_calls)))
    }

    fn build_request(&self, transcript: &Transcript) -> ProviderRequest {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message::system(self.ctx.system_prompt()));
        messages.extend(transcript.iter().cloned());

        let tools = match self.ctx.config.action_format {
            ActionFormat::Native => self.ctx.tools.definitions(),
            ActionFormat::Text => Vec::new(),
        };

        ProviderRequest {
            model: self.ctx.model.clone(),
            messages,
            temperature: self.ctx.temperature,
            max_tokens: self.ctx.max_tokens,
            tools,
            stop: vec![],
        }
    }

    /// Forward an event. A closed receiver cancels the conversation.
    ///
    /// A full channel only applies backpressure until `cancel` fires; after
    /// that, events that do not fit are dropped.
    async fn emit(
        &self,
        events: Option<&mpsc::Sender<LoopEvent>>,
        cancel: &CancellationToken,
        event: LoopEvent,
    ) {
        let Some(tx) = events else {
            return;
        };

        let closed = if cancel.is_cancelled() {
            matches!(tx.try_send(event), Err(mpsc::error::TrySendError::Closed(_)))
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                sent = tx.send(event) => sent.is_err(),
            }
        };

        if closed {
            debug!("Event receiver dropped, cancelling conversation");
            cancel.cancel();
        }
    }

    fn cancelled(&self, state: &mut LoopState, dispatches: Vec<DispatchRecord>) -> LoopOutcome {
        self.finish(state, TerminationReason::Cancelled, CANCELLED_MESSAGE.into(), dispatches)
    }

    fn finish(
        &self,
        state: &mut LoopState,
        reason: TerminationReason,
        final_message: String,
        dispatches: Vec<DispatchRecord>,
    ) -> LoopOutcome {
        state.terminate(reason);
        if reason == TerminationReason::Completed {
            info!(
                iterations = state.iteration_count,
                tool_calls = state.tool_calls_made,
                "Control loop completed"
            );
        } else {
            warn!(
                %reason,
                iterations = state.iteration_count,
                tool_calls = state.tool_calls_made,
                "Control loop stopped"
            );
        }

        LoopOutcome {
            reason,
            status: state.status,
            final_message,
            iterations: state.iteration_count,
            tool_calls_made: state.tool_calls_made,
            dispatches,
        }
    }

    /// The message shown to the user for a terminal transition.
    fn explain(
        &self,
        reason: TerminationReason,
        parsed: &ParsedAction,
        transcript: &Transcript,
        last_dispatch: Option<&DispatchRecord>,
    ) -> String {
        match (reason, parsed) {
            (TerminationReason::Completed, _) => {
                let answer = transcript
                    .last_assistant()
                    .map(|m| m.content.trim())
                    .unwrap_or_default();
                if answer.is_empty() {
                    EMPTY_ANSWER_MESSAGE.to_string()
                } else {
                    answer.to_string()
                }
            }
            (TerminationReason::UnknownTool, ParsedAction::UnknownTool { name }) => format!(
                "I can't do that: there is no tool named '{name}'. Available tools: {}.",
                self.ctx.tools.names().join(", ")
            ),
            (TerminationReason::Malformed, ParsedAction::Malformed { tool_name, reason }) => {
                match tool_name {
                    Some(tool) => format!(
                        "I couldn't run '{tool}' because its input was malformed: {reason}."
                    ),
                    None => format!("I couldn't understand the requested action: {reason}."),
                }
            }
            (TerminationReason::MultipleActions, ParsedAction::MultipleActions { count }) => {
                format!(
                    "I can only perform one action at a time, but {count} were requested. \
                     Please ask for one thing at a time."
                )
            }
            (TerminationReason::IterationLimit, _) => format!(
                "I stopped after {} model turns without reaching a final answer.",
                self.ctx.config.max_iterations
            ),
            (TerminationReason::DispatchFailed, _) => match last_dispatch {
                Some(record) => format!(
                    "The tool '{}' failed and I could not recover: {}",
                    record.tool_name, record.content
                ),
                None => "A tool call failed and I could not recover.".to_string(),
            },
            (TerminationReason::Cancelled, _) => CANCELLED_MESSAGE.to_string(),
            (other, _) => format!("The conversation stopped ({other})."),
        }
    }
}
