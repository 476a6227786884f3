//! Incremental decoder for OpenAI-style `text/event-stream` responses.
//!
//! Bytes arrive in arbitrary pieces; only complete lines are decoded, so a
//! multi-byte character split across two network reads stays intact.

use actloop_core::message::MessageToolCall;
use actloop_core::provider::{StreamChunk, Usage};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    /// Latest usage report, attached to the terminal chunk
    usage: Option<Usage>,
    finish_reason_seen: bool,
    finished: bool,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal chunk has been produced.
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes, returning every chunk completed by them.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();

        while !self.finished {
            let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                out.push(self.finish());
                break;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(resp) => {
                    let usage_only = resp.choices.is_empty();
                    if let Some(choice) = resp.choices.into_iter().next() {
                        if choice.finish_reason.is_some() {
                            self.finish_reason_seen = true;
                        }
                        for delta in choice.delta.tool_calls.unwrap_or_default() {
                            let acc = self.tool_calls.entry(delta.index).or_default();
                            if let Some(id) = delta.id {
                                acc.id = id;
                            }
                            if let Some(func) = delta.function {
                                if let Some(name) = func.name {
                                    acc.name = name;
                                }
                                if let Some(args) = func.arguments {
                                    acc.arguments.push_str(&args);
                                }
                            }
                        }

                        if let Some(content) = choice.delta.content
                            && !content.is_empty()
                        {
                            out.push(StreamChunk {
                                content: Some(content),
                                ..StreamChunk::default()
                            });
                        }
                    }

                    // With `stream_options.include_usage` the usage-only chunk
                    // comes last; some backends repeat usage on every chunk.
                    if let Some(usage) = resp.usage {
                        self.usage = Some(Usage {
                            prompt_tokens: usage.prompt_tokens,
                            completion_tokens: usage.completion_tokens,
                            total_tokens: usage.total_tokens,
                        });
                        if usage_only || self.finish_reason_seen {
                            out.push(self.finish());
                        }
                    }
                }
                Err(e) => {
                    trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                }
            }
        }

        out
    }

    /// Produce the terminal chunk carrying the accumulated tool calls.
    pub(crate) fn finish(&mut self) -> StreamChunk {
        self.finished = true;
        let usage = self.usage.take();
        let tool_calls = std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(ToolCallAccumulator::into_tool_call)
            .collect();
        StreamChunk {
            content: None,
            tool_calls,
            done: true,
            usage,
        }
    }
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> MessageToolCall {
        let id = if self.id.is_empty() {
            format!("call_{}", uuid::Uuid::new_v4().simple())
        } else {
            self.id
        };
        MessageToolCall {
            id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta. Arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(chunks: &[StreamChunk]) -> String {
        chunks.iter().filter_map(|c| c.content.as_deref()).collect()
    }

    #[test]
    fn decodes_content_deltas() {
        let mut dec = SseDecoder::new();
        let chunks = dec.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Action: \"}}]}\n\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"add\"}}]}\n\n",
        );
        assert_eq!(contents(&chunks), "Action: add");
        assert!(!dec.is_finished());
    }

    #[test]
    fn lines_split_across_reads_are_joined() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"data: {\"choices\":[{\"delta\":{\"con").is_empty());
        let chunks = dec.feed(b"tent\":\"8\"}}]}\r\n");
        assert_eq!(contents(&chunks), "8");
    }

    #[test]
    fn multibyte_character_split_across_reads() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n";
        let bytes = line.as_bytes();
        let split = line.find('\u{e9}').unwrap() + 1;
        let mut dec = SseDecoder::new();
        assert!(dec.feed(&bytes[..split]).is_empty());
        let chunks = dec.feed(&bytes[split..]);
        assert_eq!(contents(&chunks), "caf\u{e9}");
    }

    #[test]
    fn done_marker_finishes_stream() {
        let mut dec = SseDecoder::new();
        let chunks = dec.feed(b": keep-alive\n\ndata: [DONE]\n\ndata: ignored\n");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].done);
        assert!(dec.is_finished());
    }

    #[test]
    fn tool_call_deltas_accumulate() {
        let mut dec = SseDecoder::new();
        dec.feed(br#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"add","arguments":""}}]}}]}
"#);
        dec.feed(br#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"x\": 5, "}}]}}]}
"#);
        dec.feed(br#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"y\": 3}"}}]}}]}
"#);
        let chunks = dec.feed(b"data: [DONE]\n");
        let calls = &chunks[0].tool_calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].name, "add");
        assert_eq!(calls[0].arguments, r#"{"x": 5, "y": 3}"#);
    }

    #[test]
    fn usage_chunk_finishes_stream() {
        let mut dec = SseDecoder::new();
        let chunks = dec.feed(
            br#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}
"#,
        );
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].done);
        assert_eq!(chunks[0].usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn usage_on_every_chunk_does_not_cut_the_answer() {
        let mut dec = SseDecoder::new();
        let mut chunks = dec.feed(
            br#"data: {"choices":[{"delta":{"content":"5 plus 3 "}}],"usage":{"prompt_tokens":10,"completion_tokens":1,"total_tokens":11}}
data: {"choices":[{"delta":{"content":"is 8."}}],"usage":{"prompt_tokens":10,"completion_tokens":2,"total_tokens":12}}
"#,
        );
        assert!(!dec.is_finished());
        assert_eq!(contents(&chunks), "5 plus 3 is 8.");

        chunks = dec.feed(
            br#"data: {"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":10,"completion_tokens":3,"total_tokens":13}}
"#,
        );
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].done);
        assert_eq!(chunks[0].usage.unwrap().total_tokens, 13);
        assert!(dec.is_finished());
    }

    #[test]
    fn done_marker_carries_last_usage() {
        let mut dec = SseDecoder::new();
        dec.feed(
            br#"data: {"choices":[{"delta":{"content":"8"}}],"usage":{"prompt_tokens":4,"completion_tokens":1,"total_tokens":5}}
"#,
        );
        let chunks = dec.feed(b"data: [DONE]
");
        assert!(chunks[0].done);
        assert_eq!(chunks[0].usage.unwrap().total_tokens, 5);
    }

    #[test]
    fn unparseable_chunks_are_skipped() {
        let mut dec = SseDecoder::new();
        let chunks = dec.feed(b"data: {not json}\nevent: ping\n");
        assert!(chunks.is_empty());
    }

    #[test]
    fn missing_call_id_is_generated() {
        let mut dec = SseDecoder::new();
        dec.feed(br#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"add","arguments":"{}"}}]}}]}
"#);
        let last = dec.finish();
        assert!(last.tool_calls[0].id.starts_with("call_"));
    }
}
