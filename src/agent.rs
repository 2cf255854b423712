//! Park assistant orchestration.
//!
//! Drives an OpenAI-compatible chat-completion API (DeepSeek by default)
//! with the tools discovered through the bridge. The model decides when to
//! call `search_parks`; this module executes those calls over the bridge,
//! feeds the results back, and returns the final answer either whole or as
//! a stream of fragments.
//!
//! Cancellation is a first-class outcome, not a failure: [`AskError`]
//! separates `Cancelled` (the consumer went away) from `Failed` (an
//! upstream dependency broke), and nothing in this module collapses one
//! into the other.

use anyhow::{anyhow, Result};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::bridge::ToolBridge;
use crate::config::LlmConfig;
use crate::stream::StreamEvent;

const INSTRUCTIONS: &str = "You are a knowledgeable national park assistant.\n\
    Answer questions about US national parks accurately and concisely.\n\
    If you don't know the answer, say so honestly.";

/// How a question-answering attempt ended, when it did not produce an
/// answer. Checked explicitly at every boundary so a client disconnect can
/// never be coerced into a generic error response.
#[derive(Debug)]
pub enum AskError {
    /// The caller stopped listening. Propagated, never reported.
    Cancelled,
    /// An upstream dependency (LLM, bridge, index) failed.
    Failed(anyhow::Error),
}

impl AskError {
    fn failed(error: impl Into<anyhow::Error>) -> Self {
        AskError::Failed(error.into())
    }
}

pub struct ParkAssistant {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
    bridge: Arc<ToolBridge>,
}

impl ParkAssistant {
    /// Build the assistant. The API key is read once from the environment
    /// variable named in the config; a missing key surfaces on the first
    /// request rather than at startup, matching how the service degrades.
    pub fn new(config: &LlmConfig, bridge: Arc<ToolBridge>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let api_key = std::env::var(&config.api_key_env).ok();

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
            bridge,
        })
    }

    /// Answer a question in full.
    ///
    /// Runs the tool loop: each round the model either answers or requests
    /// tool calls, which are executed through the bridge and appended as
    /// tool messages for the next round.
    pub async fn ask(&self, question: &str) -> Result<String, AskError> {
        let mut messages = initial_messages(question);
        let tools = tool_definitions(&self.bridge.tools());

        for _round in 0..self.config.max_tool_rounds {
            let body = self.request_body(&messages, &tools, false);
            let response = self.send(&body).await?;

            let message = response
                .pointer("/choices/0/message")
                .cloned()
                .ok_or_else(|| AskError::failed(anyhow!("LLM response missing message")))?;

            let tool_calls = message
                .get("tool_calls")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            if tool_calls.is_empty() {
                let answer = message
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                return Ok(answer);
            }

            messages.push(message);
            self.execute_tool_calls(&tool_calls, &mut messages).await?;
        }

        Err(AskError::failed(anyhow!(
            "no answer after {} tool rounds",
            self.config.max_tool_rounds
        )))
    }

    /// Answer a question as a stream of fragments sent into `tx`.
    ///
    /// Tool rounds work as in [`ask`](Self::ask); every round is requested
    /// with `stream: true` and content deltas are forwarded the moment they
    /// arrive. A send failure means the consumer disconnected and surfaces
    /// as [`AskError::Cancelled`].
    pub async fn ask_stream(
        &self,
        question: &str,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), AskError> {
        let mut messages = initial_messages(question);
        let tools = tool_definitions(&self.bridge.tools());

        for _round in 0..self.config.max_tool_rounds {
            let body = self.request_body(&messages, &tools, true);
            let response = self.send_raw(&body).await?;

            let round = self.consume_stream(response, tx).await?;

            if round.tool_calls.is_empty() {
                return Ok(());
            }

            messages.push(round.assistant_message());
            let calls: Vec<Value> = round.tool_calls.iter().map(ToolCallDraft::to_value).collect();
            self.execute_tool_calls(&calls, &mut messages).await?;
        }

        Err(AskError::failed(anyhow!(
            "no answer after {} tool rounds",
            self.config.max_tool_rounds
        )))
    }

    /// Run every requested tool call through the bridge and append the
    /// results as tool messages.
    async fn execute_tool_calls(
        &self,
        tool_calls: &[Value],
        messages: &mut Vec<Value>,
    ) -> Result<(), AskError> {
        for call in tool_calls {
            let id = call.get("id").and_then(Value::as_str).unwrap_or("");
            let name = call
                .pointer("/function/name")
                .and_then(Value::as_str)
                .unwrap_or("");
            let raw_arguments = call
                .pointer("/function/arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");

            let arguments: serde_json::Map<String, Value> =
                serde_json::from_str(raw_arguments).unwrap_or_default();

            let result = self
                .bridge
                .call_tool(name, arguments)
                .await
                .map_err(AskError::Failed)?;

            messages.push(json!({
                "role": "tool",
                "tool_call_id": id,
                "content": result,
            }));
        }
        Ok(())
    }

    fn request_body(&self, messages: &[Value], tools: &[Value], stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": messages,
            "stream": stream,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<Value, AskError> {
        let response = self.send_raw(body).await?;
        response
            .json()
            .await
            .map_err(|e| AskError::failed(anyhow!("invalid LLM response: {}", e)))
    }

    async fn send_raw(&self, body: &Value) -> Result<reqwest::Response, AskError> {
        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AskError::failed(anyhow!("LLM request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AskError::failed(anyhow!("LLM returned {}: {}", status, text)));
        }

        Ok(response)
    }

    /// Read one streamed completion, forwarding content deltas and
    /// accumulating tool-call deltas until the `[DONE]` marker.
    async fn consume_stream(
        &self,
        response: reqwest::Response,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<StreamRound, AskError> {
        let mut round = StreamRound::default();
        let mut buffer = String::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk =
                chunk.map_err(|e| AskError::failed(anyhow!("LLM stream failed: {}", e)))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();

                if let Some(fragment) = round.apply_line(line.trim_end()) {
                    if tx.send(StreamEvent::Content(fragment)).await.is_err() {
                        // Consumer hung up; stop producing and propagate.
                        return Err(AskError::Cancelled);
                    }
                }

                if round.done {
                    return Ok(round);
                }
            }
        }

        Ok(round)
    }
}

fn initial_messages(question: &str) -> Vec<Value> {
    vec![
        json!({ "role": "system", "content": INSTRUCTIONS }),
        json!({ "role": "user", "content": question }),
    ]
}

/// Map the bridge's MCP tool descriptors to OpenAI function definitions.
/// Name, description, and input schema carry over unchanged.
pub fn tool_definitions(tools: &[rmcp::model::Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name.as_ref(),
                    "description": tool
                        .description
                        .as_ref()
                        .map(|d| d.as_ref())
                        .unwrap_or(""),
                    "parameters": Value::Object((*tool.input_schema).clone()),
                }
            })
        })
        .collect()
}

// ============ Streamed round accumulation ============

/// One tool call assembled from streamed deltas. OpenAI-compatible APIs
/// send the id and name once and the arguments as string fragments keyed by
/// index.
#[derive(Debug, Default, Clone, PartialEq)]
struct ToolCallDraft {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallDraft {
    fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "type": "function",
            "function": { "name": self.name, "arguments": self.arguments }
        })
    }
}

/// State of one streamed completion round.
#[derive(Debug, Default)]
struct StreamRound {
    content: String,
    tool_calls: Vec<ToolCallDraft>,
    done: bool,
}

impl StreamRound {
    /// Apply one SSE line. Returns a content fragment to forward, if the
    /// line carried one.
    fn apply_line(&mut self, line: &str) -> Option<String> {
        let data = line.strip_prefix("data:")?.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return None;
        }

        let parsed: Value = serde_json::from_str(data).ok()?;
        let delta = parsed.pointer("/choices/0/delta")?;

        if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let index = call.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                if self.tool_calls.len() <= index {
                    self.tool_calls.resize(index + 1, ToolCallDraft::default());
                }
                let draft = &mut self.tool_calls[index];

                if let Some(id) = call.get("id").and_then(Value::as_str) {
                    draft.id.push_str(id);
                }
                if let Some(name) = call.pointer("/function/name").and_then(Value::as_str) {
                    draft.name.push_str(name);
                }
                if let Some(args) = call.pointer("/function/arguments").and_then(Value::as_str) {
                    draft.arguments.push_str(args);
                }
            }
        }

        let fragment = delta.get("content").and_then(Value::as_str)?;
        if fragment.is_empty() {
            return None;
        }

        self.content.push_str(fragment);
        Some(fragment.to_string())
    }

    /// Assistant message echoing this round back to the API, so the model
    /// sees its own tool requests before the tool results.
    fn assistant_message(&self) -> Value {
        let calls: Vec<Value> = self.tool_calls.iter().map(ToolCallDraft::to_value).collect();
        json!({
            "role": "assistant",
            "content": self.content,
            "tool_calls": calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definitions_map_name_description_and_schema() {
        let descriptor = crate::bridge::ParkToolServer::search_descriptor();
        let definitions = tool_definitions(&[descriptor]);

        assert_eq!(definitions.len(), 1);
        let function = &definitions[0]["function"];
        assert_eq!(function["name"], "search_parks");
        assert!(function["description"]
            .as_str()
            .unwrap()
            .contains("national park"));
        assert_eq!(function["parameters"]["type"], "object");
        assert_eq!(function["parameters"]["required"][0], "query");
    }

    #[test]
    fn content_deltas_are_forwarded_and_accumulated() {
        let mut round = StreamRound::default();

        let first = round.apply_line(
            r#"data: {"choices":[{"delta":{"content":"The "}}]}"#,
        );
        let second = round.apply_line(
            r#"data: {"choices":[{"delta":{"content":"park"}}]}"#,
        );

        assert_eq!(first.as_deref(), Some("The "));
        assert_eq!(second.as_deref(), Some("park"));
        assert_eq!(round.content, "The park");
        assert!(round.tool_calls.is_empty());
    }

    #[test]
    fn done_marker_ends_the_round() {
        let mut round = StreamRound::default();
        assert!(round.apply_line("data: [DONE]").is_none());
        assert!(round.done);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut round = StreamRound::default();
        assert!(round.apply_line("").is_none());
        assert!(round.apply_line(": keep-alive comment").is_none());
        assert!(!round.done);
    }

    #[test]
    fn tool_call_deltas_accumulate_by_index() {
        let mut round = StreamRound::default();

        round.apply_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"search_parks","arguments":""}}]}}]}"#,
        );
        round.apply_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"query\":"}}]}}]}"#,
        );
        round.apply_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"acadia\"}"}}]}}]}"#,
        );

        assert_eq!(round.tool_calls.len(), 1);
        let call = &round.tool_calls[0];
        assert_eq!(call.id, "call_1");
        assert_eq!(call.name, "search_parks");
        assert_eq!(call.arguments, "{\"query\":\"acadia\"}");
    }

    #[test]
    fn assistant_message_echoes_tool_calls() {
        let mut round = StreamRound::default();
        round.tool_calls.push(ToolCallDraft {
            id: "call_9".to_string(),
            name: "search_parks".to_string(),
            arguments: "{\"query\":\"geysers\"}".to_string(),
        });

        let message = round.assistant_message();
        assert_eq!(message["role"], "assistant");
        assert_eq!(message["tool_calls"][0]["id"], "call_9");
        assert_eq!(
            message["tool_calls"][0]["function"]["name"],
            "search_parks"
        );
    }

    #[test]
    fn initial_messages_carry_instructions_and_question() {
        let messages = initial_messages("Which park has geysers?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Which park has geysers?");
    }
}
