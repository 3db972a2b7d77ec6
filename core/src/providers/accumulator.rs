//! Incremental decoder for streamed chat-completion bodies.
//!
//! Every field of a tool call may arrive split across any number of chunks,
//! so fragments are appended verbatim and only interpreted once the stream
//! is over.

use crate::traits::{ChatMessage, ToolCall};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::trace;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// Byte sequences some backends leak into content from broken UTF-8 output.
const FILLER_SEQUENCES: &[&str] = &["\u{f0}", "\u{fffd}"];

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCall>>,
    #[serde(default)]
    function_call: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl StreamFunction {
    fn append_to(&self, call: &mut ToolCall) {
        if let Some(name) = &self.name {
            call.name.push_str(name);
        }
        if let Some(arguments) = &self.arguments {
            call.arguments.push_str(arguments);
        }
    }
}

/// Merges the deltas of one backend call into one assistant message.
///
/// One accumulator serves exactly one attempt; retries start a new one.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    /// In-progress calls in first-seen order.
    tool_calls: Vec<ToolCall>,
    /// Stream index to position in `tool_calls`.
    slots: HashMap<usize, usize>,
    function_call: ToolCall,
    done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` sentinel was seen; later lines are ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feeds one raw line and returns the content fragment it carried, if any.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if self.done {
            return None;
        }

        let data = line.trim().strip_prefix(DATA_PREFIX)?.trim();

        if data == DONE_SENTINEL {
            self.done = true;
            return None;
        }

        let chunk = match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                trace!(error = %e, "Skipping malformed stream chunk");
                return None;
            }
        };

        let delta = chunk.choices.into_iter().next()?.delta;
        self.apply(delta)
    }

    fn apply(&mut self, delta: StreamDelta) -> Option<String> {
        if let Some(fragments) = delta.tool_calls {
            for fragment in fragments {
                let call = self.slot(fragment.index.unwrap_or(0));

                if let Some(id) = &fragment.id {
                    call.id.push_str(id);
                }
                if let Some(function) = &fragment.function {
                    function.append_to(call);
                }
            }
        }

        if let Some(function) = &delta.function_call {
            function.append_to(&mut self.function_call);
        }

        match delta.content {
            Some(content) if !content.is_empty() => {
                self.content.push_str(&content);
                Some(content)
            }
            _ => None,
        }
    }

    fn slot(&mut self, index: usize) -> &mut ToolCall {
        let tool_calls = &mut self.tool_calls;
        let slot = *self.slots.entry(index).or_insert_with(|| {
            tool_calls.push(ToolCall::default());
            tool_calls.len() - 1
        });
        &mut self.tool_calls[slot]
    }

    /// Finalizes the accumulated state into an assistant message.
    pub fn finish(self) -> ChatMessage {
        let content = clean_content(&self.content);

        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_iter()
            .filter(|call| !call.name.is_empty())
            .collect();

        let function_call = if tool_calls.is_empty() && !self.function_call.name.is_empty() {
            Some(self.function_call)
        } else {
            None
        };

        let mut message = ChatMessage::assistant_with_tool_calls(content, tool_calls);
        message.function_call = function_call;
        message
    }
}

fn clean_content(raw: &str) -> Option<String> {
    let mut cleaned = raw.to_string();
    for filler in FILLER_SEQUENCES {
        if cleaned.contains(filler) {
            cleaned = cleaned.replace(filler, "");
        }
    }

    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Role;
    use serde_json::json;

    fn data(value: serde_json::Value) -> String {
        format!("data: {}", value)
    }

    fn content_line(text: &str) -> String {
        data(json!({"choices": [{"delta": {"content": text}}]}))
    }

    fn tool_line(index: usize, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> String {
        let mut function = serde_json::Map::new();
        if let Some(name) = name {
            function.insert("name".into(), json!(name));
        }
        if let Some(args) = args {
            function.insert("arguments".into(), json!(args));
        }
        let mut fragment = json!({"index": index, "function": function});
        if let Some(id) = id {
            fragment["id"] = json!(id);
        }
        data(json!({"choices": [{"delta": {"tool_calls": [fragment]}}]}))
    }

    fn accumulate<I, S>(lines: I) -> ChatMessage
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut acc = StreamAccumulator::new();
        for line in lines {
            acc.push_line(line.as_ref());
        }
        acc.finish()
    }

    /// Splits every field of one call into pieces of `size` chars.
    fn split_call_lines(index: usize, call: &ToolCall, size: usize) -> Vec<String> {
        let pieces = |s: &str| -> Vec<String> {
            s.chars()
                .collect::<Vec<_>>()
                .chunks(size)
                .map(|c| c.iter().collect())
                .collect()
        };

        let mut lines = Vec::new();
        for piece in pieces(&call.id) {
            lines.push(tool_line(index, Some(&piece), None, None));
        }
        for piece in pieces(&call.name) {
            lines.push(tool_line(index, None, Some(&piece), None));
        }
        for piece in pieces(&call.arguments) {
            lines.push(tool_line(index, None, None, Some(&piece)));
        }
        lines
    }

    #[test]
    fn accumulates_content_tokens() {
        let msg = accumulate([
            content_line("Hello"),
            content_line(", "),
            content_line("world"),
            "data: [DONE]".to_string(),
        ]);

        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.as_deref(), Some("Hello, world"));
        assert!(msg.tool_calls.is_empty());
        assert!(msg.function_call.is_none());
    }

    #[test]
    fn fragment_merge_is_split_invariant() {
        let call = ToolCall::new(
            "call_abc123",
            "search_web",
            r#"{"query":"rust async streams","limit":5}"#,
        );

        let whole = accumulate(split_call_lines(0, &call, usize::MAX));
        let by_char = accumulate(split_call_lines(0, &call, 1));
        let by_three = accumulate(split_call_lines(0, &call, 3));

        assert_eq!(whole.tool_calls, vec![call.clone()]);
        assert_eq!(by_char.tool_calls, whole.tool_calls);
        assert_eq!(by_three.tool_calls, whole.tool_calls);
    }

    #[test]
    fn interleaved_indices_stay_independent() {
        let first = ToolCall::new("call_1a", "search_web", r#"{"query":"x"}"#);
        let second = ToolCall::new("call_2b", "graphic_art", r#"{"prompt":"a fox"}"#);

        let a = split_call_lines(0, &first, 2);
        let b = split_call_lines(1, &second, 2);

        let mut interleaved = Vec::new();
        let mut a_iter = a.iter();
        let mut b_iter = b.iter();
        loop {
            let next_b = b_iter.next();
            let next_a = a_iter.next();
            if next_a.is_none() && next_b.is_none() {
                break;
            }
            interleaved.extend(next_b.cloned());
            interleaved.extend(next_a.cloned());
        }

        let msg = accumulate(interleaved);
        assert_eq!(msg.tool_calls, vec![second, first]);
    }

    #[test]
    fn tool_calls_are_emitted_in_first_seen_order() {
        let msg = accumulate([
            tool_line(5, Some("call_c"), Some("graphic_art"), Some("{}")),
            tool_line(1, Some("call_a"), Some("search_web"), Some("{}")),
            tool_line(5, None, None, Some("")),
        ]);

        let names: Vec<_> = msg.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["graphic_art", "search_web"]);
    }

    #[test]
    fn missing_index_defaults_to_zero() {
        let msg = accumulate([
            data(json!({"choices": [{"delta": {"tool_calls": [{"id": "call_", "function": {"name": "search"}}]}}]})),
            data(json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "id": "x", "function": {"name": "_web", "arguments": "{}"}}]}}]})),
        ]);

        assert_eq!(msg.tool_calls, vec![ToolCall::new("call_x", "search_web", "{}")]);
    }

    #[test]
    fn sentinel_ignores_trailing_lines() {
        let msg = accumulate([
            content_line("final"),
            "data: [DONE]".to_string(),
            content_line(" garbage"),
            tool_line(0, Some("call_z"), Some("search_web"), Some("{}")),
            "data: {not json".to_string(),
        ]);

        assert_eq!(msg.content.as_deref(), Some("final"));
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn sentinel_sets_done() {
        let mut acc = StreamAccumulator::new();
        acc.push_line(&content_line("x"));
        assert!(!acc.is_done());
        acc.push_line("data: [DONE]");
        assert!(acc.is_done());
    }

    #[test]
    fn ignores_non_data_and_malformed_lines() {
        let msg = accumulate([
            ": keep-alive".to_string(),
            String::new(),
            "event: message".to_string(),
            "data: {\"choices\": [".to_string(),
            "data: 42".to_string(),
            "data: {}".to_string(),
            data(json!({"choices": []})),
            content_line("ok"),
        ]);

        assert_eq!(msg.content.as_deref(), Some("ok"));
    }

    #[test]
    fn no_content_deltas_yield_absent_content() {
        let msg = accumulate([tool_line(0, Some("call_a"), Some("search_web"), Some("{}"))]);
        assert_eq!(msg.content, None);
        assert_eq!(msg.tool_calls.len(), 1);

        let empty = accumulate(Vec::<String>::new());
        assert_eq!(empty.content, None);
    }

    #[test]
    fn whitespace_only_content_is_absent() {
        let msg = accumulate([content_line("  "), content_line("\n\t"), content_line(" ")]);
        assert_eq!(msg.content, None);
    }

    #[test]
    fn filler_sequences_are_stripped() {
        let msg = accumulate([content_line("\u{fffd}Hi"), content_line(" there\u{f0} ")]);
        assert_eq!(msg.content.as_deref(), Some("Hi there"));

        let only_filler = accumulate([content_line("\u{fffd}\u{fffd}")]);
        assert_eq!(only_filler.content, None);
    }

    #[test]
    fn push_line_returns_content_fragment() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.push_line(&content_line("tok")), Some("tok".to_string()));
        assert_eq!(acc.push_line(&content_line("")), None);
        assert_eq!(acc.push_line(": ping"), None);
    }

    #[test]
    fn nameless_tool_calls_are_dropped() {
        let msg = accumulate([
            tool_line(0, Some("call_a"), None, Some("{\"query\":")),
            tool_line(1, Some("call_b"), Some("search_web"), Some("{}")),
        ]);

        assert_eq!(msg.tool_calls, vec![ToolCall::new("call_b", "search_web", "{}")]);
    }

    #[test]
    fn legacy_function_call_accumulates() {
        let msg = accumulate([
            data(json!({"choices": [{"delta": {"function_call": {"name": "search"}}}]})),
            data(json!({"choices": [{"delta": {"function_call": {"name": "_web", "arguments": "{\"qu"}}}]})),
            data(json!({"choices": [{"delta": {"function_call": {"arguments": "ery\":\"x\"}"}}}]})),
        ]);

        assert!(msg.tool_calls.is_empty());
        assert_eq!(
            msg.function_call,
            Some(ToolCall::new("", "search_web", r#"{"query":"x"}"#))
        );
    }

    #[test]
    fn structured_calls_take_precedence_over_legacy() {
        let msg = accumulate([
            data(json!({"choices": [{"delta": {"function_call": {"name": "legacy"}}}]})),
            tool_line(0, Some("call_a"), Some("search_web"), Some("{}")),
        ]);

        assert_eq!(msg.tool_calls.len(), 1);
        assert!(msg.function_call.is_none());
    }

    #[test]
    fn legacy_call_survives_when_structured_calls_are_nameless() {
        let msg = accumulate([
            tool_line(0, Some("call_a"), None, Some("{}")),
            data(json!({"choices": [{"delta": {"function_call": {"name": "search_web", "arguments": "{}"}}}]})),
        ]);

        assert!(msg.tool_calls.is_empty());
        assert_eq!(msg.function_call.map(|c| c.name), Some("search_web".into()));
    }

    #[test]
    fn content_and_tool_calls_coexist() {
        let msg = accumulate([
            content_line("Let me look that up."),
            tool_line(0, Some("call_a"), Some("search_web"), Some("{\"query\":\"x\"}")),
        ]);

        assert_eq!(msg.content.as_deref(), Some("Let me look that up."));
        assert_eq!(msg.tool_calls.len(), 1);
    }

    #[test]
    fn accepts_data_prefix_without_space() {
        let msg = accumulate([r#"data:{"choices":[{"delta":{"content":"tight"}}]}"#]);
        assert_eq!(msg.content.as_deref(), Some("tight"));
    }
}
