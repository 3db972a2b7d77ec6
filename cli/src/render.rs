use console::style;
use relay_core::{AgentEvent, ToolCall};
use std::io::Write;

const MAX_RESULT_CHARS: usize = 120;

/// Prints agent events as they arrive.
///
/// Text that opens with `{` may be a tool call the model wrote out as JSON,
/// so it is held back until the step shows whether it was promoted.
#[derive(Default)]
pub struct Renderer {
    streamed: bool,
    held: String,
    passthrough: bool,
}

impl Renderer {
    /// Whether any model text reached the terminal since the last reset.
    pub fn streamed(&self) -> bool {
        self.streamed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prints text still held back once the turn is over.
    pub fn finish(&mut self) {
        if !self.held.is_empty() {
            let held = std::mem::take(&mut self.held);
            self.print_text(&held);
        }
    }

    pub fn render(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::StepStarted { step } => {
                tracing::debug!(step, "Step started");
                self.held.clear();
                self.passthrough = false;
            }
            AgentEvent::Token(token) => self.push_token(&token),
            AgentEvent::ToolCalls(calls) => {
                self.held.clear();
                if self.streamed {
                    println!();
                    self.streamed = false;
                }
                for call in &calls {
                    print_call(call);
                }
            }
            AgentEvent::ToolResult { name, content, .. } => {
                println!(
                    "  {} {} {}",
                    style("←").green(),
                    style(name).bold(),
                    style(truncate(&content, MAX_RESULT_CHARS)).dim()
                );
            }
            AgentEvent::ConnectionError(reason) => {
                eprintln!("{} {}", style("! Connection error:").yellow().bold(), reason);
            }
        }
    }

    fn push_token(&mut self, token: &str) {
        if self.passthrough {
            self.print_text(token);
            return;
        }

        self.held.push_str(token);
        let start = self.held.trim_start();
        if start.is_empty() || start.starts_with('{') {
            return;
        }

        self.passthrough = true;
        let held = std::mem::take(&mut self.held);
        self.print_text(&held);
    }

    fn print_text(&mut self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
        self.streamed = true;
    }
}

fn print_call(call: &ToolCall) {
    println!(
        "  {} {}{}",
        style("→").cyan(),
        style(&call.name).cyan().bold(),
        style(format!("({})", call.arguments)).dim()
    );
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{}…", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_results() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }

    #[test]
    fn tokens_mark_output_as_streamed() {
        let mut renderer = Renderer::default();
        renderer.render(AgentEvent::StepStarted { step: 1 });
        assert!(!renderer.streamed());

        renderer.render(AgentEvent::Token("hi".into()));
        assert!(renderer.streamed());

        renderer.reset();
        assert!(!renderer.streamed());
    }

    #[test]
    fn json_text_is_dropped_when_it_becomes_a_tool_call() {
        let mut renderer = Renderer::default();
        renderer.render(AgentEvent::StepStarted { step: 1 });
        renderer.render(AgentEvent::Token(" {\"name\":\"search_web\",".into()));
        renderer.render(AgentEvent::Token("\"arguments\":{\"query\":\"x\"}}".into()));
        assert!(!renderer.streamed());

        renderer.render(AgentEvent::ToolCalls(vec![ToolCall::new(
            "call_1",
            "search_web",
            r#"{"query":"x"}"#,
        )]));
        renderer.finish();
        assert!(!renderer.streamed());
    }

    #[test]
    fn held_json_answer_is_printed_at_the_end() {
        let mut renderer = Renderer::default();
        renderer.render(AgentEvent::Token("{\"answer\": 42}".into()));
        assert!(!renderer.streamed());

        renderer.finish();
        assert!(renderer.streamed());
    }

    #[test]
    fn plain_text_is_not_held() {
        let mut renderer = Renderer::default();
        renderer.render(AgentEvent::Token("  ".into()));
        assert!(!renderer.streamed());

        renderer.render(AgentEvent::Token("Hello {world}".into()));
        assert!(renderer.streamed());
    }
}
