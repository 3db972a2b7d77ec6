use relay_core::{
    AgentLoop, ContextBuilder, EventSink, JsonFileSessionStore, OpenAiTransport, RetryingProvider,
    Role, SessionStore, ToolRegistry, TurnStatus, register_builtin_tools,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(frames: &[Value]) -> ResponseTemplate {
    let mut body = String::new();
    for frame in frames {
        body.push_str(&format!("data: {}\n\n", frame));
    }
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn delta(delta: Value) -> Value {
    json!({"choices": [{"delta": delta}]})
}

/// A tool call streamed in pieces, followed by a plain answer.
async fn mount_tool_then_answer(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(&[
            delta(json!({"tool_calls": [{"index": 0, "id": "call_", "function": {"name": "search_", "arguments": ""}}]})),
            delta(json!({"tool_calls": [{"index": 0, "id": "abc", "function": {"name": "web", "arguments": "{\"query\":"}}]})),
            delta(json!({"tool_calls": [{"index": 0, "function": {"arguments": "\"rust\"}"}}]})),
        ]))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(&[
            delta(json!({"content": "Rust is "})),
            delta(json!({"content": "a language."})),
        ]))
        .mount(server)
        .await;
}

fn agent(server: &MockServer) -> AgentLoop {
    let transport = OpenAiTransport::new(format!("{}/v1/chat/completions", server.uri()))
        .with_model("test-model");
    let registry = ToolRegistry::new();
    register_builtin_tools(&registry);

    AgentLoop::new(Arc::new(RetryingProvider::new(transport)), Arc::new(registry))
        .with_context_builder(ContextBuilder::new().with_system_prompt("You are helpful."))
}

#[tokio::test]
async fn streamed_tool_call_round_trip() {
    let server = MockServer::start().await;
    mount_tool_then_answer(&server).await;

    let turn = agent(&server)
        .process_with_history(vec![], "what is rust?")
        .await
        .unwrap();

    assert_eq!(turn.status, TurnStatus::Answered);
    assert_eq!(turn.steps, 2);
    assert_eq!(turn.final_answer(), Some("Rust is a language."));

    let roles: Vec<_> = turn.history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );

    let call = &turn.history[2].tool_calls[0];
    assert_eq!(call.id, "call_abc");
    assert_eq!(call.name, "search_web");
    assert_eq!(call.arguments, r#"{"query":"rust"}"#);
    assert_eq!(turn.history[3].tool_call_id.as_deref(), Some("call_abc"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let first: Value = requests[0].body_json().unwrap();
    assert_eq!(first["model"], "test-model");
    assert_eq!(first["stream"], true);
    assert_eq!(first["tool_choice"], "auto");
    assert_eq!(first["tools"][0]["function"]["name"], "search_web");
    assert_eq!(first["tools"][1]["function"]["name"], "graphic_art");

    let second: Value = requests[1].body_json().unwrap();
    let messages = second["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["tool_calls"][0]["id"], "call_abc");
    assert_eq!(messages[3]["role"], "tool");
    assert_eq!(messages[3]["tool_call_id"], "call_abc");
}

#[tokio::test]
async fn tokens_stream_live_while_the_turn_runs() {
    let server = MockServer::start().await;
    mount_tool_then_answer(&server).await;
    let (events, mut rx) = EventSink::channel();

    agent(&server)
        .with_events(events)
        .process_with_history(vec![], "what is rust?")
        .await
        .unwrap();

    let mut tokens = String::new();
    while let Ok(event) = rx.try_recv() {
        if let relay_core::AgentEvent::Token(token) = event {
            tokens.push_str(&token);
        }
    }
    assert_eq!(tokens, "Rust is a language.");
}

#[tokio::test]
async fn history_survives_a_file_store_round_trip() {
    let server = MockServer::start().await;
    mount_tool_then_answer(&server).await;
    let tmp = TempDir::new().unwrap();
    let store = JsonFileSessionStore::new(tmp.path());

    let history = store.load("web").await.unwrap();
    let turn = agent(&server)
        .process_with_history(history, "what is rust?")
        .await
        .unwrap();
    store.save("web", &turn.history).await.unwrap();

    let reloaded = store.load("web").await.unwrap();
    assert_eq!(reloaded, turn.history);

    store.clear("web").await.unwrap();
    assert!(store.load("web").await.unwrap().is_empty());
}
