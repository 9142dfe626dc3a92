//! End-to-end tests for the assistant
//!
//! The schedule source and the answer service are both mocked with
//! wiremock; the session store, orchestrator and boundary flow are real.

use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use flightdesk_engine::assistant::{DependencyState, FlightAssistant};
use flightdesk_engine::cache::TtlCache;
use flightdesk_engine::config::Config;
use flightdesk_engine::handlers::handle_ask;
use flightdesk_engine::llm::{Message, MessageRole};
use flightdesk_engine::secrets::SecretString;
use flightdesk_engine::session::SessionStore;
use sdk::errors::EngineError;

fn sse_body(parts: &[&str]) -> String {
    let mut body = String::from("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for part in parts {
        let chunk = json!({ "choices": [{ "delta": { "content": part } }] });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn arrivals_body() -> Value {
    json!({
        "airport": { "pluginData": { "schedule": { "arrivals": { "data": [{
            "flight": {
                "identification": { "number": { "default": "EK001" } },
                "airline": { "name": "Emirates" },
                "airport": {
                    "origin": {
                        "code": { "iata": "LHR" },
                        "position": { "region": { "city": "London" } }
                    }
                },
                "time": { "scheduled": { "arrival": 1718000000 } },
                "status": { "text": "Estimated 14:05" }
            }
        }] } } } }
    })
}

async fn mount_schedule(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/schedule/flight-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(arrivals_body()))
        .mount(server)
        .await;
}

async fn mount_answer(server: &MockServer, parts: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer llm-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(parts), "text/event-stream"),
        )
        .mount(server)
        .await;
}

fn assistant(server: &MockServer, memory: usize) -> FlightAssistant {
    let mut config = Config::default();
    config.flights.base_url = server.uri();
    config.flights.cache_file_path = None;
    config.llm.base_url = server.uri();
    config.llm.api_key = SecretString::new("llm-key");
    config.assistant.memory_len_messages = memory;

    let config = Arc::new(config);
    let cache = TtlCache::open_shared(config.cache_ttl(), None);
    FlightAssistant::with_cache(config, cache)
}

#[tokio::test]
async fn test_ask_streams_prefixes_and_records_history() {
    let server = MockServer::start().await;
    mount_schedule(&server).await;
    mount_answer(&server, &["Flight EK001 ", "from London ", "is on time."]).await;

    let assistant = assistant(&server, 40);
    let store = SessionStore::default();
    store.set_credential("tab-1", "flight-key").await;

    let mut rendered = Vec::new();
    let answer = handle_ask(
        &store,
        &assistant,
        "tab-1",
        Some("dxb"),
        "Is EK001 on time?",
        |prefix| rendered.push(prefix.to_string()),
    )
    .await
    .unwrap();

    assert_eq!(answer, "Flight EK001 from London is on time.");
    assert_eq!(
        rendered,
        vec![
            "Flight EK001 ",
            "Flight EK001 from London ",
            "Flight EK001 from London is on time.",
        ]
    );
    for pair in rendered.windows(2) {
        assert!(pair[1].starts_with(&pair[0]));
    }

    let handle = store.get("tab-1").await;
    let session = handle.lock().await;
    assert_eq!(session.selected.as_deref(), Some("DXB"));
    assert_eq!(
        session.history,
        vec![
            Message::user("Is EK001 on time?"),
            Message::assistant("Flight EK001 from London is on time."),
        ]
    );
}

#[tokio::test]
async fn test_prompt_carries_grounding_dataset() {
    let server = MockServer::start().await;
    mount_schedule(&server).await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("SELECTED_AIRPORT=DXB"))
        .and(body_string_contains("DATASET_JSON="))
        .and(body_string_contains("EK001"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = assistant(&server, 40);
    let store = SessionStore::default();
    store.set_credential("tab-1", "flight-key").await;

    let answer = handle_ask(&store, &assistant, "tab-1", Some("DXB"), "EK001?", |_| {})
        .await
        .unwrap();
    assert_eq!(answer, "ok");
}

#[tokio::test]
async fn test_follow_up_includes_history() {
    let server = MockServer::start().await;
    mount_schedule(&server).await;
    mount_answer(&server, &["Yes."]).await;

    let assistant = assistant(&server, 40);
    let store = SessionStore::default();
    let handle = store.get("tab-1").await;
    let mut session = handle.lock().await;
    let key = SecretString::new("flight-key");

    assert_eq!(
        assistant.ensure_dependencies(&mut session, &key).unwrap(),
        DependencyState::Created
    );
    assistant.persist_history(&mut session, "Is EK001 on time?", "Yes.");

    let messages = assistant
        .build_messages(&session, "DXB", "And its gate?")
        .await
        .unwrap();

    let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::System,
            MessageRole::System,
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
        ]
    );

    let dataset: Value =
        serde_json::from_str(messages[2].content.trim_start_matches("DATASET_JSON=")).unwrap();
    assert_eq!(dataset["airport"], "DXB");
    assert_eq!(dataset["arrivals"][0]["departureAirport"]["city"], "London");
    assert_eq!(dataset["arrivals"][0]["scheduledArrivalTime"], 1718000000);

    let prefixes: Vec<String> = assistant
        .stream_answer(&session, messages)
        .await
        .unwrap()
        .map(|p| p.unwrap())
        .collect()
        .await;
    assert_eq!(prefixes, vec!["Yes."]);
}

#[tokio::test]
async fn test_sessions_do_not_share_history() {
    let server = MockServer::start().await;
    mount_schedule(&server).await;
    mount_answer(&server, &["Answer"]).await;

    let assistant = assistant(&server, 40);
    let store = SessionStore::default();
    store.set_credential("a", "flight-key").await;
    store.set_credential("b", "flight-key").await;

    handle_ask(&store, &assistant, "a", Some("DXB"), "q-a", |_| {})
        .await
        .unwrap();

    let b = store.get("b").await;
    assert!(b.lock().await.history.is_empty());
    let a = store.get("a").await;
    assert_eq!(a.lock().await.history.len(), 2);
}

#[tokio::test]
async fn test_history_is_bounded() {
    let server = MockServer::start().await;
    mount_schedule(&server).await;
    mount_answer(&server, &["A"]).await;

    let assistant = assistant(&server, 4);
    let store = SessionStore::default();
    store.set_credential("tab", "flight-key").await;

    for i in 0..5 {
        handle_ask(&store, &assistant, "tab", Some("DXB"), &format!("q{}", i), |_| {})
            .await
            .unwrap();
    }

    let handle = store.get("tab").await;
    let session = handle.lock().await;
    assert_eq!(session.history.len(), 4);
    assert_eq!(session.history[0], Message::user("q3"));
    assert_eq!(session.history[3], Message::assistant("A"));
}

#[tokio::test]
async fn test_dependencies_are_built_once() {
    let server = MockServer::start().await;
    mount_schedule(&server).await;
    mount_answer(&server, &["A"]).await;

    let assistant = assistant(&server, 40);
    let store = SessionStore::default();
    store.set_credential("tab", "flight-key").await;

    handle_ask(&store, &assistant, "tab", Some("DXB"), "q1", |_| {})
        .await
        .unwrap();
    let handle = store.get("tab").await;
    let provider = Arc::clone(handle.lock().await.provider().unwrap());

    handle_ask(&store, &assistant, "tab", None, "q2", |_| {})
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&provider, handle.lock().await.provider().unwrap()));

    // A new key keeps the old provider until the boundary resets it
    store.set_credential("tab", "other-key").await;
    {
        let mut session = handle.lock().await;
        let key = session.credential.clone();
        assert_eq!(
            assistant.ensure_dependencies(&mut session, &key).unwrap(),
            DependencyState::CredentialChanged
        );
    }
    store.reset_dependencies("tab").await;
    assert!(!handle.lock().await.has_dependencies());
}

#[tokio::test]
async fn test_answer_service_failure_leaves_history_untouched() {
    let server = MockServer::start().await;
    mount_schedule(&server).await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let assistant = assistant(&server, 40);
    let store = SessionStore::default();
    store.set_credential("tab", "flight-key").await;

    let err = handle_ask(&store, &assistant, "tab", Some("DXB"), "q", |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::GenerationFailure(_)));

    let handle = store.get("tab").await;
    assert!(handle.lock().await.history.is_empty());
}

#[tokio::test]
async fn test_mid_stream_error_is_reported() {
    let server = MockServer::start().await;
    mount_schedule(&server).await;

    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Partial\"}}]}\n\n\
                data: {\"error\":{\"message\":\"upstream reset\"}}\n\n";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let assistant = assistant(&server, 40);
    let store = SessionStore::default();
    store.set_credential("tab", "flight-key").await;

    let mut rendered = Vec::new();
    let err = handle_ask(&store, &assistant, "tab", Some("DXB"), "q", |p| {
        rendered.push(p.to_string())
    })
    .await
    .unwrap_err();

    assert_eq!(rendered, vec!["Partial"]);
    match err {
        EngineError::GenerationFailure(msg) => assert!(msg.contains("upstream reset")),
        other => panic!("Expected GenerationFailure, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_schedule_outage_still_answers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    mount_answer(&server, &["No data available."]).await;

    let assistant = assistant(&server, 40);
    let store = SessionStore::new(Some(Duration::from_secs(300)));
    store.set_credential("tab", "flight-key").await;

    let answer = handle_ask(&store, &assistant, "tab", Some("DXB"), "q", |_| {})
        .await
        .unwrap();
    assert_eq!(answer, "No data available.");
}
