//! Router contract tests, driven in-process with a recording stub gateway.

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use searchagent::{
    ContextSize, Error, GatewayCall, GatewayReply, ModelGateway, Orchestrator, OrchestratorConfig,
    Result,
};
use searchagent_server::{app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

type Responder = dyn Fn(&GatewayCall) -> Result<GatewayReply> + Send + Sync;

struct StubGateway {
    calls: Mutex<Vec<GatewayCall>>,
    respond: Box<Responder>,
}

impl StubGateway {
    fn new(f: impl Fn(&GatewayCall) -> Result<GatewayReply> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(f),
        })
    }

    fn echo() -> Arc<Self> {
        Self::new(|call| {
            Ok(GatewayReply {
                text: format!("answer to {}", call.input),
                tokens_used: Some(42),
            })
        })
    }

    fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelGateway for StubGateway {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-model"
    }

    async fn respond(&self, call: &GatewayCall) -> Result<GatewayReply> {
        self.calls.lock().unwrap().push(call.clone());
        (self.respond)(call)
    }
}

fn router(gw: Arc<StubGateway>) -> Router {
    app(AppState::new(Orchestrator::new(
        gw,
        OrchestratorConfig::default(),
    )))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(resp).await
}

async fn post(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(resp).await
}

async fn read(resp: axum::response::Response) -> (StatusCode, Value) {
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, v)
}

#[tokio::test]
async fn health_is_healthy_even_when_gateway_is_down() {
    let gw = StubGateway::new(|_| Err(Error::Transport("connection refused".into())));
    for uri in ["/health", "/api/health"] {
        let (status, v) = get(router(gw.clone()), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v, json!({"status": "healthy", "service": "search-agent"}));
    }
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn operations_are_served_at_root_and_under_api() {
    let gw = StubGateway::new(|call| {
        let text = if call.agent.name == "QueryGenerator" {
            "only one".to_string()
        } else {
            format!("answer to {}", call.input)
        };
        Ok(GatewayReply {
            text,
            tokens_used: None,
        })
    });
    for prefix in ["", "/api"] {
        for (uri, body) in [
            ("/search", r#"{"query":"q"}"#),
            ("/chat", r#"{"message":"hi"}"#),
            ("/search/multi-query", r#"{"queries":["a","b"]}"#),
            ("/research", r#"{"topic":"t","depth":"basic"}"#),
        ] {
            let uri = format!("{prefix}{uri}");
            let (status, v) = post(router(gw.clone()), &uri, body).await;
            assert_eq!(status, StatusCode::OK, "POST {uri}");
            assert_eq!(v["success"].as_bool(), Some(true), "POST {uri}: {v}");
        }
        for uri in ["/agent/info", "/health"] {
            let uri = format!("{prefix}{uri}");
            let (status, _) = get(router(gw.clone()), &uri).await;
            assert_eq!(status, StatusCode::OK, "GET {uri}");
        }
    }
    // search 1 + chat 1 + multi-query 3 + research 3, per prefix.
    assert_eq!(gw.calls().len(), 16);
}

#[tokio::test]
async fn root_level_validation_matches_api() {
    let gw = StubGateway::echo();
    let (status, v) = post(router(gw.clone()), "/search/multi-query", r#"{"queries":[]}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["detail"].as_str().is_some());
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn root_and_api_info_documents() {
    let gw = StubGateway::echo();
    let (status, v) = get(router(gw.clone()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["api"].as_str(), Some("/api"));
    assert!(v["message"].as_str().is_some());

    for uri in ["/api", "/api/"] {
        let (status, v) = get(router(gw.clone()), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(!v["version"].as_str().unwrap_or("").is_empty());
        assert_eq!(v["endpoints"]["search"].as_str(), Some("/api/search"));
    }
}

#[tokio::test]
async fn agent_info_reports_provider_and_model() {
    let (status, v) = get(router(StubGateway::echo()), "/api/agent/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["provider"].as_str(), Some("stub"));
    assert_eq!(v["model"].as_str(), Some("stub-model"));
    assert_eq!(v["default_context_size"].as_str(), Some("medium"));
    assert_eq!(v["tools"], json!(["web_search"]));
    assert_eq!(
        v["endpoints"]["multi_query_search"].as_str(),
        Some("/api/search/multi-query")
    );
    assert!(v["capabilities"].as_array().is_some_and(|a| !a.is_empty()));
}

#[tokio::test]
async fn search_success_envelope() {
    let gw = StubGateway::echo();
    let (status, v) = post(
        router(gw.clone()),
        "/api/search",
        r#"{"query":"rust 2024 edition","context_size":"high"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"].as_bool(), Some(true));
    assert_eq!(v["query"].as_str(), Some("rust 2024 edition"));
    assert_eq!(v["response"].as_str(), Some("answer to rust 2024 edition"));
    assert_eq!(v["metadata"]["search_context_size"].as_str(), Some("high"));
    assert_eq!(v["metadata"]["tokens_used"].as_u64(), Some(42));
    assert_eq!(v["metadata"]["tool"].as_str(), Some("web_search"));

    let calls = gw.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].web_search_context(), Some(ContextSize::High));
}

#[tokio::test]
async fn search_failure_is_a_200_with_error_type() {
    let gw = StubGateway::new(|_| Err(Error::Timeout("deadline exceeded".into())));
    let (status, v) = post(router(gw), "/api/search", r#"{"query":"q"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"].as_bool(), Some(false));
    assert_eq!(v["query"].as_str(), Some("q"));
    assert_eq!(v["error_type"].as_str(), Some("ProviderTimeout"));
    assert!(v["error"].as_str().is_some_and(|e| e.contains("deadline")));
}

#[tokio::test]
async fn search_validation_errors_are_400_without_gateway_calls() {
    let gw = StubGateway::echo();
    for body in [
        r#"{"query":"   "}"#,
        r#"{"query":"q","context_size":"huge"}"#,
        r#"{"query":"q","num_results":0}"#,
        r#"{"query":"q","num_results":21}"#,
        r#"{"context_size":"low"}"#,
        r#"not json"#,
    ] {
        let (status, v) = post(router(gw.clone()), "/api/search", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body={body}");
        assert!(v["detail"].as_str().is_some(), "body={body} resp={v}");
    }
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn chat_without_search_declares_no_tools() {
    let gw = StubGateway::echo();
    let body = json!({
        "message": "bye",
        "conversation_history": [{"role": "user", "content": "hi"}, {"content": "no role"}],
        "enable_search": false
    });
    let (status, v) = post(router(gw.clone()), "/api/chat", &body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"].as_bool(), Some(true));
    assert_eq!(v["message"].as_str(), Some("bye"));
    assert_eq!(v["metadata"]["search_enabled"].as_bool(), Some(false));
    assert!(v["conversation_id"].is_null());

    let calls = gw.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].tools.is_empty());
    let input = &calls[0].input;
    let hi = input.find("user: hi").expect("history line");
    let defaulted = input.find("user: no role").expect("defaulted role");
    let current = input.find("Current message: bye").expect("current message");
    assert!(hi < defaulted && defaulted < current, "{input}");
}

#[tokio::test]
async fn chat_searches_by_default() {
    let gw = StubGateway::echo();
    let (status, _) = post(router(gw.clone()), "/api/chat", r#"{"message":"hello"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let calls = gw.calls();
    assert_eq!(calls[0].web_search_context(), Some(ContextSize::Medium));
    assert_eq!(calls[0].input, "hello");
}

#[tokio::test]
async fn chat_blank_message_is_400() {
    let gw = StubGateway::echo();
    let (status, v) = post(router(gw.clone()), "/api/chat", r#"{"message":""}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["detail"].as_str().unwrap_or("").contains("message"));
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn empty_multi_query_is_400_before_any_gateway_call() {
    let gw = StubGateway::echo();
    for body in [r#"{"queries":[]}"#, r#"{"queries":["ok","  "]}"#, r#"{}"#] {
        let (status, v) = post(router(gw.clone()), "/api/search/multi-query", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body={body}");
        assert!(v["detail"].as_str().is_some());
    }
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn multi_query_reports_partial_failures() {
    let gw = StubGateway::new(|call| {
        if call.input == "bad" {
            Err(Error::Rejected {
                status: 429,
                message: "rate limited".into(),
            })
        } else {
            Ok(GatewayReply {
                text: format!("r:{}", call.input.len()),
                tokens_used: None,
            })
        }
    });
    let (status, v) = post(
        router(gw.clone()),
        "/api/search/multi-query",
        r#"{"queries":["good","bad"]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"].as_bool(), Some(true));
    assert_eq!(v["partial"].as_bool(), Some(true));
    assert_eq!(v["individual_results"].as_array().map(Vec::len), Some(1));
    assert_eq!(v["failed_queries"][0]["query"].as_str(), Some("bad"));
    assert_eq!(
        v["failed_queries"][0]["error_type"].as_str(),
        Some("ProviderRejected")
    );
    assert_eq!(v["metadata"]["num_queries"].as_u64(), Some(2));
    // Two searches, then one synthesis.
    assert_eq!(gw.calls().len(), 3);
}

#[tokio::test]
async fn multi_query_failure_echoes_queries() {
    let gw = StubGateway::new(|_| Err(Error::Provider("HTTP 500: boom".into())));
    let (status, v) = post(
        router(gw),
        "/api/search/multi-query",
        r#"{"queries":["a","b"]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"].as_bool(), Some(false));
    assert_eq!(v["queries"], json!(["a", "b"]));
    assert_eq!(v["error_type"].as_str(), Some("Unknown"));
}

#[tokio::test]
async fn research_defaults_to_detailed() {
    let gw = StubGateway::new(|call| {
        let text = if call.agent.name == "QueryGenerator" {
            "q1\nq2\nq3\nq4\nq5".to_string()
        } else {
            format!("about {}", call.input)
        };
        Ok(GatewayReply {
            text,
            tokens_used: None,
        })
    });
    let (status, v) = post(router(gw.clone()), "/api/research", r#"{"topic":"wasm"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"].as_bool(), Some(true));
    assert_eq!(v["depth"].as_str(), Some("detailed"));
    assert_eq!(v["research_queries"].as_array().map(Vec::len), Some(5));
    assert_eq!(v["metadata"]["context_size"].as_str(), Some("medium"));
    // Generation, five searches, report.
    assert_eq!(gw.calls().len(), 7);
}

#[tokio::test]
async fn research_rejects_unknown_depth_and_blank_topic() {
    let gw = StubGateway::echo();
    for body in [
        r#"{"topic":"x","depth":"deep"}"#,
        r#"{"topic":" "}"#,
    ] {
        let (status, _) = post(router(gw.clone()), "/api/research", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body={body}");
    }
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn research_failure_echoes_topic() {
    let gw = StubGateway::new(|_| Err(Error::InvalidArgument("bad model".into())));
    let (status, v) = post(router(gw.clone()), "/api/research", r#"{"topic":"t"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"].as_bool(), Some(false));
    assert_eq!(v["topic"].as_str(), Some("t"));
    assert_eq!(v["error_type"].as_str(), Some("InvalidArgument"));
    assert_eq!(gw.calls().len(), 1);
}
