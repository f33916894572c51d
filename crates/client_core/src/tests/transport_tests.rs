use std::{collections::HashMap, time::Duration};

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode as HttpStatus},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::{
    error::ErrorClassification,
    protocol::{APPSYNC_WS_PROTOCOL, CREATE_TODO, ON_CREATE_TODO},
};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot, Mutex},
    time::timeout,
};

use super::*;
use crate::test_support::StaticIdentity;

#[derive(Clone)]
struct MockState {
    reply: Arc<Mutex<(HttpStatus, Value)>>,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    init_payloads: Arc<Mutex<Vec<Value>>>,
    completed: Arc<Mutex<Option<oneshot::Sender<(String, String)>>>>,
    /// AppSync mock: `connectionTimeoutMs` sent in the ack.
    keep_alive_ms: u64,
    /// AppSync mock: stay silent after `start_ack`.
    silent: bool,
}

impl MockState {
    fn replying(status: HttpStatus, body: Value) -> Self {
        Self {
            reply: Arc::new(Mutex::new((status, body))),
            seen: Arc::new(Mutex::new(Vec::new())),
            init_payloads: Arc::new(Mutex::new(Vec::new())),
            completed: Arc::new(Mutex::new(None)),
            keep_alive_ms: 300_000,
            silent: false,
        }
    }
}

async fn handle_graphql(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (HttpStatus, Json<Value>) {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.seen.lock().await.push((authorization, body));
    let (status, reply) = state.reply.lock().await.clone();
    (status, Json(reply))
}

async fn handle_realtime(State(state): State<MockState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.protocols([GRAPHQL_WS_PROTOCOL])
        .on_upgrade(move |socket| run_realtime(socket, state))
}

async fn recv_frame(socket: &mut WebSocket) -> Option<Value> {
    loop {
        match socket.recv().await? {
            Ok(WsMessage::Text(text)) => return serde_json::from_str(&text).ok(),
            Ok(WsMessage::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

async fn run_realtime(mut socket: WebSocket, state: MockState) {
    let Some(init) = recv_frame(&mut socket).await else {
        return;
    };
    state.init_payloads.lock().await.push(init);
    let ack = json!({ "type": "connection_ack" }).to_string();
    if socket.send(WsMessage::Text(ack)).await.is_err() {
        return;
    }

    let Some(subscribe) = recv_frame(&mut socket).await else {
        return;
    };
    let id = subscribe["id"].as_str().unwrap_or_default().to_string();
    let operation = subscribe["payload"]["operationName"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let ping = json!({ "type": "ping" }).to_string();
    let next = json!({
        "type": "next",
        "id": id,
        "payload": { "data": { "onCreateTodo": {
            "id": "t-1",
            "title": "From the socket",
            "createdAt": "2025-07-01T09:00:00.000Z"
        }}}
    })
    .to_string();
    if socket.send(WsMessage::Text(ping)).await.is_err()
        || socket.send(WsMessage::Text(next)).await.is_err()
    {
        return;
    }

    while let Some(frame) = recv_frame(&mut socket).await {
        if frame["type"] == "complete" {
            if let Some(tx) = state.completed.lock().await.take() {
                let _ = tx.send((operation, frame["id"].as_str().unwrap_or_default().to_string()));
            }
            break;
        }
    }
}

async fn handle_appsync(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let header = params
        .get("header")
        .and_then(|encoded| STANDARD.decode(encoded).ok())
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .unwrap_or(Value::Null);
    state.init_payloads.lock().await.push(header);
    ws.protocols([APPSYNC_WS_PROTOCOL])
        .on_upgrade(move |socket| run_appsync(socket, state))
}

async fn run_appsync(mut socket: WebSocket, state: MockState) {
    let Some(init) = recv_frame(&mut socket).await else {
        return;
    };
    if init["type"] != "connection_init" {
        return;
    }
    let ack = json!({
        "type": "connection_ack",
        "payload": { "connectionTimeoutMs": state.keep_alive_ms }
    })
    .to_string();
    if socket.send(WsMessage::Text(ack)).await.is_err() {
        return;
    }

    let Some(start) = recv_frame(&mut socket).await else {
        return;
    };
    let id = start["id"].as_str().unwrap_or_default().to_string();
    let request: Value =
        serde_json::from_str(start["payload"]["data"].as_str().unwrap_or("{}")).unwrap_or_default();
    let operation = request["operationName"].as_str().unwrap_or_default().to_string();
    state.init_payloads.lock().await.push(start);

    let start_ack = json!({ "type": "start_ack", "id": id }).to_string();
    if socket.send(WsMessage::Text(start_ack)).await.is_err() {
        return;
    }
    if !state.silent {
        let ka = json!({ "type": "ka" }).to_string();
        let data = json!({
            "type": "data",
            "id": id,
            "payload": { "data": { "onCreateTodo": {
                "id": "t-2",
                "title": "From AppSync",
                "createdAt": "2025-07-01T09:00:00.000Z"
            }}}
        })
        .to_string();
        if socket.send(WsMessage::Text(ka)).await.is_err()
            || socket.send(WsMessage::Text(data)).await.is_err()
        {
            return;
        }
    }

    while let Some(frame) = recv_frame(&mut socket).await {
        if frame["type"] == "stop" {
            if let Some(tx) = state.completed.lock().await.take() {
                let _ = tx.send((operation, frame["id"].as_str().unwrap_or_default().to_string()));
            }
            break;
        }
    }
}

async fn spawn_graphql_server(state: MockState) -> Url {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/graphql", post(handle_graphql).get(handle_realtime))
        .route("/realtime", get(handle_appsync))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Url::parse(&format!("http://{addr}/graphql")).expect("url")
}

async fn transport_for(state: MockState) -> HttpGraphqlTransport {
    let endpoint = spawn_graphql_server(state).await;
    HttpGraphqlTransport::new(endpoint, None, StaticIdentity::signed_in("token-abc")).expect("transport")
}

#[tokio::test]
async fn execute_posts_the_document_with_the_session_token() {
    let state = MockState::replying(
        HttpStatus::OK,
        json!({ "data": { "createTodo": { "id": "t-1", "title": "Buy milk" } } }),
    );
    let transport = transport_for(state.clone()).await;

    let value = transport
        .execute(&CREATE_TODO, json!({ "input": { "title": "Buy milk" } }))
        .await
        .expect("execute");

    assert_eq!(value["id"], "t-1");
    let seen = state.seen.lock().await;
    assert_eq!(seen.len(), 1);
    let (authorization, body) = &seen[0];
    assert_eq!(authorization.as_deref(), Some("token-abc"));
    assert_eq!(body["operationName"], "CreateTodo");
    assert_eq!(body["query"], CREATE_TODO.document);
    assert_eq!(body["variables"]["input"]["title"], "Buy milk");
}

#[tokio::test]
async fn graphql_errors_surface_as_remote_errors() {
    let state = MockState::replying(
        HttpStatus::OK,
        json!({
            "data": null,
            "errors": [{ "message": "Not Authorized to access createTodo", "errorType": "Unauthorized" }]
        }),
    );
    let transport = transport_for(state).await;

    let err = transport
        .execute(&CREATE_TODO, json!({}))
        .await
        .expect_err("remote error");

    let first = err.remote().and_then(|remote| remote.first()).expect("sub-error");
    assert_eq!(first.classification(), ErrorClassification::Unauthorized);
}

#[tokio::test]
async fn rejected_status_without_errors_counts_as_unauthorized() {
    let state = MockState::replying(HttpStatus::UNAUTHORIZED, json!({ "message": "expired" }));
    let transport = transport_for(state).await;

    let err = transport
        .execute(&CREATE_TODO, json!({}))
        .await
        .expect_err("unauthorized");

    let first = err.remote().and_then(|remote| remote.first()).expect("sub-error");
    assert_eq!(first.classification(), ErrorClassification::Unauthorized);
}

#[tokio::test]
async fn server_failure_reports_status() {
    let state = MockState::replying(HttpStatus::INTERNAL_SERVER_ERROR, json!({ "oops": true }));
    let transport = transport_for(state).await;

    let err = transport
        .execute(&CREATE_TODO, json!({}))
        .await
        .expect_err("status");

    assert!(matches!(err, ClientError::Status { status: 500, .. }));
}

#[tokio::test]
async fn null_root_field_is_a_missing_field() {
    let state = MockState::replying(HttpStatus::OK, json!({ "data": { "createTodo": null } }));
    let transport = transport_for(state).await;

    let err = transport
        .execute(&CREATE_TODO, json!({}))
        .await
        .expect_err("missing");

    assert!(matches!(err, ClientError::MissingField("createTodo")));
}

#[tokio::test]
async fn signed_out_calls_never_reach_the_server() {
    let state = MockState::replying(HttpStatus::OK, json!({}));
    let endpoint = spawn_graphql_server(state.clone()).await;
    let transport =
        HttpGraphqlTransport::new(endpoint, None, StaticIdentity::signed_out()).expect("transport");

    let err = transport
        .execute(&CREATE_TODO, json!({}))
        .await
        .expect_err("not authenticated");

    assert!(err.is_not_authenticated());
    assert!(state.seen.lock().await.is_empty());
}

#[test]
fn realtime_url_swaps_the_scheme() {
    let https = Url::parse("https://api.example.com/graphql").expect("url");
    let http = Url::parse("http://127.0.0.1:4000/graphql").expect("url");
    let ftp = Url::parse("ftp://example.com/graphql").expect("url");

    assert_eq!(
        realtime_url_for(&https).expect("wss").as_str(),
        "wss://api.example.com/graphql"
    );
    assert_eq!(
        realtime_url_for(&http).expect("ws").as_str(),
        "ws://127.0.0.1:4000/graphql"
    );
    assert!(matches!(realtime_url_for(&ftp), Err(ClientError::Endpoint(_))));
}

#[tokio::test]
async fn subscription_delivers_next_frames_and_completes_on_cancel() {
    let state = MockState::replying(HttpStatus::OK, json!({}));
    let (completed_tx, completed_rx) = oneshot::channel();
    *state.completed.lock().await = Some(completed_tx);
    let transport = transport_for(state.clone()).await;

    let subscription = transport
        .subscribe(&ON_CREATE_TODO, json!({}))
        .await
        .expect("subscribe");
    assert_eq!(subscription.operation(), "OnCreateTodo");

    let (data_tx, mut data_rx) = mpsc::unbounded_channel();
    let handle = subscription.listen(
        move |value| {
            let _ = data_tx.send(value);
        },
        |err| panic!("unexpected subscription error: {err}"),
    );

    let value = timeout(Duration::from_secs(5), data_rx.recv())
        .await
        .expect("data in time")
        .expect("data");
    assert_eq!(value["title"], "From the socket");

    handle.cancel();
    let (operation, _id) = timeout(Duration::from_secs(5), completed_rx)
        .await
        .expect("complete in time")
        .expect("complete frame");
    assert_eq!(operation, "OnCreateTodo");

    let init = state.init_payloads.lock().await;
    assert_eq!(init[0]["type"], "connection_init");
    assert_eq!(init[0]["payload"]["Authorization"], "token-abc");
}

#[test]
fn appsync_endpoints_derive_the_realtime_host() {
    let graphql =
        Url::parse("https://example.appsync-api.eu-west-1.amazonaws.com/graphql").expect("url");

    assert_eq!(
        realtime_url_for(&graphql).expect("realtime").as_str(),
        "wss://example.appsync-realtime-api.eu-west-1.amazonaws.com/graphql"
    );
    assert_eq!(
        RealtimeProtocol::detect(&graphql, None),
        RealtimeProtocol::AppSync
    );
}

#[test]
fn other_hosts_default_to_graphql_transport_ws() {
    let graphql = Url::parse("https://api.example.com/graphql").expect("url");
    let realtime =
        Url::parse("wss://example.appsync-realtime-api.eu-west-1.amazonaws.com/graphql").expect("url");

    assert_eq!(
        RealtimeProtocol::detect(&graphql, None),
        RealtimeProtocol::GraphqlTransportWs
    );
    assert_eq!(
        RealtimeProtocol::detect(&graphql, Some(&realtime)),
        RealtimeProtocol::AppSync
    );
}

async fn appsync_transport_for(state: MockState) -> (HttpGraphqlTransport, Url) {
    let endpoint = spawn_graphql_server(state).await;
    let mut realtime = endpoint.clone();
    realtime.set_path("/realtime");
    realtime.set_scheme("ws").expect("ws scheme");
    let transport = HttpGraphqlTransport::new(
        endpoint.clone(),
        Some(realtime),
        StaticIdentity::signed_in("token-abc"),
    )
    .expect("transport")
    .with_realtime_protocol(RealtimeProtocol::AppSync);
    (transport, endpoint)
}

#[tokio::test]
async fn appsync_subscription_authorizes_and_stops_on_cancel() {
    let state = MockState::replying(HttpStatus::OK, json!({}));
    let (completed_tx, completed_rx) = oneshot::channel();
    *state.completed.lock().await = Some(completed_tx);
    let (transport, endpoint) = appsync_transport_for(state.clone()).await;

    let subscription = transport
        .subscribe(&ON_CREATE_TODO, json!({}))
        .await
        .expect("subscribe");
    let (data_tx, mut data_rx) = mpsc::unbounded_channel();
    let handle = subscription.listen(
        move |value| {
            let _ = data_tx.send(value);
        },
        |err| panic!("unexpected subscription error: {err}"),
    );

    let value = timeout(Duration::from_secs(5), data_rx.recv())
        .await
        .expect("data in time")
        .expect("data");
    assert_eq!(value["title"], "From AppSync");

    handle.cancel();
    let (operation, _id) = timeout(Duration::from_secs(5), completed_rx)
        .await
        .expect("stop in time")
        .expect("stop frame");
    assert_eq!(operation, "OnCreateTodo");

    let expected_host = format!(
        "{}:{}",
        endpoint.host_str().expect("host"),
        endpoint.port().expect("port")
    );
    let frames = state.init_payloads.lock().await;
    let header = &frames[0];
    assert_eq!(header["host"], expected_host.as_str());
    assert_eq!(header["Authorization"], "token-abc");
    let start = &frames[1];
    assert_eq!(start["type"], "start");
    assert_eq!(
        start["payload"]["extensions"]["authorization"]["Authorization"],
        "token-abc"
    );
    let request: Value =
        serde_json::from_str(start["payload"]["data"].as_str().expect("data string")).expect("json");
    assert_eq!(request["query"], ON_CREATE_TODO.document);
}

#[tokio::test]
async fn appsync_subscription_reports_a_missed_keep_alive() {
    let mut state = MockState::replying(HttpStatus::OK, json!({}));
    state.keep_alive_ms = 200;
    state.silent = true;
    let (transport, _endpoint) = appsync_transport_for(state).await;

    let subscription = transport
        .subscribe(&ON_CREATE_TODO, json!({}))
        .await
        .expect("subscribe");
    let (err_tx, mut err_rx) = mpsc::unbounded_channel();
    let _handle = subscription.listen(
        |value| panic!("unexpected data: {value}"),
        move |err| {
            let _ = err_tx.send(err);
        },
    );

    let err = timeout(Duration::from_secs(5), err_rx.recv())
        .await
        .expect("error in time")
        .expect("error");
    assert!(matches!(err, ClientError::SubscriptionClosed(_)));
}
