//! End-to-end bridge tests
//!
//! A mock realtime server and a mock Twilio client talk to the real router
//! over localhost sockets. The mock upstream reports every event it receives
//! and sends whatever the test scripts.

mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_hdr_async, connect_async};

use callbridge::{routes, state::AppState};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct MockUpstream {
    addr: SocketAddr,
    headers: Arc<Mutex<Vec<(String, String)>>>,
    /// Every text event received, `None` once the socket closed
    seen: mpsc::UnboundedReceiver<Option<Value>>,
    /// Received events skipped over by `expect`
    backlog: Vec<Value>,
    /// Events to send; `Value::Null` closes the socket
    script: mpsc::UnboundedSender<Value>,
}

async fn start_upstream() -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let headers = Arc::new(Mutex::new(Vec::new()));
    let (seen_tx, seen) = mpsc::unbounded_channel();
    let (script, mut script_rx) = mpsc::unbounded_channel::<Value>();

    let captured = headers.clone();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let mut captured = captured.lock().unwrap();
            for (name, value) in request.headers() {
                captured.push((
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                ));
            }
            Ok(response)
        };
        let ws = accept_hdr_async(stream, callback).await.unwrap();
        let (mut sink, mut source) = ws.split();

        loop {
            tokio::select! {
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        let value: Value = serde_json::from_str(text.as_str()).unwrap();
                        let _ = seen_tx.send(Some(value));
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        let _ = seen_tx.send(None);
                        break;
                    }
                    Some(Ok(_)) => {}
                },
                Some(event) = script_rx.recv() => {
                    if event.is_null() {
                        let _ = sink.close().await;
                        let _ = seen_tx.send(None);
                        break;
                    }
                    sink.send(Message::Text(event.to_string().into())).await.unwrap();
                }
            }
        }
    });

    MockUpstream {
        addr,
        headers,
        seen,
        backlog: Vec::new(),
        script,
    }
}

impl MockUpstream {
    /// Wait for the next event of `event_type`. Other events are kept for
    /// later calls.
    async fn expect(&mut self, event_type: &str) -> Value {
        if let Some(index) = self.backlog.iter().position(|v| v["type"] == event_type) {
            return self.backlog.remove(index);
        }
        timeout(STEP_TIMEOUT, async {
            loop {
                match self.seen.recv().await.flatten() {
                    Some(value) if value["type"] == event_type => return value,
                    Some(value) => self.backlog.push(value),
                    None => panic!("upstream closed while waiting for {event_type}"),
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {event_type}"))
    }

    /// Wait for the bridge to close the upstream socket.
    async fn expect_closed(&mut self) {
        timeout(STEP_TIMEOUT, async {
            while let Some(Some(_)) = self.seen.recv().await {}
        })
        .await
        .expect("upstream was not closed");
    }

    fn close(&self) {
        self.script.send(Value::Null).unwrap();
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .lock()
            .unwrap()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}

async fn start_bridge(upstream: SocketAddr) -> SocketAddr {
    let state = AppState::new(common::test_config(&format!("ws://{upstream}")))
        .await
        .unwrap();
    let app = routes::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn send(client: &mut Client, frame: Value) {
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

/// Next JSON frame from the bridge, `None` if the socket closed.
async fn recv(client: &mut Client) -> Option<Value> {
    timeout(STEP_TIMEOUT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(serde_json::from_str(text.as_str()).unwrap());
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("timed out waiting for a telephony frame")
}

fn start_frame() -> Value {
    json!({
        "event": "start",
        "sequenceNumber": "1",
        "start": {"streamSid": "MZ123", "callSid": "CA456", "tracks": ["inbound"]},
        "streamSid": "MZ123"
    })
}

fn media_frame(timestamp: u64, payload: &str) -> Value {
    json!({
        "event": "media",
        "streamSid": "MZ123",
        "media": {"track": "inbound", "chunk": "1", "timestamp": timestamp.to_string(), "payload": payload}
    })
}

#[tokio::test]
async fn test_barge_in_truncates_and_clears() {
    let mut upstream = start_upstream().await;
    let bridge = start_bridge(upstream.addr).await;

    let (mut client, _) = connect_async(format!("ws://{bridge}/media-stream"))
        .await
        .unwrap();

    send(&mut client, json!({"event": "connected", "protocol": "Call", "version": "1.0.0"})).await;
    send(&mut client, start_frame()).await;
    send(&mut client, media_frame(100, "AAAA")).await;

    let append = upstream.expect("input_audio_buffer.append").await;
    assert_eq!(append["audio"], "AAAA");

    let update = upstream.expect("session.update").await;
    assert_eq!(update["session"]["input_audio_format"], "g711_ulaw");
    assert_eq!(update["session"]["voice"], "alloy");
    assert_eq!(update["session"]["turn_detection"]["type"], "server_vad");

    assert_eq!(upstream.header("authorization").as_deref(), Some("Bearer sk-test"));
    assert_eq!(upstream.header("openai-beta").as_deref(), Some("realtime=v1"));

    upstream
        .script
        .send(json!({
            "type": "response.audio.delta",
            "response_id": "resp_1",
            "item_id": "item_1",
            "output_index": 0,
            "content_index": 0,
            "delta": "UklGRg=="
        }))
        .unwrap();

    let media = recv(&mut client).await.unwrap();
    assert_eq!(
        media,
        json!({"event": "media", "streamSid": "MZ123", "media": {"payload": "UklGRg=="}})
    );
    let mark = recv(&mut client).await.unwrap();
    assert_eq!(
        mark,
        json!({"event": "mark", "streamSid": "MZ123", "mark": {"name": "responsePart-1"}})
    );

    // Caller speaks over the reply 300 ms after it started playing.
    send(&mut client, media_frame(400, "BBBB")).await;
    let append = upstream.expect("input_audio_buffer.append").await;
    assert_eq!(append["audio"], "BBBB");

    upstream
        .script
        .send(json!({
            "type": "input_audio_buffer.speech_started",
            "audio_start_ms": 380,
            "item_id": "item_user_1"
        }))
        .unwrap();

    let truncate = upstream.expect("conversation.item.truncate").await;
    assert_eq!(truncate["item_id"], "item_1");
    assert_eq!(truncate["content_index"], 0);
    assert_eq!(truncate["audio_end_ms"], 300);

    let clear = recv(&mut client).await.unwrap();
    assert_eq!(clear, json!({"event": "clear", "streamSid": "MZ123"}));

    // Caller hangs up; the bridge closes the upstream connection.
    send(&mut client, json!({"event": "stop", "streamSid": "MZ123"})).await;
    client.close(None).await.unwrap();
    upstream.expect_closed().await;
}

#[tokio::test]
async fn test_acknowledged_playback_is_not_truncated() {
    let mut upstream = start_upstream().await;
    let bridge = start_bridge(upstream.addr).await;

    let (mut client, _) = connect_async(format!("ws://{bridge}/media-stream"))
        .await
        .unwrap();

    send(&mut client, start_frame()).await;
    send(&mut client, media_frame(20, "AAAA")).await;
    upstream.expect("input_audio_buffer.append").await;

    upstream
        .script
        .send(json!({"type": "response.audio.delta", "item_id": "item_1", "delta": "AAAA"}))
        .unwrap();
    recv(&mut client).await.unwrap();
    let mark = recv(&mut client).await.unwrap();

    // Twilio echoes the mark once the chunk has played.
    send(
        &mut client,
        json!({"event": "mark", "streamSid": "MZ123", "mark": mark["mark"]}),
    )
    .await;
    send(&mut client, media_frame(60, "BBBB")).await;
    upstream.expect("input_audio_buffer.append").await;

    upstream
        .script
        .send(json!({"type": "input_audio_buffer.speech_started", "audio_start_ms": 50}))
        .unwrap();
    upstream
        .script
        .send(json!({"type": "response.audio.delta", "item_id": "item_2", "delta": "CCCC"}))
        .unwrap();

    // No clear is sent when nothing is still playing; the next frame is the
    // new reply.
    let next = recv(&mut client).await.unwrap();
    assert_eq!(next["event"], "media");
    assert_eq!(next["media"]["payload"], "CCCC");

    client.close(None).await.unwrap();
    upstream.expect_closed().await;
}

#[tokio::test]
async fn test_function_call_gets_output_and_new_response() {
    let mut upstream = start_upstream().await;
    let bridge = start_bridge(upstream.addr).await;

    let (mut client, _) = connect_async(format!("ws://{bridge}/media-stream"))
        .await
        .unwrap();
    send(&mut client, start_frame()).await;
    upstream.expect("session.update").await;

    upstream
        .script
        .send(json!({
            "type": "response.output_item.added",
            "response_id": "resp_1",
            "item": {"id": "item_fc", "type": "function_call", "call_id": "call_1", "name": "call_forwarding"}
        }))
        .unwrap();
    upstream
        .script
        .send(json!({
            "type": "response.function_call_arguments.done",
            "item_id": "item_fc",
            "call_id": "call_1",
            "arguments": "{\"name\":\"Nobody\"}"
        }))
        .unwrap();

    let output = upstream.expect("conversation.item.create").await;
    assert_eq!(output["item"]["type"], "function_call_output");
    assert_eq!(output["item"]["call_id"], "call_1");
    let result: Value = serde_json::from_str(output["item"]["output"].as_str().unwrap()).unwrap();
    assert_eq!(result["status"], "unavailable");

    upstream.expect("response.create").await;

    client.close(None).await.unwrap();
    upstream.expect_closed().await;
}

#[tokio::test]
async fn test_upstream_loss_hangs_up_the_call() {
    let mut upstream = start_upstream().await;
    let bridge = start_bridge(upstream.addr).await;

    let (mut client, _) = connect_async(format!("ws://{bridge}/media-stream"))
        .await
        .unwrap();
    send(&mut client, start_frame()).await;
    upstream.expect("session.update").await;

    // Error events are logged, not relayed to the caller.
    upstream
        .script
        .send(json!({"type": "error", "error": {"type": "server_error", "message": "overloaded"}}))
        .unwrap();
    upstream.close();

    assert_eq!(recv(&mut client).await, None);
}

#[tokio::test]
async fn test_unreachable_upstream_closes_the_call() {
    // Bind and drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let bridge = start_bridge(dead).await;
    let (mut client, _) = connect_async(format!("ws://{bridge}/media-stream"))
        .await
        .unwrap();

    assert_eq!(recv(&mut client).await, None);
}
