//! End-to-end tests against an in-process fake DevTools endpoint.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::routing::get;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use ytctl::{
	Catalog, CdpConnector, ConfigError, Controller, ControllerConfig, ControllerHandle, DispatchError, Error,
	HttpTabSource, StatusEvent, StatusReceiver, Timings, status_channel,
};

#[derive(Default)]
struct Browser {
	listing: Mutex<Vec<Value>>,
	/// `(session number, frame)` for every text frame received.
	frames: Mutex<Vec<(usize, Value)>>,
	sessions: Mutex<usize>,
	kick: Notify,
}

impl Browser {
	fn frames(&self) -> Vec<(usize, Value)> {
		self.frames.lock().unwrap().clone()
	}

	fn expressions(&self) -> Vec<String> {
		self.frames()
			.into_iter()
			.map(|(_, frame)| frame["params"]["expression"].as_str().unwrap_or_default().to_string())
			.collect()
	}
}

type Shared = Arc<Browser>;

async fn start_browser() -> (Shared, SocketAddr) {
	let browser = Shared::default();
	let app = Router::new()
		.route("/json", get(|State(b): State<Shared>| async move { Json(b.listing.lock().unwrap().clone()) }))
		.route(
			"/devtools/page/{id}",
			get(
				|ws: WebSocketUpgrade, Path(_id): Path<String>, State(b): State<Shared>| async move {
					ws.on_upgrade(move |socket| serve_tab(socket, b))
				},
			),
		)
		.with_state(Arc::clone(&browser));

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(browser, addr)
}

async fn serve_tab(mut socket: WebSocket, browser: Shared) {
	let session = {
		let mut sessions = browser.sessions.lock().unwrap();
		*sessions += 1;
		*sessions
	};

	loop {
		let message = tokio::select! {
			_ = browser.kick.notified() => {
				let _ = socket.send(Message::Close(None)).await;
				return;
			}
			message = socket.recv() => message,
		};
		match message {
			Some(Ok(Message::Text(text))) => {
				let frame: Value = serde_json::from_str(text.as_str()).unwrap();
				let id = frame["id"].clone();
				browser.frames.lock().unwrap().push((session, frame));
				let reply = json!({ "id": id, "result": { "result": { "type": "undefined" } } });
				let _ = socket.send(Message::Text(reply.to_string().into())).await;
			}
			Some(Ok(_)) => {}
			_ => return,
		}
	}
}

fn video_tab(addr: SocketAddr, id: &str) -> Value {
	json!({
		"id": id,
		"type": "page",
		"title": "video",
		"url": format!("https://www.youtube.com/watch?v={id}"),
		"webSocketDebuggerUrl": format!("ws://{addr}/devtools/page/{id}"),
	})
}

fn config(browser: SocketAddr) -> ControllerConfig {
	ControllerConfig {
		control_port: 0,
		discovery_url: Some(format!("http://{browser}/json")),
		timings: Timings {
			connect_timeout: Duration::from_secs(1),
			connect_timeout_retry: Duration::from_millis(10),
			connect_error_retry: Duration::from_millis(10),
			no_tab_retry: Duration::from_millis(20),
			ambiguous_retry: Duration::from_millis(20),
			unreachable_retry: Duration::from_millis(20),
			discovery_ceiling: Duration::from_secs(30),
			http_timeout: Duration::from_secs(1),
			ipc_read_timeout: Duration::from_millis(200),
		},
		..ControllerConfig::default()
	}
}

async fn start(config: &ControllerConfig) -> (ControllerHandle, StatusReceiver) {
	let (status, events) = status_channel();
	let source = HttpTabSource::new(config.discovery_url(), config.tab_filter(), config.timings.http_timeout).unwrap();
	let connector = CdpConnector::new(config.timings.connect_timeout);
	let handle = Controller::start(config, Catalog::builtin(), source, connector, status)
		.await
		.unwrap();
	(handle, events)
}

async fn send(addr: SocketAddr, command: &str) {
	let mut stream = TcpStream::connect(addr).await.unwrap();
	stream.write_all(command.as_bytes()).await.unwrap();
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
	for _ in 0..200 {
		if check() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(25)).await;
	}
	panic!("timed out waiting for {what}");
}

fn drain(events: &mut StatusReceiver) -> Vec<StatusEvent> {
	let mut out = Vec::new();
	while let Ok(event) = events.try_recv() {
		out.push(event);
	}
	out
}

#[tokio::test]
async fn skip_forward_reaches_the_tab() {
	let (browser, addr) = start_browser().await;
	browser.listing.lock().unwrap().push(video_tab(addr, "ABC"));

	let (handle, mut events) = start(&config(addr)).await;
	send(handle.control_addr(), "skip_forward").await;
	eventually("the evaluate frame", || !browser.frames().is_empty()).await;

	handle.shutdown().await;
	tokio::time::timeout(Duration::from_secs(2), handle.wait())
		.await
		.unwrap()
		.unwrap();

	let frames = browser.frames();
	assert_eq!(frames.len(), 1);
	assert_eq!(
		frames[0].1,
		json!({
			"id": 1,
			"method": "Runtime.evaluate",
			"params": { "expression": "document.querySelector('video').currentTime += 5" },
		})
	);

	let events = drain(&mut events);
	let skips = events.iter().filter(|e| e.text == "Skipped forward 5 seconds").count();
	assert_eq!(skips, 1);
}

#[tokio::test]
async fn skip_length_can_change_while_running() {
	let (browser, addr) = start_browser().await;
	browser.listing.lock().unwrap().push(video_tab(addr, "ABC"));

	let (handle, mut events) = start(&config(addr)).await;
	assert!(matches!(handle.set_skip_seconds(7), Err(ConfigError::UnsupportedSkip(7))));
	handle.set_skip_seconds(30).unwrap();

	send(handle.control_addr(), "skip_backward").await;
	eventually("the evaluate frame", || !browser.frames().is_empty()).await;
	assert_eq!(browser.expressions(), ["document.querySelector('video').currentTime -= 30"]);

	handle.shutdown().await;
	handle.wait().await.unwrap();

	let texts: Vec<String> = drain(&mut events).into_iter().map(|e| e.text).collect();
	assert!(texts.iter().any(|t| t == "Set skip seconds to 30s"));
	assert!(!texts.iter().any(|t| t.contains("7s")));
	assert!(texts.iter().any(|t| t == "Skipped backward 30 seconds"));
}

#[tokio::test]
async fn commands_wait_for_a_tab_to_appear() {
	let (browser, addr) = start_browser().await;
	browser.listing.lock().unwrap().push(json!({
		"id": "HOME",
		"type": "page",
		"url": "https://www.youtube.com/",
		"webSocketDebuggerUrl": format!("ws://{addr}/devtools/page/HOME"),
	}));

	let (handle, mut events) = start(&config(addr)).await;
	send(handle.control_addr(), "cc").await;
	send(handle.control_addr(), "theater").await;
	tokio::time::sleep(Duration::from_millis(150)).await;
	assert!(browser.frames().is_empty());

	browser.listing.lock().unwrap().push(video_tab(addr, "XYZ"));
	eventually("both commands", || browser.frames().len() == 2).await;
	assert_eq!(
		browser.expressions(),
		[
			"document.querySelector('.ytp-subtitles-button')?.click()",
			"document.querySelector('.ytp-size-button')?.click()",
		]
	);

	handle.shutdown().await;
	handle.wait().await.unwrap();
	assert!(drain(&mut events).iter().any(|e| e.text.contains("No YouTube video detected")));
}

#[tokio::test]
async fn reconnects_after_the_browser_drops_the_socket() {
	let (browser, addr) = start_browser().await;
	browser.listing.lock().unwrap().push(video_tab(addr, "ABC"));

	let (handle, _events) = start(&config(addr)).await;
	send(handle.control_addr(), "restart").await;
	eventually("first session", || browser.frames().len() == 1).await;

	tokio::time::sleep(Duration::from_millis(50)).await;
	browser.kick.notify_waiters();

	// Commands that hit the dead socket are dropped; keep sending until one
	// arrives over a fresh session.
	let control = handle.control_addr();
	for _ in 0..40 {
		send(control, "fullscreen").await;
		tokio::time::sleep(Duration::from_millis(50)).await;
		if browser.frames().iter().any(|(session, _)| *session > 1) {
			break;
		}
	}

	let frames = browser.frames();
	assert!(frames.iter().any(|(session, _)| *session == 2), "no second session: {frames:?}");
	assert_eq!(frames[0].0, 1);

	handle.shutdown().await;
	handle.wait().await.unwrap();
}

#[tokio::test]
async fn shutdown_while_idle_in_accept() {
	let (_browser, addr) = start_browser().await;

	// No tab at all: the dispatcher sits in discovery, the listener in accept.
	let (handle, _events) = start(&config(addr)).await;
	tokio::time::sleep(Duration::from_millis(50)).await;

	let started = std::time::Instant::now();
	handle.shutdown().await;
	tokio::time::timeout(Duration::from_secs(1), handle.wait())
		.await
		.expect("controller did not stop")
		.unwrap();
	assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn unreachable_debugger_hits_the_ceiling() {
	let port = {
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		listener.local_addr().unwrap().port()
	};
	let mut config = config(SocketAddr::from(([127, 0, 0, 1], port)));
	config.timings.discovery_ceiling = Duration::from_millis(100);

	let (handle, mut events) = start(&config).await;
	let lifecycle = handle.lifecycle();
	let result = tokio::time::timeout(Duration::from_secs(5), handle.wait()).await.unwrap();

	assert!(matches!(
		result,
		Err(Error::Dispatch(DispatchError::DiscoveryCeilingExceeded { .. }))
	));
	assert!(!lifecycle.is_running());
	assert!(drain(&mut events).iter().any(|e| e.text.contains("--remote-debugging-port")));
}
