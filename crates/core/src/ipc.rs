//! Loopback control socket.
//!
//! Wire protocol: connect, write the command name as raw text, close. The
//! listener performs one bounded read per connection and never replies.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::StartupError;
use crate::lifecycle::Lifecycle;
use crate::queue::{Command, CommandSender};

/// Largest payload read from one connection.
pub const MAX_COMMAND_BYTES: usize = 1024;

pub struct IpcListener {
	listener: TcpListener,
	queue: CommandSender,
	lifecycle: Lifecycle,
	read_timeout: Duration,
}

impl IpcListener {
	/// Binds the control port. Fails with [`StartupError::PortInUse`] when
	/// something else holds it.
	pub async fn bind(
		addr: SocketAddr,
		queue: CommandSender,
		lifecycle: Lifecycle,
		read_timeout: Duration,
	) -> Result<Self, StartupError> {
		let listener = TcpListener::bind(addr).await.map_err(|source| StartupError::PortInUse {
			port: addr.port(),
			source,
		})?;
		Ok(Self {
			listener,
			queue,
			lifecycle,
			read_timeout,
		})
	}

	pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
		self.listener.local_addr()
	}

	/// Accepts connections one at a time until the lifecycle stops.
	pub async fn run(self) {
		let addr = self.local_addr().ok();
		info!(target = "ytctl.ipc", addr = ?addr, "listening for commands");

		loop {
			let accepted = tokio::select! {
				biased;
				_ = self.lifecycle.stopped() => break,
				accepted = self.listener.accept() => accepted,
			};

			// A wake-up connection from shutdown lands here.
			if !self.lifecycle.is_running() {
				break;
			}

			let (mut stream, peer) = match accepted {
				Ok(conn) => conn,
				Err(err) => {
					warn!(target = "ytctl.ipc", error = %err, "accept failed");
					continue;
				}
			};

			let Some(name) = read_command(&mut stream, self.read_timeout).await else {
				continue;
			};
			debug!(target = "ytctl.ipc", %peer, command = %name, "received");
			if self.queue.enqueue(Command::new(name)).is_err() {
				debug!(target = "ytctl.ipc", "dispatcher gone, stopping listener");
				break;
			}
		}

		debug!(target = "ytctl.ipc", "listener stopped");
	}
}

/// Performs the single bounded read of a connection. `None` for empty,
/// timed-out or failed reads.
pub async fn read_command(stream: &mut TcpStream, read_timeout: Duration) -> Option<String> {
	let mut buf = [0u8; MAX_COMMAND_BYTES];
	match tokio::time::timeout(read_timeout, stream.read(&mut buf)).await {
		Ok(Ok(n)) => parse_command(&buf[..n]),
		Ok(Err(err)) => {
			warn!(target = "ytctl.ipc", error = %err, "read failed");
			None
		}
		Err(_) => {
			debug!(target = "ytctl.ipc", "client sent nothing before the read timeout");
			None
		}
	}
}

/// Decodes a payload leniently and trims it; blank payloads yield `None`.
pub fn parse_command(payload: &[u8]) -> Option<String> {
	let text = String::from_utf8_lossy(payload);
	let name = text.trim();
	(!name.is_empty()).then(|| name.to_string())
}

/// Opens and drops a connection to `addr` so a listener blocked in `accept`
/// gets to re-check the lifecycle. Errors are ignored: a listener that is
/// already gone needs no waking.
pub async fn wake_listener(addr: SocketAddr) {
	let attempt = tokio::time::timeout(Duration::from_millis(100), TcpStream::connect(addr)).await;
	if let Ok(Err(err)) = attempt {
		debug!(target = "ytctl.ipc", %addr, error = %err, "wake-up connect failed");
	}
}

#[cfg(test)]
mod tests {
	use std::net::Ipv4Addr;

	use tokio::io::AsyncWriteExt;

	use super::*;
	use crate::queue::{QueueItem, command_queue};

	#[test]
	fn payload_is_trimmed_and_decoded_leniently() {
		assert_eq!(parse_command(b"skip_forward"), Some("skip_forward".into()));
		assert_eq!(parse_command(b"  cc\r\n"), Some("cc".into()));
		assert_eq!(parse_command(b"   \n"), None);
		assert_eq!(parse_command(b""), None);
		assert_eq!(parse_command(b"bad\xffbyte"), Some("bad\u{fffd}byte".into()));
	}

	async fn bind_ephemeral() -> (IpcListener, crate::queue::CommandReceiver, Lifecycle) {
		let lifecycle = Lifecycle::new();
		let (tx, rx) = command_queue(&lifecycle);
		let listener = IpcListener::bind(
			(Ipv4Addr::LOCALHOST, 0).into(),
			tx,
			lifecycle.clone(),
			Duration::from_millis(200),
		)
		.await
		.unwrap();
		(listener, rx, lifecycle)
	}

	async fn send(addr: SocketAddr, payload: &[u8]) {
		let mut stream = TcpStream::connect(addr).await.unwrap();
		stream.write_all(payload).await.unwrap();
		stream.shutdown().await.unwrap();
	}

	#[tokio::test]
	async fn each_connection_enqueues_one_command() {
		let (listener, mut rx, lifecycle) = bind_ephemeral().await;
		let addr = listener.local_addr().unwrap();
		let task = tokio::spawn(listener.run());

		send(addr, b"skip_forward").await;
		send(addr, b"not_a_command").await;
		send(addr, b"  ").await;
		send(addr, b"cc").await;

		let mut names = Vec::new();
		for _ in 0..3 {
			match tokio::time::timeout(Duration::from_secs(2), rx.dequeue()).await.unwrap() {
				QueueItem::Command(cmd) => {
					assert!(cmd.params.is_empty());
					names.push(cmd.name);
				}
				QueueItem::Shutdown => panic!("unexpected sentinel"),
			}
		}
		assert_eq!(names, ["skip_forward", "not_a_command", "cc"]);

		lifecycle.stop();
		tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn silent_client_does_not_wedge_the_listener() {
		let (listener, mut rx, lifecycle) = bind_ephemeral().await;
		let addr = listener.local_addr().unwrap();
		let task = tokio::spawn(listener.run());

		// Connects but never writes; the read timeout releases it.
		let _idle = TcpStream::connect(addr).await.unwrap();
		send(addr, b"restart").await;

		let item = tokio::time::timeout(Duration::from_secs(2), rx.dequeue()).await.unwrap();
		assert_eq!(item, QueueItem::Command(Command::new("restart")));

		lifecycle.stop();
		tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn second_bind_reports_port_in_use() {
		let (listener, _rx, _lifecycle) = bind_ephemeral().await;
		let addr = listener.local_addr().unwrap();
		let other = Lifecycle::new();
		let (tx, _rx2) = command_queue(&other);

		let err = IpcListener::bind(addr, tx, other, Duration::from_secs(1))
			.await
			.err()
			.unwrap();
		assert!(matches!(err, StartupError::PortInUse { port, .. } if port == addr.port()));
	}

	#[tokio::test]
	async fn queued_shutdown_stops_the_listener() {
		let lifecycle = Lifecycle::new();
		let (tx, _rx) = command_queue(&lifecycle);
		let listener = IpcListener::bind(
			(Ipv4Addr::LOCALHOST, 0).into(),
			tx.clone(),
			lifecycle.clone(),
			Duration::from_millis(200),
		)
		.await
		.unwrap();
		let task = tokio::spawn(listener.run());

		tokio::time::sleep(Duration::from_millis(20)).await;
		tx.request_shutdown().unwrap();
		tokio::time::timeout(Duration::from_millis(500), task)
			.await
			.expect("listener stayed in accept")
			.unwrap();
		assert!(!lifecycle.is_running());
	}

	#[tokio::test]
	async fn stop_unblocks_accept() {
		let (listener, _rx, lifecycle) = bind_ephemeral().await;
		let addr = listener.local_addr().unwrap();
		let task = tokio::spawn(listener.run());

		tokio::time::sleep(Duration::from_millis(20)).await;
		lifecycle.stop();
		wake_listener(addr).await;
		tokio::time::timeout(Duration::from_millis(500), task)
			.await
			.expect("listener stayed in accept")
			.unwrap();
	}
}
