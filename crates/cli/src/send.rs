//! Client side of the control socket.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Writes `command` to the controller listening on `port`.
///
/// Delivery only means the controller queued it; the protocol has no reply.
pub async fn send_command(port: u16, command: &str) -> Result<()> {
	let command = command.trim();
	if command.is_empty() {
		bail!("command must not be empty");
	}
	if command.len() > ytctl::MAX_COMMAND_BYTES {
		bail!("command is longer than {} bytes", ytctl::MAX_COMMAND_BYTES);
	}

	let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
	let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
		.await
		.with_context(|| format!("timed out connecting to {addr}"))?
		.with_context(|| format!("no controller listening on {addr}; is `ytctl run` running?"))?;

	stream
		.write_all(command.as_bytes())
		.await
		.with_context(|| format!("failed to send `{command}`"))?;
	stream.shutdown().await.context("failed to close control connection")?;

	debug!(target = "ytctl.send", %addr, command, "sent");
	Ok(())
}

#[cfg(test)]
mod tests {
	use tokio::io::AsyncReadExt;
	use tokio::net::TcpListener;

	use super::*;

	#[tokio::test]
	async fn writes_the_raw_token() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();

		let server = tokio::spawn(async move {
			let (mut stream, _) = listener.accept().await.unwrap();
			let mut received = String::new();
			stream.read_to_string(&mut received).await.unwrap();
			received
		});

		send_command(port, " skip_forward\n").await.unwrap();
		assert_eq!(server.await.unwrap(), "skip_forward");
	}

	#[tokio::test]
	async fn missing_controller_is_an_error() {
		let port = {
			let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
			listener.local_addr().unwrap().port()
		};
		let err = send_command(port, "cc").await.unwrap_err();
		assert!(format!("{err:#}").contains("no controller listening"));
	}

	#[tokio::test]
	async fn blank_command_is_rejected() {
		assert!(send_command(1, "  ").await.is_err());
	}
}
