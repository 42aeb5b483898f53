//! JSON-lines linking driver.
//!
//! The driver is an external program that owns the linking protocol itself.
//! One driver process runs per pairing attempt:
//!
//! 1. `<program> <args..> --auth-dir <dir>` is spawned with piped stdio
//! 2. The driver prints `{"event":"ready","registered":..}` once connected
//! 3. Requests are written as lines carrying a sequential `id`; the reader
//!    task correlates responses back through oneshot channels
//! 4. Every other event is forwarded to [`OpenedLink::events`]
//!
//! [`LinkConnection::terminate`] kills the process. Output ending without a
//! prior `terminate` is reported as a lost connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pairlink_protocol::{DisconnectReason, DriverErrorPayload, DriverEvent, DriverMessage, DriverRequest, LinkEvent};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::connection::{LinkConnection, LinkConnector, OpenedLink};
use crate::error::LinkError;

/// How long a freshly spawned driver gets to report `ready`.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

const REQUEST_PAIRING_CODE: &str = "requestPairingCode";

type Pending = Arc<Mutex<HashMap<u32, (String, oneshot::Sender<Result<Value, LinkError>>)>>>;

/// Spawns one driver subprocess per connection.
#[derive(Debug, Clone)]
pub struct DriverConnector {
	program: PathBuf,
	args: Vec<String>,
	handshake_timeout: Duration,
}

impl DriverConnector {
	pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
		Self {
			program: program.into(),
			args,
			handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
		}
	}

	pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
		self.handshake_timeout = timeout;
		self
	}
}

#[async_trait]
impl LinkConnector for DriverConnector {
	async fn open(&self, auth_dir: &Path) -> Result<OpenedLink, LinkError> {
		let mut child = Command::new(&self.program)
			.args(&self.args)
			.arg("--auth-dir")
			.arg(auth_dir)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.map_err(LinkError::Spawn)?;

		let stdin = child.stdin.take().ok_or_else(|| LinkError::Handshake("driver stdin unavailable".to_string()))?;
		let stdout = child.stdout.take().ok_or_else(|| LinkError::Handshake("driver stdout unavailable".to_string()))?;

		let pending: Pending = Arc::default();
		let terminated = Arc::new(AtomicBool::new(false));
		let (event_tx, events) = mpsc::unbounded_channel();
		let (ready_tx, ready_rx) = oneshot::channel();

		tokio::spawn(read_loop(stdout, Arc::clone(&pending), event_tx, ready_tx, Arc::clone(&terminated)));

		let connection = Arc::new(DriverConnection {
			last_id: AtomicU32::new(0),
			pending,
			stdin: tokio::sync::Mutex::new(stdin),
			child: tokio::sync::Mutex::new(Some(child)),
			terminated,
		});

		let registered = match tokio::time::timeout(self.handshake_timeout, ready_rx).await {
			Ok(Ok(registered)) => registered,
			Ok(Err(_)) => {
				connection.terminate().await;
				return Err(LinkError::Handshake("driver exited before reporting ready".to_string()));
			}
			Err(_) => {
				connection.terminate().await;
				return Err(LinkError::Handshake(format!("driver did not report ready within {:?}", self.handshake_timeout)));
			}
		};

		debug!(target = "pairlink.driver", auth_dir = %auth_dir.display(), registered, "driver ready");
		Ok(OpenedLink { connection, events, registered })
	}
}

struct DriverConnection {
	last_id: AtomicU32,
	pending: Pending,
	stdin: tokio::sync::Mutex<ChildStdin>,
	child: tokio::sync::Mutex<Option<Child>>,
	terminated: Arc<AtomicBool>,
}

impl DriverConnection {
	async fn send(&self, method: &str, params: Value) -> Result<Value, LinkError> {
		if self.terminated.load(Ordering::SeqCst) {
			return Err(LinkError::Closed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, (method.to_string(), tx));

		let request = DriverRequest {
			id,
			method: method.to_string(),
			params,
		};
		let mut line = serde_json::to_string(&request)?;
		line.push('\n');

		let written = {
			let mut stdin = self.stdin.lock().await;
			match stdin.write_all(line.as_bytes()).await {
				Ok(()) => stdin.flush().await,
				Err(err) => Err(err),
			}
		};
		if let Err(err) = written {
			self.pending.lock().remove(&id);
			return Err(err.into());
		}

		rx.await.map_err(|_| LinkError::Closed)?
	}
}

#[async_trait]
impl LinkConnection for DriverConnection {
	async fn request_code(&self, phone_number: &str) -> Result<String, LinkError> {
		let result = self.send(REQUEST_PAIRING_CODE, json!({ "phoneNumber": phone_number })).await?;
		result
			.get("code")
			.and_then(Value::as_str)
			.map(str::to_string)
			.ok_or_else(|| LinkError::Request {
				method: REQUEST_PAIRING_CODE.to_string(),
				message: "response carried no code".to_string(),
			})
	}

	async fn terminate(&self) {
		self.terminated.store(true, Ordering::SeqCst);
		let Some(mut child) = self.child.lock().await.take() else {
			return;
		};
		if let Err(err) = child.kill().await {
			debug!(target = "pairlink.driver", error = %err, "driver already exited");
		}
	}
}

async fn read_loop(
	stdout: ChildStdout,
	pending: Pending,
	events: mpsc::UnboundedSender<LinkEvent>,
	ready: oneshot::Sender<bool>,
	terminated: Arc<AtomicBool>,
) {
	let mut ready = Some(ready);
	let mut lines = BufReader::new(stdout).lines();

	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(err) => {
				warn!(target = "pairlink.driver", error = %err, "failed reading driver output");
				break;
			}
		};
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		match serde_json::from_str::<DriverMessage>(line) {
			Ok(DriverMessage::Response(response)) => {
				let Some((method, callback)) = pending.lock().remove(&response.id) else {
					warn!(target = "pairlink.driver", id = response.id, "response for unknown request");
					continue;
				};
				let result = match response.error {
					Some(error) => Err(parse_driver_error(&method, error)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = callback.send(result);
			}
			Ok(DriverMessage::Event(DriverEvent::Ready { registered })) => {
				if let Some(tx) = ready.take() {
					let _ = tx.send(registered);
				}
			}
			Ok(DriverMessage::Event(event)) => {
				if let Some(link_event) = event.to_link_event() {
					let _ = events.send(link_event);
				}
			}
			Err(err) => {
				warn!(target = "pairlink.driver", error = %err, %line, "unparseable driver output");
			}
		}
	}

	let orphaned: Vec<_> = pending.lock().drain().collect();
	for (_, (_, callback)) in orphaned {
		let _ = callback.send(Err(LinkError::Closed));
	}

	if ready.is_none() && !terminated.load(Ordering::SeqCst) {
		let _ = events.send(LinkEvent::ConnectionClosed(DisconnectReason::ConnectionLost));
	}
	debug!(target = "pairlink.driver", "driver output closed");
}

fn parse_driver_error(method: &str, error: DriverErrorPayload) -> LinkError {
	match error.name.as_deref() {
		Some("InvalidNumber") => LinkError::InvalidNumber(error.message),
		_ => LinkError::Request {
			method: method.to_string(),
			message: error.message,
		},
	}
}
