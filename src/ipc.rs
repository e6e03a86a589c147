//! mpv JSON IPC client.
//!
//! Requests are newline-delimited JSON objects tagged with a `request_id`. A single reader
//! task routes replies back to their waiting request and forwards everything else as
//! [`Event`]s over an unbounded channel.

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::dispatch::Event;
use crate::host::Host;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Userdata id passed to `hook-add` for the `on_load` hook.
pub const LOAD_HOOK_ID: u64 = 1;

type Reply = std::result::Result<Value, String>;
type Pending = Arc<StdMutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// One decoded line from the socket.
#[derive(Debug, PartialEq)]
enum Message {
  Reply { id: u64, result: Reply },
  Event(Event),
  Ignored,
}

fn parse_message(line: &str) -> Option<Message> {
  let val: Value = serde_json::from_str(line).ok()?;

  if let Some(name) = val.get("event").and_then(Value::as_str) {
    let event = match name {
      "hook" => match val.get("hook_id").and_then(Value::as_u64) {
        Some(hook_id) => Event::Load { hook_id: Some(hook_id) },
        None => return Some(Message::Ignored),
      },
      "shutdown" => Event::Shutdown,
      "property-change" => {
        let Some(prop) = val.get("name").and_then(Value::as_str) else {
          return Some(Message::Ignored);
        };
        Event::PropertyChange { name: prop.to_string(), data: val.get("data").cloned().unwrap_or(Value::Null) }
      }
      "client-message" => {
        let mut args: Vec<String> = val
          .get("args")
          .and_then(Value::as_array)
          .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
          .unwrap_or_default();
        if args.is_empty() {
          return Some(Message::Ignored);
        }
        let name = args.remove(0);
        Event::Message { name, args }
      }
      _ => return Some(Message::Ignored),
    };
    return Some(Message::Event(event));
  }

  let id = val.get("request_id").and_then(Value::as_u64)?;
  let result = match val.get("error").and_then(Value::as_str) {
    Some("success") => Ok(val.get("data").cloned().unwrap_or(Value::Null)),
    Some(err) => Err(err.to_string()),
    None => Err("malformed reply".to_string()),
  };
  Some(Message::Reply { id, result })
}

pub struct MpvIpc {
  writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
  pending: Pending,
  next_id: AtomicU64,
}

impl MpvIpc {
  /// Connect to the socket (or named pipe on Windows) mpv was started with via `--input-ipc-server`.
  pub async fn connect(path: &str) -> Result<(Self, mpsc::UnboundedReceiver<Event>)> {
    #[cfg(unix)]
    let stream = tokio::net::UnixStream::connect(path).await.context("Failed to connect to mpv IPC socket")?;
    #[cfg(windows)]
    let stream = tokio::net::windows::named_pipe::ClientOptions::new()
      .open(path)
      .context("Failed to connect to mpv IPC pipe")?;

    Ok(Self::from_stream(stream))
  }

  fn from_stream<S>(stream: S) -> (Self, mpsc::UnboundedReceiver<Event>)
  where
    S: AsyncRead + AsyncWrite + Send + 'static,
  {
    let (read_half, write_half) = tokio::io::split(stream);
    let pending: Pending = Arc::new(StdMutex::new(HashMap::new()));
    let (tx, rx) = mpsc::unbounded_channel();

    let reader_pending = pending.clone();
    tokio::spawn(async move {
      let mut lines = BufReader::new(read_half).lines();
      loop {
        let line = match lines.next_line().await {
          Ok(Some(line)) => line,
          Ok(None) => break,
          Err(e) => {
            warn!(err = %e, "ipc: read failed");
            break;
          }
        };
        trace!(line = %line, "ipc: received");
        match parse_message(&line) {
          Some(Message::Reply { id, result }) => {
            let waiter = reader_pending.lock().ok().and_then(|mut p| p.remove(&id));
            if let Some(waiter) = waiter {
              let _ = waiter.send(result);
            }
          }
          Some(Message::Event(event)) => {
            if tx.send(event).is_err() {
              break;
            }
          }
          Some(Message::Ignored) => {}
          None => debug!(line = %line, "ipc: unparseable line"),
        }
      }
      // Fail in-flight requests now instead of at their timeout.
      if let Ok(mut p) = reader_pending.lock() {
        p.clear();
      }
      debug!("ipc: connection closed");
    });

    let ipc = Self { writer: Mutex::new(Box::new(write_half)), pending, next_id: AtomicU64::new(1) };
    (ipc, rx)
  }

  async fn request(&self, command: Value) -> Result<Value> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = oneshot::channel();
    self.pending.lock().map_err(|_| anyhow!("ipc: pending table poisoned"))?.insert(id, tx);

    let mut line = serde_json::to_string(&json!({ "command": command, "request_id": id }))?;
    line.push('\n');
    {
      let mut writer = self.writer.lock().await;
      writer.write_all(line.as_bytes()).await.context("Failed to send command to mpv IPC")?;
      writer.flush().await.context("Failed to flush mpv IPC")?;
    }

    let reply = tokio::time::timeout(REPLY_TIMEOUT, rx).await;
    if let Ok(mut p) = self.pending.lock() {
      p.remove(&id);
    }
    match reply {
      Ok(Ok(Ok(data))) => Ok(data),
      Ok(Ok(Err(err))) => Err(anyhow!("mpv: {} ({})", err, command)),
      Ok(Err(_)) => Err(anyhow!("mpv IPC connection closed")),
      Err(_) => Err(anyhow!("Timeout waiting for mpv IPC reply to {}", command)),
    }
  }

  pub async fn observe_property(&self, id: u64, name: &str) -> Result<()> {
    self.request(json!(["observe_property", id, name])).await.map(drop)
  }

  /// mpv blocks at hook `name` until every `hook` event it sends us is acknowledged.
  pub async fn add_hook(&self, name: &str, id: u64, priority: i32) -> Result<()> {
    self.request(json!(["hook-add", name, id, priority])).await.map(drop)
  }
}

impl Host for MpvIpc {
  async fn get_property(&self, name: &str) -> Result<Value> {
    self.request(json!(["get_property", name])).await
  }

  async fn set_property(&self, name: &str, value: Value) -> Result<()> {
    self.request(json!(["set_property", name, value])).await.map(drop)
  }

  async fn command(&self, args: &[&str]) -> Result<Value> {
    self.request(json!(args)).await
  }

  async fn hook_ack(&self, hook_id: u64) -> Result<()> {
    self.request(json!(["hook-ack", hook_id])).await.map(drop)
  }
}
