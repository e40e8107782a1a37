//! Newline-delimited JSON control protocol over the watcher's Unix socket.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// JSON newline-delimited request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherRequest {
    pub cmd: String,
}

impl WatcherRequest {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WatcherResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Send one JSON request to the watcher socket and return one response.
pub fn send_request(root: &Path, request: &WatcherRequest) -> Result<WatcherResponse, DaemonError> {
    let socket = socket_path(root);
    if !socket.exists() {
        return Err(DaemonError::NotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::NotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "watcher closed connection before responding".to_string(),
        ));
    }

    let response: WatcherResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

/// Query runtime status, retrying briefly while the socket comes up.
pub fn request_status(root: &Path) -> Result<Value, DaemonError> {
    let request = WatcherRequest::new("status");

    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(root, &request) {
            Ok(response) => return response_into_data(response),
            Err(err @ DaemonError::NotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("status retry loop exited unexpectedly".to_string())
    }))
}

/// Request graceful shutdown.
pub fn request_stop(root: &Path) -> Result<(), DaemonError> {
    let response = send_request(root, &WatcherRequest::new("stop"))?;
    response_into_data(response).map(|_| ())
}

fn response_into_data(response: WatcherResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown watcher error".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_constructors_roundtrip() {
        let ok = WatcherResponse::ok(json!({"running": true}));
        let encoded = serde_json::to_string(&ok).unwrap();
        let decoded: WatcherResponse = serde_json::from_str(&encoded).unwrap();
        assert!(decoded.ok);
        assert_eq!(decoded.data.unwrap()["running"], json!(true));

        let err = WatcherResponse::error("boom");
        assert!(!err.ok);
        assert_eq!(err.error.as_deref(), Some("boom"));
    }

    #[test]
    fn missing_socket_reports_not_running() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = send_request(tmp.path(), &WatcherRequest::new("status")).unwrap_err();
        assert!(matches!(err, DaemonError::NotRunning { .. }));
    }
}
