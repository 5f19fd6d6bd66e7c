//! UDS JSON-RPC server: connection-per-request, newline-delimited JSON.
//!
//! All requests share one admission buffer behind a single mutex, so
//! admission passes from concurrent clients never interleave.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::Mutex;

use admitflow_core::{AdmissionError, TimedEvent};

use crate::replay::{WallClockBuffer, admit_batch};

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RpcError {
    pub code: i64,
    pub message: String,
}

impl From<AdmissionError> for RpcError {
    fn from(e: AdmissionError) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: e.to_string(),
        }
    }
}

/// Claim `socket_path` for the admission server.
///
/// A leftover socket file nobody answers on is reclaimed; a live one belongs
/// to another admission server and is left alone.
async fn claim_socket(socket_path: &str) -> anyhow::Result<UnixListener> {
    let path = Path::new(socket_path);
    let socket_dir = path.parent().ok_or_else(|| {
        anyhow::anyhow!("admission socket {socket_path} has no parent directory")
    })?;

    std::fs::create_dir_all(socket_dir)
        .with_context(|| format!("creating socket directory {}", socket_dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_dir, std::fs::Permissions::from_mode(0o700))?;
    }

    if path.exists() {
        match tokio::net::UnixStream::connect(socket_path).await {
            Ok(_) => anyhow::bail!("an admission server already owns {socket_path}"),
            Err(e) => {
                tracing::info!("reclaiming unanswered admission socket {socket_path} ({e})");
                std::fs::remove_file(path)?;
            }
        }
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("binding admission socket {socket_path}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(listener)
}

/// Encode a method result. Failing here after `admit` has committed is
/// surfaced as an internal error, never as an empty result.
pub(crate) fn encode_result<S: Serialize>(value: S) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError {
        code: INTERNAL_ERROR,
        message: format!("cannot encode result: {e}"),
    })
}

/// Accept admission requests until the listener fails.
pub async fn run_server(socket_path: &str, state: Arc<Mutex<WallClockBuffer>>) -> anyhow::Result<()> {
    let listener = claim_socket(socket_path).await?;
    tracing::info!("admission server listening on {socket_path}");

    loop {
        let (stream, _) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                tracing::debug!("admission request dropped: {e}");
            }
        });
    }
}

/// Serve until ctrl-c or SIGTERM, then remove the socket.
pub async fn serve(socket_path: &str) -> anyhow::Result<()> {
    let state = Arc::new(Mutex::new(WallClockBuffer::new()));

    let server_socket = socket_path.to_string();
    let server_handle =
        tokio::spawn(async move { run_server(&server_socket, state).await });

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                },
                Err(e) => {
                    tracing::warn!("cannot register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                    tracing::info!("received ctrl-c, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    let result = tokio::select! {
        () = shutdown => Ok(()),
        joined = server_handle => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(anyhow::anyhow!("server task failed: {e}")),
        },
    };

    let _ = std::fs::remove_file(socket_path);
    tracing::info!("server stopped");
    result
}

async fn handle_connection(
    stream: tokio::net::UnixStream,
    state: Arc<Mutex<WallClockBuffer>>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let request: Value = serde_json::from_str(line.trim())?;
    let method = request["method"].as_str().unwrap_or("");
    let id = request["id"].clone();

    let response = match dispatch(method, &request["params"], &state).await {
        Ok(result) => serde_json::json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": id,
        }),
        Err(err) => {
            tracing::debug!(method, code = err.code, "request failed: {}", err.message);
            serde_json::json!({
                "jsonrpc": "2.0",
                "error": {"code": err.code, "message": err.message},
                "id": id,
            })
        }
    };

    let mut resp = serde_json::to_string(&response)?;
    resp.push('\n');
    writer.write_all(resp.as_bytes()).await?;

    Ok(())
}

pub(crate) async fn dispatch(
    method: &str,
    params: &Value,
    state: &Mutex<WallClockBuffer>,
) -> Result<Value, RpcError> {
    match method {
        "admit" => {
            let events = params.get("events").cloned().unwrap_or(Value::Null);
            let batch: Option<Vec<TimedEvent>> =
                serde_json::from_value(events).map_err(|e| RpcError {
                    code: INVALID_PARAMS,
                    message: format!("invalid params: {e}"),
                })?;

            let mut buffer = state.lock().await;
            let report = admit_batch(&mut buffer, batch)?;
            tracing::debug!(
                admitted = report.admitted.len(),
                rejected = report.rejected.len(),
                "admit request served"
            );
            encode_result(report.admitted)
        }
        "watermark" => {
            let buffer = state.lock().await;
            encode_result(buffer.watermark())
        }
        "stats" => {
            let buffer = state.lock().await;
            Ok(serde_json::json!({
                "watermark": buffer.watermark(),
                "admitted_count": buffer.admitted_count(),
            }))
        }
        _ => Err(RpcError {
            code: METHOD_NOT_FOUND,
            message: "method not found".to_string(),
        }),
    }
}
