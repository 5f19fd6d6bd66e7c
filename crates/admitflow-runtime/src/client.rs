//! UDS JSON-RPC client for the `submit` and `watermark` subcommands.

use std::io::{BufRead, Write};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::replay::parse_batch_line;

pub(crate) async fn rpc_call(
    socket_path: &str,
    method: &str,
    params: serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| anyhow::anyhow!("admission server unreachable at {socket_path}: {e}"))?;

    let (reader, mut writer) = stream.into_split();

    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1,
    });
    let mut req = serde_json::to_string(&request)?;
    req.push('\n');
    writer.write_all(req.as_bytes()).await?;
    writer.shutdown().await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let response: serde_json::Value = serde_json::from_str(line.trim())?;

    if let Some(error) = response.get("error") {
        anyhow::bail!("admission server refused {method}: {error}");
    }

    Ok(response["result"].clone())
}

/// `admitflow submit`: send each input line as one `admit` call and print
/// the admitted events. Stops at the first rejected batch.
pub async fn cmd_submit<R: BufRead, W: Write>(
    socket_path: &str,
    reader: R,
    mut writer: W,
) -> anyhow::Result<usize> {
    let mut admitted = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("reading line {line_no}"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Decode locally so malformed JSON is reported against the input line.
        let batch =
            parse_batch_line(line).with_context(|| format!("line {line_no}: malformed batch"))?;
        let params = serde_json::json!({ "events": batch });

        let result = rpc_call(socket_path, "admit", params)
            .await
            .with_context(|| format!("line {line_no}"))?;

        for event in result.as_array().map(Vec::as_slice).unwrap_or_default() {
            serde_json::to_writer(&mut writer, event)?;
            writer.write_all(b"\n")?;
            admitted += 1;
        }
    }

    writer.flush()?;
    tracing::info!(admitted, "submit finished");
    Ok(admitted)
}

/// `admitflow watermark`: print the watermark, or `none` before the first
/// admission.
pub async fn cmd_watermark(socket_path: &str) -> anyhow::Result<()> {
    let watermark = rpc_call(socket_path, "watermark", serde_json::json!({})).await?;
    println!("{}", format_watermark(&watermark));
    Ok(())
}

pub(crate) fn format_watermark(watermark: &serde_json::Value) -> String {
    match watermark.as_str() {
        Some(ts) => ts.to_string(),
        None => "none".to_string(),
    }
}
