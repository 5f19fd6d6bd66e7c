//! Batch replay: newline-delimited JSON in, admitted events out.
//!
//! Each non-blank input line is one batch (a JSON array of events) and
//! goes through exactly one admission pass on a buffer that lives for the
//! whole run.

use std::io::{BufRead, Write};

use anyhow::Context;
use chrono::{DateTime, Utc};

use admitflow_core::{AdmissionBuffer, AdmissionError, AdmissionReport, TimedEvent};
use serde_json::Value;

use crate::config::OnInvalid;

pub type WallClockBuffer = AdmissionBuffer<DateTime<Utc>>;

/// Decode one input line. `Ok(None)` means the line held `null`: the
/// batch itself is missing.
pub(crate) fn parse_batch_line(line: &str) -> serde_json::Result<Option<Vec<TimedEvent>>> {
    serde_json::from_str(line)
}

/// Run one admission pass, treating a missing batch as invalid input.
pub(crate) fn admit_batch(
    buffer: &mut WallClockBuffer,
    batch: Option<Vec<TimedEvent>>,
) -> Result<AdmissionReport<DateTime<Utc>, Value>, AdmissionError> {
    let batch = batch.ok_or_else(|| AdmissionError::InvalidInput("batch is missing".into()))?;
    buffer.admit_with_report(batch)
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    pub report: bool,
    pub on_invalid: OnInvalid,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub batches: usize,
    pub admitted: usize,
    pub rejected: usize,
    pub invalid: usize,
}

pub fn run_replay<R: BufRead, W: Write>(
    buffer: &mut WallClockBuffer,
    reader: R,
    mut writer: W,
    opts: ReplayOptions,
) -> anyhow::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("reading line {line_no}"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let batch =
            parse_batch_line(line).with_context(|| format!("line {line_no}: malformed batch"))?;
        summary.batches += 1;

        let report = match admit_batch(buffer, batch) {
            Ok(report) => report,
            Err(e) => match opts.on_invalid {
                OnInvalid::Abort => {
                    return Err(e).with_context(|| format!("line {line_no}"));
                }
                OnInvalid::Skip => {
                    tracing::warn!("line {line_no}: skipping batch: {e}");
                    summary.invalid += 1;
                    continue;
                }
            },
        };

        summary.admitted += report.admitted.len();
        summary.rejected += report.rejected.len();
        tracing::debug!(
            line = line_no,
            admitted = report.admitted.len(),
            rejected = report.rejected.len(),
            "batch replayed"
        );

        if opts.report {
            let row = serde_json::json!({
                "batch": summary.batches,
                "admitted": report.admitted.len(),
                "rejected": report.rejected.len(),
                "watermark": report.watermark_after,
            });
            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n")?;
        } else {
            for event in &report.admitted {
                serde_json::to_writer(&mut writer, event)?;
                writer.write_all(b"\n")?;
            }
        }
    }

    writer.flush()?;
    tracing::info!(
        batches = summary.batches,
        admitted = summary.admitted,
        rejected = summary.rejected,
        invalid = summary.invalid,
        "replay finished"
    );
    Ok(summary)
}
