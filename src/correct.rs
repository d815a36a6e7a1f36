//! Line-by-line correction of text streams and files.
//!
//! Each input line is corrected independently and written as exactly one
//! output line, flushed immediately so partial output survives a crash.
//! Blank lines are passed through without decoding.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::engine::{DecodeConfig, DecodeError, DecodeSession, FinishReason};

/// Counters for one correction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionStats {
    pub lines: usize,
    pub decoded: usize,
    /// Lines whose text differs from the input.
    pub changed: usize,
    /// Lines cut short by the deadline.
    pub partial: usize,
}

/// Correct every line of `reader`, writing results to `writer`.
pub async fn correct_lines<R, W>(
    session: &DecodeSession,
    config: &DecodeConfig,
    reader: R,
    writer: &mut W,
) -> Result<CorrectionStats, DecodeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    config.validate()?;
    let mut stats = CorrectionStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        stats.lines += 1;
        let source = line.trim();
        if source.is_empty() {
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            continue;
        }

        let correction = session.correct(source, config).await?;
        stats.decoded += 1;
        if correction.text != source {
            stats.changed += 1;
        }
        if correction.finish_reason == FinishReason::Cancelled {
            stats.partial += 1;
        }
        tracing::debug!(
            line = stats.lines,
            finish_reason = correction.finish_reason.as_str(),
            "corrected line"
        );

        writer.write_all(correction.text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    tracing::info!(lines = stats.lines, changed = stats.changed, "correction run finished");
    Ok(stats)
}

/// Correct `input` into `output`, one line per line.
pub async fn correct_file(
    session: &DecodeSession,
    config: &DecodeConfig,
    input: &Path,
    output: &Path,
) -> Result<CorrectionStats, DecodeError> {
    let reader = BufReader::new(File::open(input).await?);
    let mut writer = BufWriter::new(File::create(output).await?);
    let stats = correct_lines(session, config, reader, &mut writer).await?;
    writer.shutdown().await?;
    Ok(stats)
}
