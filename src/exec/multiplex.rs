//! Live tee of a child's stdout and stderr to an [`OutputSink`] and one log
//! file.
//!
//! Each stream gets its own reader task; both feed a bounded channel drained
//! by a single writer, so a saturated stream never waits on a silent one and
//! the log keeps the order in which lines arrived.

use crate::exec::ExecError;
use crate::ui::OutputSink;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug)]
struct Line {
    stream: Stream,
    text: String,
}

/// Read `reader` line by line until end-of-stream. A final line without a
/// trailing newline is still forwarded.
async fn forward_lines<R>(reader: R, stream: Stream, tx: mpsc::Sender<Line>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        let text = String::from_utf8_lossy(&buf).into_owned();
        // The writer drains until every sender is gone, so a send only fails
        // if the writer itself was dropped. Keep reading so the child never
        // blocks on a full pipe.
        let _ = tx.send(Line { stream, text }).await;
    }
}

fn spawn_reader<R>(reader: Option<R>, stream: Stream, tx: &mpsc::Sender<Line>) -> Option<JoinHandle<std::io::Result<()>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|r| tokio::spawn(forward_lines(r, stream, tx.clone())))
}

/// Drain `child`'s piped stdout and stderr into `sink` and `log`, then wait for
/// the child.
///
/// Returns once both streams reached end-of-stream and the child exited. Every
/// line is written to the log newline-terminated.
pub async fn tee_output(
    child: &mut Child,
    program: &str,
    log: File,
    log_path: &Path,
    sink: Arc<dyn OutputSink>,
) -> Result<ExitStatus, ExecError> {
    let (tx, mut rx) = mpsc::channel::<Line>(CHANNEL_CAPACITY);
    let readers = [
        spawn_reader(child.stdout.take(), Stream::Stdout, &tx),
        spawn_reader(child.stderr.take(), Stream::Stderr, &tx),
    ];
    drop(tx);

    let mut writer = BufWriter::new(log);
    let mut write_error: Option<std::io::Error> = None;
    let mut lines = 0usize;

    while let Some(line) = rx.recv().await {
        match line.stream {
            Stream::Stdout => sink.stdout_line(&line.text),
            Stream::Stderr => sink.stderr_line(&line.text),
        }
        lines += 1;
        if write_error.is_none() {
            let mut bytes = line.text.into_bytes();
            bytes.push(b'\n');
            if let Err(e) = writer.write_all(&bytes).await {
                tracing::warn!(log = %log_path.display(), error = %e, "log write failed, continuing to drain");
                write_error = Some(e);
            }
        }
    }

    let mut read_error = None;
    for handle in readers.into_iter().flatten() {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => read_error = Some(e.to_string()),
            Err(join) => read_error = Some(join.to_string()),
        }
    }

    let status = child.wait().await.map_err(|source| ExecError::Wait {
        program: program.to_string(),
        source,
    })?;

    if write_error.is_none()
        && let Err(e) = writer.flush().await
    {
        write_error = Some(e);
    }

    tracing::debug!(program, lines, exit_code = ?status.code(), "child output drained");

    if let Some(source) = write_error {
        return Err(ExecError::LogFile {
            path: log_path.to_path_buf(),
            source,
        });
    }
    if let Some(detail) = read_error {
        return Err(ExecError::Capture {
            program: program.to_string(),
            detail,
        });
    }
    Ok(status)
}
