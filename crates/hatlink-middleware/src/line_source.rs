//! [`LineSource`] – non-blocking reader over a blocking control channel.
//!
//! A dedicated OS thread performs blocking line reads on the underlying
//! stream and forwards every non-empty line over an unbounded Tokio channel.
//! The consumer polls with [`LineSource::read_line`], which waits at most
//! the given timeout and never fails when it expires.
//!
//! ```text
//! ┌──────────────┐  blocking   ┌─────────────┐  mpsc   ┌──────────────┐
//! │ control pipe │───────────▶│ reader thread│───────▶│ read_line()  │
//! └──────────────┘  read_until └─────────────┘         └──────────────┘
//! ```
//!
//! # Shutdown
//!
//! [`LineSource::stop`] only raises a flag; it never waits on the reader
//! thread, which may be blocked in a read that never returns. The thread
//! exits on the next end-of-stream or the next line it reads (that line is
//! discarded), whichever comes first. Lines queued before the stop remain
//! readable.

use std::io::{BufRead, ErrorKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use hatlink_types::LinkError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Timeout-bounded line reader over a blocking stream.
pub struct LineSource {
    lines: mpsc::UnboundedReceiver<String>,
    stop: Arc<AtomicBool>,
}

impl LineSource {
    /// Spawn the reader thread over `reader` and return the consuming end.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if the reader thread cannot be spawned.
    pub fn start<R>(reader: R) -> Result<Self, LinkError>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, lines) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        thread::Builder::new()
            .name("hatlink-line-source".to_string())
            .spawn(move || pump(reader, tx, stop_flag))?;

        Ok(Self { lines, stop })
    }

    /// Return the next line, waiting at most `timeout`.
    ///
    /// * `None` waits until a line arrives. If the stream has ended and the
    ///   queue is empty this never resolves.
    /// * `Some(d)` (including zero) returns `None` once `d` has elapsed with
    ///   no line available. When the stream has ended the call still waits
    ///   out `d` so a polling caller keeps its pace.
    pub async fn read_line(&mut self, timeout: Option<Duration>) -> Option<String> {
        let Some(limit) = timeout else {
            return match self.lines.recv().await {
                Some(line) => Some(line),
                None => std::future::pending().await,
            };
        };

        let deadline = tokio::time::Instant::now() + limit;
        match tokio::time::timeout_at(deadline, self.lines.recv()).await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                tokio::time::sleep_until(deadline).await;
                None
            }
            Err(_) => None,
        }
    }

    /// Ask the reader thread to stop after its current read. Idempotent.
    pub fn stop(&self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            debug!("line source stop requested");
        }
    }

    /// `true` once [`stop`][Self::stop] has been called.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// `true` when the reader thread has exited and every queued line has
    /// been consumed. No further line will ever be returned.
    pub fn is_exhausted(&self) -> bool {
        self.lines.is_closed() && self.lines.is_empty()
    }
}

fn pump<R: BufRead>(mut reader: R, tx: mpsc::UnboundedSender<String>, stop: Arc<AtomicBool>) {
    let mut buf = Vec::new();
    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("control channel reached end of stream");
                break;
            }
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\n', '\r']);
                if stop.load(Ordering::Acquire) {
                    debug!(line, "discarding line read after stop");
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                if tx.send(line.to_string()).is_err() {
                    // Consumer dropped.
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "control channel read failed; reader exiting");
                break;
            }
        }
    }
    debug!("line source reader exited");
}
