//! [`EventEmitter`] – serialized, line-atomic writer for the output channel.
//!
//! Hardware callback threads and the controller loop all write through
//! clones of one emitter. A single mutex guards the sink; each line and its
//! terminating newline are written as one buffer and flushed before the lock
//! is released, so concurrent events never interleave.
//!
//! Once [`EventEmitter::finish`] has written the shutdown sentinel, further
//! emits are dropped so the sentinel stays the last thing on the channel.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use hatlink_types::{Event, LinkError};
use tracing::debug;

struct Sink {
    writer: Box<dyn Write + Send>,
    finished: bool,
}

/// Shared handle to the output channel. Clone it cheaply – all clones write
/// to the same sink under the same lock.
#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<Mutex<Sink>>,
}

impl EventEmitter {
    /// Wrap an arbitrary writer.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink {
                writer: Box::new(sink),
                finished: false,
            })),
        }
    }

    /// Emitter over the process's standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Write `line` followed by a newline and flush.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if the sink rejects the write (for example
    /// when the parent has closed the pipe).
    pub fn emit(&self, line: &str) -> Result<(), LinkError> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.write_flushed(buf.as_bytes(), false)
    }

    /// Format and emit a protocol [`Event`].
    pub fn emit_event(&self, event: &Event) -> Result<(), LinkError> {
        self.emit(&event.to_string())
    }

    /// Emit `ERROR: <err>`.
    pub fn error(&self, err: &LinkError) -> Result<(), LinkError> {
        self.emit_event(&Event::error(err))
    }

    /// Write the shutdown sentinel with no trailing newline and flush.
    /// Later emits are discarded.
    pub fn finish(&self, sentinel: &str) -> Result<(), LinkError> {
        self.write_flushed(sentinel.as_bytes(), true)
    }

    /// `true` once [`finish`][Self::finish] has run.
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    fn write_flushed(&self, bytes: &[u8], finishing: bool) -> Result<(), LinkError> {
        let mut sink = self.lock();
        if sink.finished {
            debug!(len = bytes.len(), "output channel finished; dropping write");
            return Ok(());
        }
        sink.finished = finishing;
        sink.writer.write_all(bytes)?;
        sink.writer.flush()?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory sink that records everything written to it. Clones share the
/// same buffer.
#[derive(Clone, Default)]
pub struct CaptureSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Completed (newline-terminated) lines written so far.
    pub fn lines(&self) -> Vec<String> {
        let contents = self.contents();
        let complete = match contents.rfind('\n') {
            Some(end) => &contents[..end],
            None => return Vec::new(),
        };
        complete.split('\n').map(str::to_string).collect()
    }
}

impl Write for CaptureSink {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
