// SPDX-License-Identifier: MIT
//
// The byte channel a session talks through.
//
// `Backend` is the seam between the session and the outside world. The
// real implementation is `terminal::Tty`; `MemoryBackend` replays a script
// of input, captures every frame written to it, and can inject interrupts,
// resizes and write failures. Tests and headless hosts use the latter.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    /// Size used when the channel cannot report one.
    pub const FALLBACK: Self = Self { cols: 80, rows: 24 };
}

// ─── Timeout ────────────────────────────────────────────────────────────────

/// How long a read may wait for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Return immediately.
    Poll,
    /// Wait at most this long.
    After(Duration),
    /// Wait until input or a signal arrives.
    Forever,
}

impl Timeout {
    /// Millisecond form used by C-style callers: negative waits forever,
    /// zero polls.
    #[must_use]
    pub fn from_millis(ms: i32) -> Self {
        match u64::try_from(ms) {
            Err(_) => Self::Forever,
            Ok(0) => Self::Poll,
            Ok(ms) => Self::After(Duration::from_millis(ms)),
        }
    }

    /// The shorter of two timeouts.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        match (self, other) {
            (Self::Poll, _) | (_, Self::Poll) => Self::Poll,
            (Self::Forever, t) | (t, Self::Forever) => t,
            (Self::After(a), Self::After(b)) => Self::After(a.min(b)),
        }
    }

    /// Milliseconds for `poll(2)`: -1 forever, rounded up otherwise so a
    /// sub-millisecond wait does not turn into a busy loop.
    #[must_use]
    pub fn as_poll_millis(self) -> i32 {
        match self {
            Self::Poll => 0,
            Self::Forever => -1,
            Self::After(d) => {
                let ms = d.as_micros().div_ceil(1000);
                i32::try_from(ms).unwrap_or(i32::MAX)
            }
        }
    }
}

// ─── ReadOutcome ────────────────────────────────────────────────────────────

/// Result of one read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were read into the buffer.
    Data(usize),
    /// The timeout elapsed with nothing to read.
    NoData,
    /// A signal interrupted the wait. Callers retry.
    Interrupted,
    /// The input side is closed.
    Eof,
}

// ─── Backend ────────────────────────────────────────────────────────────────

/// A terminal-like byte channel.
pub trait Backend: Send {
    /// Current dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be queried.
    fn size(&mut self) -> io::Result<Size>;

    /// Switch the input side to raw (unbuffered, no echo) discipline.
    ///
    /// # Errors
    ///
    /// Returns an error if the discipline cannot be changed.
    fn enter_raw_mode(&mut self) -> io::Result<()>;

    /// Undo [`enter_raw_mode`](Self::enter_raw_mode). A no-op when raw
    /// mode is not active.
    ///
    /// # Errors
    ///
    /// Returns an error if the original discipline cannot be restored.
    fn restore_mode(&mut self) -> io::Result<()>;

    /// Read available bytes, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error on any failure other than a timeout or a signal.
    fn read(&mut self, buf: &mut [u8], timeout: Timeout) -> io::Result<ReadOutcome>;

    /// Write the whole buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes could not all be written.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// The new size, if a resize was signalled since the last call.
    fn take_resize(&mut self) -> Option<Size>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn size(&mut self) -> io::Result<Size> {
        (**self).size()
    }

    fn enter_raw_mode(&mut self) -> io::Result<()> {
        (**self).enter_raw_mode()
    }

    fn restore_mode(&mut self) -> io::Result<()> {
        (**self).restore_mode()
    }

    fn read(&mut self, buf: &mut [u8], timeout: Timeout) -> io::Result<ReadOutcome> {
        (**self).read(buf, timeout)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn take_resize(&mut self) -> Option<Size> {
        (**self).take_resize()
    }
}

// ─── MemoryBackend ──────────────────────────────────────────────────────────

enum Step {
    Bytes(Vec<u8>),
    Interrupt,
    Resize(Size),
}

struct State {
    size: Size,
    script: VecDeque<Step>,
    pending_resize: Option<Size>,
    output: Vec<u8>,
    writes: usize,
    fail_writes: usize,
    raw: bool,
}

/// In-memory backend driven by a [`MemoryHandle`].
///
/// Reads consume the scripted steps in order. Once the script runs dry a
/// bounded read sleeps for its timeout and reports [`ReadOutcome::NoData`],
/// and an unbounded one reports [`ReadOutcome::Eof`] so a test cannot hang.
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

/// Test-side handle of a [`MemoryBackend`]. Cheap to clone.
#[derive(Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    // Poisoning only means a test panicked while holding the lock.
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MemoryBackend {
    /// A backend of the given size plus the handle that scripts it.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> (Self, MemoryHandle) {
        let state = Arc::new(Mutex::new(State {
            size: Size { cols, rows },
            script: VecDeque::new(),
            pending_resize: None,
            output: Vec::new(),
            writes: 0,
            fail_writes: 0,
            raw: false,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MemoryHandle { state },
        )
    }
}

impl Backend for MemoryBackend {
    fn size(&mut self) -> io::Result<Size> {
        Ok(lock(&self.state).size)
    }

    fn enter_raw_mode(&mut self) -> io::Result<()> {
        lock(&self.state).raw = true;
        Ok(())
    }

    fn restore_mode(&mut self) -> io::Result<()> {
        lock(&self.state).raw = false;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Timeout) -> io::Result<ReadOutcome> {
        let mut state = lock(&self.state);
        match state.script.pop_front() {
            Some(Step::Bytes(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    bytes.drain(..n);
                    state.script.push_front(Step::Bytes(bytes));
                }
                Ok(ReadOutcome::Data(n))
            }
            Some(Step::Interrupt) => Ok(ReadOutcome::Interrupted),
            Some(Step::Resize(size)) => {
                state.size = size;
                state.pending_resize = Some(size);
                Ok(ReadOutcome::Interrupted)
            }
            None => match timeout {
                Timeout::Poll => Ok(ReadOutcome::NoData),
                Timeout::After(d) => {
                    drop(state);
                    std::thread::sleep(d);
                    Ok(ReadOutcome::NoData)
                }
                Timeout::Forever => Ok(ReadOutcome::Eof),
            },
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected write failure"));
        }
        state.output.extend_from_slice(bytes);
        state.writes += 1;
        Ok(())
    }

    fn take_resize(&mut self) -> Option<Size> {
        lock(&self.state).pending_resize.take()
    }
}

impl MemoryHandle {
    /// Queue bytes for the next read.
    pub fn push_input(&self, bytes: impl Into<Vec<u8>>) {
        lock(&self.state).script.push_back(Step::Bytes(bytes.into()));
    }

    /// Queue a read that reports a signal interruption.
    pub fn push_interrupt(&self) {
        lock(&self.state).script.push_back(Step::Interrupt);
    }

    /// Queue a resize signal. It is delivered as an interrupted read, the
    /// way SIGWINCH interrupts a blocked terminal read.
    pub fn push_resize(&self, cols: u16, rows: u16) {
        lock(&self.state)
            .script
            .push_back(Step::Resize(Size { cols, rows }));
    }

    /// Signal a resize right away, without waiting for a read.
    pub fn resize_now(&self, cols: u16, rows: u16) {
        let mut state = lock(&self.state);
        state.size = Size { cols, rows };
        state.pending_resize = Some(state.size);
    }

    /// Make the next `n` writes fail with `BrokenPipe`.
    pub fn fail_next_writes(&self, n: usize) {
        lock(&self.state).fail_writes = n;
    }

    /// Drain everything written so far.
    #[must_use]
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.state).output)
    }

    /// Number of successful `write_all` calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        lock(&self.state).writes
    }

    /// Whether raw mode is currently on.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        lock(&self.state).raw
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ── Size ──────────────────────────────────────────────────────────

    #[test]
    fn size_fallback() {
        assert_eq!(Size::FALLBACK, Size { cols: 80, rows: 24 });
    }

    // ── Timeout ───────────────────────────────────────────────────────

    #[test]
    fn timeout_from_millis() {
        assert_eq!(Timeout::from_millis(-1), Timeout::Forever);
        assert_eq!(Timeout::from_millis(0), Timeout::Poll);
        assert_eq!(
            Timeout::from_millis(25),
            Timeout::After(Duration::from_millis(25))
        );
    }

    #[test]
    fn timeout_min() {
        let short = Timeout::After(Duration::from_millis(5));
        let long = Timeout::After(Duration::from_millis(50));
        assert_eq!(short.min(long), short);
        assert_eq!(Timeout::Forever.min(long), long);
        assert_eq!(long.min(Timeout::Poll), Timeout::Poll);
        assert_eq!(Timeout::Forever.min(Timeout::Forever), Timeout::Forever);
    }

    #[test]
    fn timeout_poll_millis_rounds_up() {
        assert_eq!(Timeout::Poll.as_poll_millis(), 0);
        assert_eq!(Timeout::Forever.as_poll_millis(), -1);
        assert_eq!(Timeout::After(Duration::from_micros(1)).as_poll_millis(), 1);
        assert_eq!(Timeout::After(Duration::from_millis(40)).as_poll_millis(), 40);
    }

    // ── MemoryBackend ─────────────────────────────────────────────────

    #[test]
    fn scripted_reads_in_order() {
        let (mut backend, handle) = MemoryBackend::new(10, 5);
        handle.push_input(b"ab".to_vec());
        handle.push_interrupt();
        handle.push_input("c");

        let mut buf = [0u8; 8];
        assert_eq!(backend.read(&mut buf, Timeout::Forever).unwrap(), ReadOutcome::Data(2));
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(backend.read(&mut buf, Timeout::Forever).unwrap(), ReadOutcome::Interrupted);
        assert_eq!(backend.read(&mut buf, Timeout::Forever).unwrap(), ReadOutcome::Data(1));
        assert_eq!(backend.read(&mut buf, Timeout::Poll).unwrap(), ReadOutcome::NoData);
        assert_eq!(backend.read(&mut buf, Timeout::Forever).unwrap(), ReadOutcome::Eof);
    }

    #[test]
    fn short_buffer_keeps_remainder() {
        let (mut backend, handle) = MemoryBackend::new(10, 5);
        handle.push_input("hello");
        let mut buf = [0u8; 3];
        assert_eq!(backend.read(&mut buf, Timeout::Poll).unwrap(), ReadOutcome::Data(3));
        assert_eq!(&buf, b"hel");
        assert_eq!(backend.read(&mut buf, Timeout::Poll).unwrap(), ReadOutcome::Data(2));
        assert_eq!(&buf[..2], b"lo");
    }

    #[test]
    fn scripted_resize_interrupts_and_updates_size() {
        let (mut backend, handle) = MemoryBackend::new(10, 5);
        handle.push_resize(30, 8);
        let mut buf = [0u8; 4];
        assert_eq!(backend.read(&mut buf, Timeout::Forever).unwrap(), ReadOutcome::Interrupted);
        assert_eq!(backend.take_resize(), Some(Size { cols: 30, rows: 8 }));
        assert_eq!(backend.take_resize(), None);
        assert_eq!(backend.size().unwrap(), Size { cols: 30, rows: 8 });
    }

    #[test]
    fn writes_are_captured_and_failures_injected() {
        let (mut backend, handle) = MemoryBackend::new(10, 5);
        backend.write_all(b"one").unwrap();
        handle.fail_next_writes(1);
        let err = backend.write_all(b"two").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        backend.write_all(b"three").unwrap();
        assert_eq!(handle.take_output(), b"onethree");
        assert_eq!(handle.write_count(), 2);
        assert!(handle.take_output().is_empty());
    }

    #[test]
    fn raw_mode_toggles() {
        let (mut backend, handle) = MemoryBackend::new(10, 5);
        assert!(!handle.is_raw());
        backend.enter_raw_mode().unwrap();
        assert!(handle.is_raw());
        backend.restore_mode().unwrap();
        assert!(!handle.is_raw());
    }

    #[test]
    fn boxed_backend_delegates() {
        let (backend, handle) = MemoryBackend::new(4, 2);
        let mut boxed: Box<dyn Backend> = Box::new(backend);
        assert_eq!(boxed.size().unwrap(), Size { cols: 4, rows: 2 });
        boxed.write_all(b"x").unwrap();
        assert_eq!(handle.take_output(), b"x");
    }
}
