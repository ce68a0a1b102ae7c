// SPDX-License-Identifier: MIT
//
// Session controller.
//
// A `Session` owns everything one terminal needs: the channel, the back
// buffer and its damage, the renderer with its front buffer, the input
// decoder, and the logical cursor. Lifecycle:
//
//   Uninitialized --init--> Active --shutdown--> Uninitialized
//
// While active, `resize` reallocates both buffers and forces a full
// redraw. Every operation other than `init`, `init_with`, `state` and
// `shutdown` fails with `NotInitialized` outside the active state.
//
// Shutdown is idempotent and never fails: it writes the cleanup sequence,
// restores the terminal mode, and only logs what went wrong. Dropping an
// active session shuts it down.

use std::io;
use std::time::Instant;

use crate::ansi;
use crate::backend::{Backend, ReadOutcome, Timeout};
use crate::buffer::CellBuffer;
use crate::cell::{Attribute, Cell};
use crate::config::Config;
use crate::damage::Damage;
use crate::error::{Error, Result};
use crate::input::{Decoder, Event};
use crate::keys::{InputMode, OutputMode};
use crate::render::{CursorState, Renderer};

// ─── SessionState ────────────────────────────────────────────────────────────

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Active,
    /// Cleanup is in progress. Only observable from inside shutdown.
    ShuttingDown,
}

// ─── Active ──────────────────────────────────────────────────────────────────

/// Per-terminal state that exists only while a session is active.
struct Active {
    backend: Box<dyn Backend>,
    back: CellBuffer,
    damage: Damage,
    renderer: Renderer,
    decoder: Decoder,
    cursor: CursorState,
    read_buf: Vec<u8>,
    /// When the decoder started holding an incomplete sequence.
    pending_since: Option<Instant>,
}

impl Active {
    /// Adopt new dimensions, dropping all content.
    fn resize(&mut self, width: u16, height: u16) {
        if (width, height) == (self.back.width(), self.back.height()) {
            return;
        }
        self.back.resize(width, height);
        self.damage.resize(width, height);
        self.renderer.resize(width, height);
        if !self.back.in_bounds(self.cursor.x, self.cursor.y) {
            self.cursor = CursorState::HIDDEN;
        }
        tracing::info!(width, height, "resized");
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// One terminal session.
///
/// ```no_run
/// use rbox_term::{Attribute, Session, Source};
///
/// let mut session = Session::new();
/// session.init(Source::Controlling)?;
/// session.print(0, 0, Attribute::DEFAULT, Attribute::DEFAULT, "hello")?;
/// session.present()?;
/// let event = session.poll_event()?;
/// session.shutdown();
/// # let _ = event;
/// # Ok::<(), rbox_term::Error>(())
/// ```
pub struct Session {
    state: SessionState,
    config: Config,
    active: Option<Active>,
}

impl Session {
    /// An uninitialized session with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// An uninitialized session that will use `config` on init.
    #[must_use]
    pub const fn with_config(config: Config) -> Self {
        Self {
            state: SessionState::Uninitialized,
            config,
            active: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    fn active(&self) -> Result<&Active> {
        self.active.as_ref().ok_or(Error::NotInitialized)
    }

    fn active_mut(&mut self) -> Result<&mut Active> {
        self.active.as_mut().ok_or(Error::NotInitialized)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Bind a terminal and take it over.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] while active, [`Error::InvalidArgument`]
    /// for a malformed source, [`Error::Io`] if the terminal cannot be
    /// opened or set up.
    #[cfg(unix)]
    pub fn init(&mut self, source: crate::terminal::Source) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        source.validate()?;
        let tty = crate::terminal::Tty::open(source)?;
        self.init_with(tty)
    }

    /// Take over an arbitrary channel.
    ///
    /// Enters raw mode, then writes the setup sequence: alternate screen
    /// (if configured), hidden cursor, and mouse reporting (if the input
    /// mode asks for it). Raw mode is undone again if setup fails.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] while active, [`Error::InvalidArgument`]
    /// for an invalid configuration, [`Error::Io`] if the channel fails.
    pub fn init_with(&mut self, backend: impl Backend + 'static) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.config.validate()?;

        let mut backend: Box<dyn Backend> = Box::new(backend);
        backend
            .enter_raw_mode()
            .map_err(|e| Error::io("entering raw mode", e))?;

        let size = match backend.size() {
            Ok(size) => size,
            Err(e) => {
                let _ = backend.restore_mode();
                return Err(Error::io("querying terminal size", e));
            }
        };

        let mut setup = Vec::with_capacity(64);
        if self.config.alternate_screen {
            ansi::enter_alt_screen(&mut setup).ok();
        }
        ansi::cursor_hide(&mut setup).ok();
        if self.config.input_mode.mouse {
            ansi::enable_mouse(&mut setup).ok();
        }
        if let Err(e) = backend.write_all(&setup) {
            let _ = backend.restore_mode();
            return Err(Error::io("writing terminal setup", e));
        }

        self.active = Some(Active {
            backend,
            back: CellBuffer::new(size.cols, size.rows),
            damage: Damage::new(size.cols, size.rows),
            renderer: Renderer::new(size.cols, size.rows, self.config.output_mode),
            decoder: Decoder::new(self.config.input_mode),
            cursor: CursorState::HIDDEN,
            read_buf: vec![0; self.config.read_chunk],
            pending_since: None,
        });
        self.state = SessionState::Active;
        tracing::info!(width = size.cols, height = size.rows, "session initialized");
        Ok(())
    }

    /// Give the terminal back: write the cleanup sequence and restore the
    /// original mode. A no-op when not active. Errors are logged, not
    /// returned, and never stop the mode from being restored.
    pub fn shutdown(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        self.state = SessionState::ShuttingDown;

        let mut cleanup = Vec::with_capacity(64);
        if active.decoder.mode().mouse {
            ansi::disable_mouse(&mut cleanup).ok();
        }
        ansi::reset(&mut cleanup).ok();
        ansi::cursor_show(&mut cleanup).ok();
        if self.config.alternate_screen {
            ansi::exit_alt_screen(&mut cleanup).ok();
        }
        if let Err(error) = active.backend.write_all(&cleanup) {
            tracing::warn!(%error, "writing terminal cleanup failed");
        }
        if let Err(error) = active.backend.restore_mode() {
            tracing::warn!(%error, "restoring terminal mode failed");
        }

        self.state = SessionState::Uninitialized;
        tracing::info!("session shut down");
    }

    // ─── Dimensions ──────────────────────────────────────────────────────

    /// Grid width in columns.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn width(&self) -> Result<u16> {
        Ok(self.active()?.back.width())
    }

    /// Grid height in rows.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn height(&self) -> Result<u16> {
        Ok(self.active()?.back.height())
    }

    /// Reallocate both buffers at the new size and force a full redraw.
    /// The content is lost. A no-op if the size is unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        self.active_mut()?.resize(width, height);
        Ok(())
    }

    // ─── Cells ───────────────────────────────────────────────────────────

    /// Reset every cell to an empty cell with the given attributes. Only
    /// cells that actually change become dirty.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn clear(&mut self, fg: Attribute, bg: Attribute) -> Result<()> {
        let Active { back, damage, .. } = self.active_mut()?;
        back.fill(Cell::blank(fg, bg), |y, span| damage.mark(y, span));
        Ok(())
    }

    /// Write one rune. Wide runes take two columns; one at the last column
    /// is clipped to a blank.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state,
    /// [`Error::OutOfBounds`] off the grid, [`Error::InvalidArgument`] for
    /// a rune that does not occupy a column.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, fg: Attribute, bg: Attribute) -> Result<()> {
        let a = self.active_mut()?;
        let span = a.back.put_cell(x, y, ch, fg, bg)?;
        a.damage.mark(y, span);
        Ok(())
    }

    /// Write `text` from `(x, y)` to the right, clipped at the edge.
    /// Returns the number of columns written.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state,
    /// [`Error::OutOfBounds`] if the start is off the grid.
    pub fn print(&mut self, x: u16, y: u16, fg: Attribute, bg: Attribute, text: &str) -> Result<u16> {
        let a = self.active_mut()?;
        let (columns, span) = a.back.print(x, y, fg, bg, text)?;
        if let Some(span) = span {
            a.damage.mark(y, span);
        }
        Ok(columns)
    }

    /// Read back a cell of the pending frame.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state,
    /// [`Error::OutOfBounds`] off the grid.
    pub fn cell(&self, x: u16, y: u16) -> Result<Cell> {
        let back = &self.active()?.back;
        back.check(x, y)?;
        Ok(back.get(x, y).copied().unwrap_or(Cell::EMPTY))
    }

    // ─── Cursor ──────────────────────────────────────────────────────────

    /// Show the cursor at `(x, y)` from the next present on.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state,
    /// [`Error::OutOfBounds`] off the grid.
    pub fn set_cursor(&mut self, x: u16, y: u16) -> Result<()> {
        let a = self.active_mut()?;
        a.back.check(x, y)?;
        a.cursor = CursorState::at(x, y);
        Ok(())
    }

    /// Hide the cursor from the next present on.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn hide_cursor(&mut self) -> Result<()> {
        self.active_mut()?.cursor = CursorState::HIDDEN;
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn cursor(&self) -> Result<CursorState> {
        Ok(self.active()?.cursor)
    }

    // ─── Presenting ──────────────────────────────────────────────────────

    /// Bring the terminal up to date with the back buffer in one write.
    ///
    /// Writes nothing at all when no cell is dirty and the cursor did not
    /// change. If the write fails the damage and front buffer are left as
    /// they were; call [`invalidate`](Self::invalidate) before retrying.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state, [`Error::Io`]
    /// if the write fails.
    pub fn present(&mut self) -> Result<()> {
        let a = self.active_mut()?;
        let stats = a.renderer.render(&a.back, &a.damage, a.cursor);
        if a.renderer.output().is_empty() {
            return Ok(());
        }

        if let Err(error) = a.backend.write_all(a.renderer.output()) {
            tracing::warn!(%error, bytes = stats.bytes_written, "present failed");
            return Err(Error::io("writing frame", error));
        }

        a.renderer.commit(&a.back);
        a.damage.clear();
        tracing::trace!(
            rendered = stats.cells_rendered,
            skipped = stats.cells_skipped,
            bytes = stats.bytes_written,
            full = stats.full_redraw,
            "presented"
        );
        Ok(())
    }

    /// Forget what the terminal shows: the next present clears the screen
    /// and repaints every cell.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn invalidate(&mut self) -> Result<()> {
        let a = self.active_mut()?;
        a.renderer.invalidate();
        a.damage.mark_all();
        Ok(())
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// Wait at most `timeout` for the next event.
    ///
    /// A pending resize is reported before any buffered input. An
    /// incomplete escape sequence is resolved once it has waited for the
    /// escape delay. Interrupted reads are retried.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state, [`Error::Io`]
    /// if reading fails or the input side is closed.
    pub fn peek_event(&mut self, timeout: Timeout) -> Result<Option<Event>> {
        let delay = self.config.escape_delay();
        let a = self.active_mut()?;
        let start = Instant::now();
        // A deadline past the end of the clock waits forever.
        let deadline = match timeout {
            Timeout::Poll => Some(start),
            Timeout::After(d) => start.checked_add(d),
            Timeout::Forever => None,
        };

        loop {
            if let Some(size) = a.backend.take_resize() {
                a.resize(size.cols, size.rows);
                return Ok(Some(Event::Resize {
                    width: size.cols,
                    height: size.rows,
                }));
            }
            if let Some(event) = a.decoder.next_event() {
                a.pending_since = None;
                return Ok(Some(event));
            }

            let now = Instant::now();
            let mut wait = match deadline {
                None => Timeout::Forever,
                Some(d) if d > now => Timeout::After(d - now),
                Some(_) => Timeout::Poll,
            };
            if a.decoder.has_pending() {
                let since = *a.pending_since.get_or_insert(now);
                if let Some(flush_at) = since.checked_add(delay) {
                    // Once the delay is up, only bytes already waiting can
                    // still complete the sequence.
                    wait = if now >= flush_at {
                        Timeout::Poll
                    } else {
                        wait.min(Timeout::After(flush_at - now))
                    };
                }
            } else {
                a.pending_since = None;
            }

            let outcome = a
                .backend
                .read(&mut a.read_buf, wait)
                .map_err(|e| Error::io("reading input", e))?;
            match outcome {
                ReadOutcome::Data(n) => {
                    a.decoder.feed(&a.read_buf[..n]);
                    a.pending_since = None;
                }
                ReadOutcome::Interrupted => {}
                ReadOutcome::NoData => {
                    let now = Instant::now();
                    let flush_due = a
                        .pending_since
                        .and_then(|since| since.checked_add(delay))
                        .is_some_and(|at| at <= now);
                    if flush_due {
                        a.pending_since = None;
                        if let Some(event) = a.decoder.flush() {
                            return Ok(Some(event));
                        }
                        continue;
                    }
                    if deadline.is_some_and(|d| now >= d) {
                        return Ok(None);
                    }
                }
                ReadOutcome::Eof => {
                    if let Some(event) = a.decoder.flush() {
                        return Ok(Some(event));
                    }
                    return Err(Error::io(
                        "reading input",
                        io::Error::from(io::ErrorKind::UnexpectedEof),
                    ));
                }
            }
        }
    }

    /// Block until the next event.
    ///
    /// # Errors
    ///
    /// As [`peek_event`](Self::peek_event).
    pub fn poll_event(&mut self) -> Result<Event> {
        loop {
            if let Some(event) = self.peek_event(Timeout::Forever)? {
                return Ok(event);
            }
        }
    }

    // ─── Modes ───────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn input_mode(&self) -> Result<InputMode> {
        Ok(self.active()?.decoder.mode())
    }

    /// Change the escape policy and mouse reporting. Turning mouse
    /// reporting on or off writes the matching terminal sequences.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state, [`Error::Io`]
    /// if the mouse sequences cannot be written.
    pub fn set_input_mode(&mut self, mode: InputMode) -> Result<()> {
        let a = self.active_mut()?;
        let old = a.decoder.mode();
        if old.mouse != mode.mouse {
            let mut seq = Vec::with_capacity(32);
            if mode.mouse {
                ansi::enable_mouse(&mut seq).ok();
            } else {
                ansi::disable_mouse(&mut seq).ok();
            }
            a.backend
                .write_all(&seq)
                .map_err(|e| Error::io("switching mouse reporting", e))?;
        }
        a.decoder.set_mode(mode);
        tracing::debug!(?old, new = ?mode, "input mode changed");
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn output_mode(&self) -> Result<OutputMode> {
        Ok(self.active()?.renderer.mode())
    }

    /// Change the color mapping. Every cell is repainted on the next
    /// present.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside the active state.
    pub fn set_output_mode(&mut self, mode: OutputMode) -> Result<()> {
        let a = self.active_mut()?;
        let old = a.renderer.mode();
        if old != mode {
            a.renderer.set_mode(mode);
            a.damage.mark_all();
            tracing::debug!(?old, new = ?mode, "output mode changed");
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Session");
        d.field("state", &self.state);
        if let Some(a) = &self.active {
            d.field("size", &(a.back.width(), a.back.height()));
            d.field("cursor", &a.cursor);
        }
        d.finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
