// SPDX-License-Identifier: MIT
//
// Terminal channel: descriptors, raw mode, resize signals, RAII cleanup.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), poll, read/write on raw descriptors,
// fcntl, isatty and sigaction. These are the POSIX interfaces for terminal
// control and have no safe equivalent in std. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// A `Tty` binds an input and an output descriptor, either the controlling
// terminal, one descriptor used both ways, a device path, or two separate
// descriptors. Raw mode is applied to the input side when it is a terminal
// and skipped otherwise, so pipes and sockets work as channels too.
//
// Restoring the terminal is guaranteed three ways: explicitly through
// `restore_mode`, from `Drop`, and from a panic hook that writes a
// pre-built restore sequence straight to the output descriptor. The hook
// bypasses every lock except the termios backup, so a panic mid-frame
// still leaves a usable shell behind.
//
// Resizes arrive as SIGWINCH. The handler only bumps a process-wide
// generation counter; each `Tty` remembers the generation it last saw, so
// every channel observes each signal exactly once.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Mutex, Once};

use crate::backend::{Backend, ReadOutcome, Size, Timeout};
use crate::error::{Error, Result};

// ─── Source ─────────────────────────────────────────────────────────────────

/// Where a session's terminal comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The process's controlling terminal (`/dev/tty`).
    Controlling,
    /// One descriptor used for both reading and writing. Borrowed: the
    /// caller keeps ownership and the descriptor is not closed.
    Fd(RawFd),
    /// A terminal device opened read/write by path.
    Path(PathBuf),
    /// Separate borrowed input and output descriptors.
    Split { input: RawFd, output: RawFd },
}

impl Source {
    /// Reject arguments that can never name a terminal, before anything
    /// is opened or changed.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for negative descriptors or an empty path.
    pub fn validate(&self) -> Result<()> {
        let negative = |fd: RawFd, what: &'static str| {
            if fd < 0 {
                Err(Error::invalid(what, format!("negative descriptor {fd}")))
            } else {
                Ok(())
            }
        };
        match self {
            Self::Controlling => Ok(()),
            Self::Fd(fd) => negative(*fd, "fd"),
            Self::Path(path) if path.as_os_str().is_empty() => {
                Err(Error::invalid("path", "empty terminal path"))
            }
            Self::Path(_) => Ok(()),
            Self::Split { input, output } => {
                negative(*input, "input fd")?;
                negative(*output, "output fd")
            }
        }
    }
}

// ─── Low-level Helpers ──────────────────────────────────────────────────────

/// Check whether `fd` is connected to a terminal.
#[must_use]
pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) != 0 }
}

/// Query the size of the terminal behind `fd` via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if `fd` is not a terminal or reports a zero size.
#[must_use]
pub fn get_size(fd: RawFd) -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

fn check_open(fd: RawFd, context: &'static str) -> Result<()> {
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return Err(Error::io(context, io::Error::last_os_error()));
    }
    Ok(())
}

fn open_rw(path: &Path, context: &'static str) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| Error::io(context, e))
}

// ─── Resize Signal ──────────────────────────────────────────────────────────

/// Bumped by the SIGWINCH handler. Async-signal-safe: one atomic add.
static RESIZE_GENERATION: AtomicU64 = AtomicU64::new(0);

static SIGWINCH_INSTALLED: Once = Once::new();

extern "C" fn handle_sigwinch(_: libc::c_int) {
    RESIZE_GENERATION.fetch_add(1, Ordering::Relaxed);
}

fn install_sigwinch_handler() {
    SIGWINCH_INSTALLED.call_once(|| unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = handle_sigwinch as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        if libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut()) != 0 {
            tracing::warn!(
                error = %io::Error::last_os_error(),
                "could not install SIGWINCH handler, resizes will go unnoticed"
            );
        }
    });
}

// ─── Panic-Safe Terminal Restore ────────────────────────────────────────────

/// Input descriptor and original termios of the channel in raw mode, for
/// the panic hook. Only one channel can be in raw mode on a terminal at a
/// time, so one slot suffices.
static TERMIOS_BACKUP: Mutex<Option<(RawFd, libc::termios)>> = Mutex::new(None);

/// Output descriptor the panic hook writes the restore sequence to.
static RESTORE_FD: AtomicI32 = AtomicI32::new(-1);

/// Complete restore sequence for emergency use: end synchronized output,
/// disable mouse reporting, reset SGR, show cursor, leave the alternate
/// screen. The alternate screen exit comes last so the shell content
/// reappears without leftovers.
#[rustfmt::skip]
const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?2026l\
    \x1b[?1006l\x1b[?1015l\x1b[?1002l\x1b[?1000l\
    \x1b[0m\
    \x1b[?25h\
    \x1b[?1049l";

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install a panic hook that restores the terminal before the original
/// hook prints its message.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();
            restore_termios_from_backup();
            original(info);
        }));
    });
}

fn emergency_restore() {
    let fd = RESTORE_FD.load(Ordering::Relaxed);
    if fd < 0 {
        return;
    }
    unsafe {
        let _ = libc::write(
            fd,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }
}

fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some((fd, ref original)) = *guard {
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSANOW, original);
            }
        }
    }
}

// ─── Tty ────────────────────────────────────────────────────────────────────

/// A terminal channel over real descriptors.
///
/// Raw mode is undone when the handle is dropped, and by the panic hook if
/// the process panics first.
pub struct Tty {
    input: RawFd,
    output: RawFd,
    /// Keeps descriptors we opened ourselves alive; borrowed ones are not
    /// owned and therefore not closed.
    _owned: Option<OwnedFd>,
    /// Termios saved before entering raw mode.
    original_termios: Option<libc::termios>,
    /// Last resize generation this channel reported.
    seen_generation: u64,
    /// Size reported by the last query, used when the channel has none.
    last_size: Size,
}

impl Tty {
    /// Bind the descriptors named by `source`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `source` fails validation,
    /// [`Error::Io`] if a descriptor is not open or a path cannot be opened.
    pub fn open(source: Source) -> Result<Self> {
        source.validate()?;

        let (input, output, owned) = match source {
            Source::Controlling => {
                let file = open_rw(Path::new("/dev/tty"), "opening /dev/tty")?;
                let fd = file.as_raw_fd();
                (fd, fd, Some(OwnedFd::from(file)))
            }
            Source::Path(path) => {
                let file = open_rw(&path, "opening terminal path")?;
                let fd = file.as_raw_fd();
                (fd, fd, Some(OwnedFd::from(file)))
            }
            Source::Fd(fd) => {
                check_open(fd, "checking terminal descriptor")?;
                (fd, fd, None)
            }
            Source::Split { input, output } => {
                check_open(input, "checking input descriptor")?;
                check_open(output, "checking output descriptor")?;
                (input, output, None)
            }
        };

        install_sigwinch_handler();
        let last_size = get_size(output).unwrap_or(Size::FALLBACK);
        tracing::debug!(input, output, ?last_size, "terminal channel bound");

        Ok(Self {
            input,
            output,
            _owned: owned,
            original_termios: None,
            seen_generation: RESIZE_GENERATION.load(Ordering::Relaxed),
            last_size,
        })
    }

    /// Take ownership of an already-open descriptor and use it both ways.
    /// It is closed when the `Tty` is dropped.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open) for a descriptor source.
    pub fn from_owned(fd: OwnedFd) -> Result<Self> {
        let mut tty = Self::open(Source::Fd(fd.as_raw_fd()))?;
        tty._owned = Some(fd);
        Ok(tty)
    }

    #[must_use]
    pub const fn input_fd(&self) -> RawFd {
        self.input
    }

    #[must_use]
    pub const fn output_fd(&self) -> RawFd {
        self.output
    }

    /// Whether raw mode is active on this channel.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.original_termios.is_some()
    }

    /// Read one byte, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`Backend::read`].
    pub fn read_byte(&mut self, timeout: Timeout) -> io::Result<(ReadOutcome, u8)> {
        let mut byte = [0u8; 1];
        let outcome = self.read(&mut byte, timeout)?;
        Ok((outcome, byte[0]))
    }

    // ── Raw Mode (termios) ──────────────────────────────────────────

    fn enable_raw_mode(&mut self) -> io::Result<()> {
        if self.original_termios.is_some() || !is_tty(self.input) {
            return Ok(());
        }

        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(self.input, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.original_termios = Some(termios);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some((self.input, termios));
            }

            // cfmakeraw equivalent: disable all line processing.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;

            // VMIN=1, VTIME=0: read() returns as soon as one byte is there.
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(self.input, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(())
    }

    fn disable_raw_mode(&mut self) -> io::Result<()> {
        if let Some(ref original) = self.original_termios {
            unsafe {
                if libc::tcsetattr(self.input, libc::TCSAFLUSH, original) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
            self.original_termios = None;
        }

        Ok(())
    }
}

impl Backend for Tty {
    fn size(&mut self) -> io::Result<Size> {
        if let Some(size) = get_size(self.output) {
            self.last_size = size;
        }
        Ok(self.last_size)
    }

    fn enter_raw_mode(&mut self) -> io::Result<()> {
        install_panic_hook();
        self.enable_raw_mode()?;
        if self.is_raw() {
            RESTORE_FD.store(self.output, Ordering::Relaxed);
        }
        Ok(())
    }

    fn restore_mode(&mut self) -> io::Result<()> {
        let _ = RESTORE_FD.compare_exchange(self.output, -1, Ordering::Relaxed, Ordering::Relaxed);
        self.disable_raw_mode()
    }

    fn read(&mut self, buf: &mut [u8], timeout: Timeout) -> io::Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::NoData);
        }

        let mut pfd = libc::pollfd {
            fd: self.input,
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&raw mut pfd, 1, timeout.as_poll_millis()) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            return if err.kind() == io::ErrorKind::Interrupted {
                Ok(ReadOutcome::Interrupted)
            } else {
                Err(err)
            };
        }
        if ready == 0 {
            return Ok(ReadOutcome::NoData);
        }

        let n = unsafe { libc::read(self.input, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len()) };
        match n {
            0 => Ok(ReadOutcome::Eof),
            n if n > 0 => Ok(ReadOutcome::Data(n.unsigned_abs())),
            _ => {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::Interrupted => Ok(ReadOutcome::Interrupted),
                    io::ErrorKind::WouldBlock => Ok(ReadOutcome::NoData),
                    _ => Err(err),
                }
            }
        }
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> io::Result<()> {
        while !bytes.is_empty() {
            let n = unsafe {
                libc::write(self.output, bytes.as_ptr().cast::<libc::c_void>(), bytes.len())
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero));
            }
            bytes = &bytes[n.unsigned_abs()..];
        }
        Ok(())
    }

    fn take_resize(&mut self) -> Option<Size> {
        let generation = RESIZE_GENERATION.load(Ordering::Relaxed);
        if generation == self.seen_generation {
            return None;
        }
        self.seen_generation = generation;
        self.size().ok()
    }
}

impl Drop for Tty {
    fn drop(&mut self) {
        if self.is_raw() {
            let _ = self.restore_mode();
        }
    }
}

impl std::fmt::Debug for Tty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tty")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("raw", &self.is_raw())
            .finish_non_exhaustive()
    }
}

/// Whether `err` came from binding a terminal that is not there.
#[must_use]
pub fn is_missing_terminal(err: &Error) -> bool {
    matches!(err, Error::Io { source, .. } if source.kind() == io::ErrorKind::NotFound
        || source.raw_os_error() == Some(libc::ENXIO)
        || source.raw_os_error() == Some(libc::EBADF))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
