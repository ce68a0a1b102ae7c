// SPDX-License-Identifier: MIT
//
// rbox-term: terminal cell-grid engine.
//
// A termbox-style screen model: a fixed grid of cells, each holding one
// rune plus foreground and background attributes. Writes land in a back
// buffer and mark per-row damage; `present` diffs the damaged spans against
// the front buffer and sends the terminal one synchronized block of escape
// sequences. Raw input bytes are decoded into key, mouse and resize events.
//
// Layers, leaves first:
//
//   terminal / backend   byte channel, raw mode, resize signals
//   keys / input         frozen key tables and the escape-sequence decoder
//   cell / buffer        cells, attributes, the grid and wide-glyph pairs
//   damage               per-row dirty spans
//   ansi / output        escape encoding and stateful cell writing
//   render               back-vs-front diff into one frame of output
//   session              lifecycle and the public operations
//
// The terminal is driven with raw termios and hand-written ANSI sequences.
// No TUI framework sits underneath.

pub mod ansi;
pub mod backend;
pub mod buffer;
pub mod cell;
pub mod config;
pub mod damage;
pub mod error;
pub mod input;
pub mod keys;
pub mod output;
pub mod render;
pub mod session;
#[cfg(unix)]
pub mod terminal;

pub use backend::{Backend, MemoryBackend, MemoryHandle, ReadOutcome, Size, Timeout};
pub use cell::{Attribute, Cell, Color, Style};
pub use config::Config;
pub use error::{Error, Result};
pub use input::{Event, EventRecord, KeyCode, KeyEvent, MouseEvent};
pub use keys::{EscapeMode, EventType, InputMode, Key, Mod, OutputMode};
pub use render::CursorState;
pub use session::{Session, SessionState};
#[cfg(unix)]
pub use terminal::{Source, Tty};
