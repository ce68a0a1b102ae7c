// SPDX-License-Identifier: MIT
//
// rbox: terminal event viewer.
//
// Takes over a terminal through rbox-term and prints every decoded event,
// newest at the bottom. It doubles as a manual test bench for the engine:
//
//   F1      toggle mouse reporting
//   F2      cycle the output mode (normal, 256, 216, grayscale)
//   F3      toggle the escape policy (esc, alt)
//   F5      invalidate and repaint everything
//   Ctrl-Q  quit (Ctrl-C as well, since raw mode eats SIGINT)
//
// Layout:
//
//   ┌──────────────────────────────┐
//   │ title                        │  row 0
//   │ current modes                │  row 1
//   │ palette swatch               │  row 2
//   ├──────────────────────────────┤
//   │ event log                    │  rows 4..
//   └──────────────────────────────┘
//
// The terminal is in raw mode for the whole run, so logs go to a file.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rbox_term::{
    Attribute, Color, Config, EscapeMode, Event, EventRecord, InputMode, Key, KeyCode, Mod,
    OutputMode, Session, Source, Style,
};
use rbox_term::terminal::is_missing_terminal;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "rbox", version, about = "Show decoded terminal events")]
struct Args {
    /// Use an already-open descriptor for both input and output.
    #[arg(long, conflicts_with_all = ["tty", "input_fd"])]
    fd: Option<i32>,

    /// Open this terminal device instead of /dev/tty.
    #[arg(long, value_name = "PATH", conflicts_with = "input_fd")]
    tty: Option<PathBuf>,

    /// Read input from this descriptor (requires --output-fd).
    #[arg(long, requires = "output_fd")]
    input_fd: Option<i32>,

    /// Write output to this descriptor (requires --input-fd).
    #[arg(long, requires = "input_fd")]
    output_fd: Option<i32>,

    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log file. Filter with RBOX_LOG (default: info).
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

impl Args {
    fn source(&self) -> Result<Source> {
        Ok(match (self.fd, &self.tty, self.input_fd, self.output_fd) {
            (Some(fd), _, _, _) => Source::Fd(fd),
            (_, Some(path), _, _) => Source::Path(path.clone()),
            (_, _, Some(input), Some(output)) => Source::Split { input, output },
            (None, None, None, None) => Source::Controlling,
            _ => bail!("--input-fd and --output-fd must be given together"),
        })
    }
}

fn init_logging(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| std::env::temp_dir().join("rbox.log"));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_env("RBOX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

// ─── Viewer ─────────────────────────────────────────────────────────────────

const LOG_TOP: u16 = 4;

const TITLE: Attribute = Attribute::new(Color::Default, Style::BOLD.union(Style::REVERSE));
const DIM: Attribute = Attribute::new(Color::Indexed(8), Style::empty());
const PLAIN: Attribute = Attribute::DEFAULT;

struct Viewer {
    session: Session,
    events: VecDeque<String>,
}

impl Viewer {
    fn run(&mut self) -> Result<()> {
        self.draw()?;
        loop {
            let event = self.session.poll_event().context("waiting for input")?;
            info!(?event, "event");
            if is_quit(&event) {
                return Ok(());
            }
            self.handle(event)?;
            self.draw()?;
        }
    }

    fn handle(&mut self, event: Event) -> Result<()> {
        let line = describe(&event);
        self.events.push_back(line);

        if let Event::Key(key) = event {
            match key.code {
                KeyCode::Key(Key::F1) => {
                    let mode = self.session.input_mode()?;
                    self.session
                        .set_input_mode(InputMode::new(mode.escape, !mode.mouse))?;
                }
                KeyCode::Key(Key::F2) => {
                    let next = match self.session.output_mode()? {
                        OutputMode::Normal => OutputMode::Palette256,
                        OutputMode::Palette256 => OutputMode::Palette216,
                        OutputMode::Palette216 => OutputMode::Grayscale,
                        OutputMode::Grayscale => OutputMode::Normal,
                    };
                    self.session.set_output_mode(next)?;
                }
                KeyCode::Key(Key::F3) => {
                    let mode = self.session.input_mode()?;
                    let escape = match mode.escape {
                        EscapeMode::Esc => EscapeMode::Alt,
                        EscapeMode::Alt => EscapeMode::Esc,
                    };
                    self.session.set_input_mode(InputMode::new(escape, mode.mouse))?;
                }
                KeyCode::Key(Key::F5) => self.session.invalidate()?,
                _ => {}
            }
        }
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let s = &mut self.session;
        let (width, height) = (s.width()?, s.height()?);
        s.clear(PLAIN, PLAIN)?;
        if width == 0 || height == 0 {
            return s.present().map_err(Into::into);
        }

        let title = format!(" rbox {width}x{height}  Ctrl-Q quits ");
        s.print(0, 0, TITLE, TITLE, &title)?;

        if height > 1 {
            let input = s.input_mode()?;
            let modes = format!(
                "F1 mouse: {}  F2 output: {:?}  F3 escape: {:?}  F5 repaint",
                if input.mouse { "on" } else { "off" },
                s.output_mode()?,
                input.escape,
            );
            s.print(0, 1, DIM, PLAIN, &modes)?;
        }

        if height > 2 {
            for i in 0..16u8 {
                let x = u16::from(i) * 2;
                if x >= width {
                    break;
                }
                let swatch = Attribute::from(Color::Indexed(i));
                s.print(x, 2, PLAIN, swatch, "  ")?;
            }
        }

        let rows = usize::from(height.saturating_sub(LOG_TOP));
        while self.events.len() > rows.max(1) {
            self.events.pop_front();
        }
        for (y, line) in (LOG_TOP..height).zip(self.events.iter()) {
            s.print(0, y, PLAIN, PLAIN, line)?;
        }

        s.present()?;
        Ok(())
    }
}

fn is_quit(event: &Event) -> bool {
    matches!(
        event,
        Event::Key(k) if k.modifiers.contains(Mod::CTRL)
            && matches!(k.code, KeyCode::Key(Key::CTRL_Q | Key::CTRL_C))
    )
}

fn describe(event: &Event) -> String {
    let rec = EventRecord::from(*event);
    let what = match event {
        Event::Key(k) => match k.code {
            KeyCode::Char(ch) => format!("char {ch:?}"),
            KeyCode::Key(key) => format!("{key:?}"),
        },
        Event::Resize { width, height } => format!("resize {width}x{height}"),
        Event::Mouse(m) => format!("{:?} at {},{}", m.key, m.x, m.y),
    };
    format!(
        "{what:<24} type={} mod={:#04b} key={:#06x} rune={:#x}",
        u8::from(rec.kind),
        rec.modifiers,
        rec.key,
        rec.rune
    )
}

fn attach(session: &mut Session, source: Source) -> Result<()> {
    match session.init(source) {
        Err(err) if is_missing_terminal(&err) => {
            bail!("{err}: no terminal to attach to, pass --tty or --fd")
        }
        other => other.context("initializing terminal"),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log.clone())?;

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    let source = args.source()?;
    info!(?source, "rbox starting");

    let mut session = Session::with_config(config);
    attach(&mut session, source)?;

    let mut viewer = Viewer {
        session,
        events: VecDeque::new(),
    };
    let result = viewer.run();
    viewer.session.shutdown();
    info!("rbox exiting");
    result
}
