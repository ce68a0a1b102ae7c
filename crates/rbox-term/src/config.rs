// SPDX-License-Identifier: MIT
//
// Session configuration, loaded from TOML.
//
// ```toml
// # "normal", "256", "216" or "grayscale"
// output_mode = "256"
// # How long a lone ESC waits for the rest of a sequence.
// escape_delay_ms = 25
// # Run inside the alternate screen and restore the shell on exit.
// alternate_screen = true
// # Bytes requested per terminal read.
// read_chunk = 1024
//
// [input_mode]
// escape = "esc"   # or "alt"
// mouse = false
// ```
//
// Every key is optional; missing ones take the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::{InputMode, OutputMode};

/// Engine settings applied when a session is initialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Escape policy and mouse reporting.
    pub input_mode: InputMode,
    /// Color mapping for SGR output.
    pub output_mode: OutputMode,
    /// Escape delay in milliseconds.
    pub escape_delay_ms: u64,
    /// Enter the alternate screen on init.
    pub alternate_screen: bool,
    /// Read buffer size in bytes. Must be non-zero.
    pub read_chunk: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_mode: InputMode::default(),
            output_mode: OutputMode::default(),
            escape_delay_ms: 25,
            alternate_screen: true,
            read_chunk: 1024,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the document does not parse or a value
    /// is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::invalid("config", e.message().to_owned()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io("reading config", e))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "loaded config");
        tracing::debug!(?config, "config");
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a zero `read_chunk`.
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk == 0 {
            return Err(Error::invalid("config", "read_chunk must be at least 1"));
        }
        Ok(())
    }

    #[must_use]
    pub const fn escape_delay(&self) -> Duration {
        Duration::from_millis(self.escape_delay_ms)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::EscapeMode;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.escape_delay(), Duration::from_millis(25));
        assert_eq!(c.output_mode, OutputMode::Normal);
        assert_eq!(c.input_mode, InputMode::new(EscapeMode::Esc, false));
        assert!(c.alternate_screen);
        assert_eq!(c.read_chunk, 1024);
    }

    #[test]
    fn full_document() {
        let c = Config::from_toml_str(
            r#"
            output_mode = "grayscale"
            escape_delay_ms = 50
            alternate_screen = false
            read_chunk = 64

            [input_mode]
            escape = "alt"
            mouse = true
            "#,
        )
        .unwrap();
        assert_eq!(
            c,
            Config {
                input_mode: InputMode::new(EscapeMode::Alt, true),
                output_mode: OutputMode::Grayscale,
                escape_delay_ms: 50,
                alternate_screen: false,
                read_chunk: 64,
            }
        );
    }

    #[test]
    fn partial_input_mode_keeps_other_field() {
        let c = Config::from_toml_str("[input_mode]\nmouse = true\n").unwrap();
        assert_eq!(c.input_mode, InputMode::new(EscapeMode::Esc, true));
    }

    #[test]
    fn numeric_output_mode_names() {
        let c = Config::from_toml_str(r#"output_mode = "216""#).unwrap();
        assert_eq!(c.output_mode, OutputMode::Palette216);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = Config::from_toml_str("colour = 3").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { what: "config", .. }));
    }

    #[test]
    fn bad_value_is_rejected() {
        let err = Config::from_toml_str(r#"output_mode = "truecolor""#).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { what: "config", .. }));
    }

    #[test]
    fn zero_read_chunk_is_rejected() {
        let err = Config::from_toml_str("read_chunk = 0").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { what: "config", .. }));
    }

    #[test]
    fn load_missing_file_is_io() {
        let err = Config::load("/nonexistent/rbox/config.toml").unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn load_from_disk() {
        let path = std::env::temp_dir().join(format!("rbox-config-{}.toml", std::process::id()));
        std::fs::write(&path, "escape_delay_ms = 10\n").unwrap();
        let c = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(c.escape_delay_ms, 10);
    }
}
