// SPDX-License-Identifier: MIT
//
// CellBuffer: the 2D cell grid the application writes into.
//
// A session owns two of these: the back buffer that `set_cell`, `print`
// and `clear` mutate, and the front buffer inside the renderer holding
// what the terminal is believed to show. Presenting diffs one against the
// other.
//
// Design:
//
//   - Flat `Vec<Cell>` with row-major indexing. A row's cells are
//     contiguous, so the renderer's left-to-right walk is a linear scan.
//
//   - Writes are bounds-checked and fail with `OutOfBounds` rather than
//     being silently dropped. Callers that want clipping use `print`,
//     which clips at the right edge.
//
//   - Wide characters occupy two columns: the glyph, then a continuation
//     cell (ch = 0). Overwriting either half breaks the pair and the other
//     half becomes a blank. Every mutating method reports the column span
//     it touched so the caller can record damage for exactly those cells.

use unicode_width::UnicodeWidthChar;

use crate::cell::{Attribute, Cell};
use crate::damage::Span;
use crate::error::{Error, Result};

// ─── CellBuffer ──────────────────────────────────────────────────────────────

/// A `width × height` grid of cells.
///
/// # Examples
///
/// ```
/// use rbox_term::buffer::CellBuffer;
/// use rbox_term::cell::Attribute;
///
/// let mut buf = CellBuffer::new(80, 24);
/// buf.put_cell(5, 3, 'X', Attribute::DEFAULT, Attribute::DEFAULT).unwrap();
/// assert_eq!(buf.get(5, 3).unwrap().character(), Some('X'));
/// assert!(buf.put_cell(80, 0, 'X', Attribute::DEFAULT, Attribute::DEFAULT).is_err());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CellBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl CellBuffer {
    // ─── Construction ────────────────────────────────────────────────────

    /// A buffer filled with empty cells.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let size = usize::from(width) * usize::from(height);
        Self {
            width,
            height,
            cells: vec![Cell::EMPTY; size],
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Whether `(x, y)` is within the buffer.
    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    const fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Bounds check producing the caller-facing error.
    #[inline]
    pub fn check(&self, x: u16, y: u16) -> Result<()> {
        if self.in_bounds(x, y) {
            Ok(())
        } else {
            Err(Error::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Cell at `(x, y)`, or `None` if out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// All cells, row-major.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// One row as a slice.
    #[inline]
    #[must_use]
    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            Some(&self.cells[start..start + usize::from(self.width)])
        } else {
            None
        }
    }

    // ─── Clear & Resize ──────────────────────────────────────────────────

    /// Reset every cell to [`Cell::EMPTY`] without reporting changes.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::EMPTY);
    }

    /// Set every cell to `cell`, calling `on_change(y, span)` once per row
    /// whose contents actually changed.
    pub fn fill(&mut self, cell: Cell, mut on_change: impl FnMut(u16, Span)) {
        let w = usize::from(self.width);
        if w == 0 {
            return;
        }
        for (y, row) in self.cells.chunks_exact_mut(w).enumerate() {
            let mut changed: Option<Span> = None;
            for (x, slot) in row.iter_mut().enumerate() {
                if *slot != cell {
                    *slot = cell;
                    // x < width and y < height, both u16.
                    #[allow(clippy::cast_possible_truncation)]
                    let at = Span::at(x as u16);
                    changed = Some(changed.map_or(at, |s| s.union(at)));
                }
            }
            if let Some(span) = changed {
                #[allow(clippy::cast_possible_truncation)]
                on_change(y as u16, span);
            }
        }
    }

    /// Resize, discarding all content.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let size = usize::from(width) * usize::from(height);
        self.cells.clear();
        self.cells.resize(size, Cell::EMPTY);
    }

    // ─── Wide Character Cleanup ──────────────────────────────────────────

    /// Break any wide pair touching `(x, y)`; the surviving half becomes a
    /// blank with its own attributes. Returns the span that changed,
    /// always including `x` itself.
    fn break_pair_at(&mut self, x: u16, y: u16) -> Span {
        let mut span = Span::at(x);
        let idx = self.index(x, y);

        if self.cells[idx].is_continuation() && x > 0 {
            let lead = &mut self.cells[idx - 1];
            *lead = Cell::blank(lead.fg, lead.bg);
            span = span.union(Span::at(x - 1));
        }

        if x + 1 < self.width {
            let next = &mut self.cells[idx + 1];
            if next.is_continuation() {
                *next = Cell::blank(next.fg, next.bg);
                span = span.union(Span::at(x + 1));
            }
        }

        span
    }

    // ─── Writes ──────────────────────────────────────────────────────────

    /// Write one rune at `(x, y)`.
    ///
    /// A wide rune also fills `x + 1` with a continuation cell. At the last
    /// column there is no room for it, so a blank with the same attributes
    /// is written instead.
    ///
    /// Returns the span of columns on row `y` that changed.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] if `(x, y)` is outside the grid,
    /// [`Error::InvalidArgument`] for control or zero-width runes.
    pub fn put_cell(&mut self, x: u16, y: u16, ch: char, fg: Attribute, bg: Attribute) -> Result<Span> {
        self.check(x, y)?;
        let wide = match ch.width() {
            Some(1) => false,
            Some(2) => true,
            _ => {
                return Err(Error::invalid(
                    "rune",
                    format!("{:#x} does not occupy a column", ch as u32),
                ));
            }
        };

        let mut span = self.break_pair_at(x, y);
        let idx = self.index(x, y);

        if !wide {
            self.cells[idx] = Cell::new(ch, fg, bg);
            return Ok(span);
        }
        if x + 1 >= self.width {
            self.cells[idx] = Cell::blank(fg, bg);
            return Ok(span);
        }

        span = span.union(self.break_pair_at(x + 1, y));
        self.cells[idx] = Cell::new(ch, fg, bg);
        self.cells[idx + 1] = Cell::continuation(fg, bg);
        Ok(span)
    }

    /// Write `text` left to right starting at `(x, y)`.
    ///
    /// No wrapping: runes past the right edge are dropped. Zero-width and
    /// control runes are skipped. Returns the number of columns written and
    /// the span that changed (`None` if nothing was written).
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] if the start position is outside the grid.
    pub fn print(
        &mut self,
        x: u16,
        y: u16,
        fg: Attribute,
        bg: Attribute,
        text: &str,
    ) -> Result<(u16, Option<Span>)> {
        self.check(x, y)?;
        let mut col = x;
        let mut dirty: Option<Span> = None;

        for ch in text.chars() {
            if col >= self.width {
                break;
            }
            let w = char_width(ch);
            if w == 0 {
                continue;
            }
            let span = self.put_cell(col, y, ch, fg, bg)?;
            dirty = Some(dirty.map_or(span, |d| d.union(span)));
            // w is 1 or 2.
            #[allow(clippy::cast_possible_truncation)]
            let step = w as u16;
            col = col.saturating_add(step);
        }

        Ok((col.min(self.width) - x, dirty))
    }
}

impl std::fmt::Debug for CellBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CellBuffer({}x{})", self.width, self.height)
    }
}

// ─── Text Width Utilities ────────────────────────────────────────────────────

/// Display width of a character in terminal columns: 0 for control and
/// combining characters, 2 for wide ones, 1 otherwise.
///
/// ```
/// use rbox_term::buffer::char_width;
///
/// assert_eq!(char_width('a'), 1);
/// assert_eq!(char_width('中'), 2);
/// assert_eq!(char_width('\n'), 0);
/// ```
#[inline]
#[must_use]
pub fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Color, Style};
    use pretty_assertions::assert_eq;

    const D: Attribute = Attribute::DEFAULT;

    fn text_of(buf: &CellBuffer, y: u16) -> String {
        buf.row(y)
            .unwrap()
            .iter()
            .map(|c| c.character().unwrap_or('·'))
            .collect()
    }

    // ── Construction ────────────────────────────────────────────────────

    #[test]
    fn new_cells_are_empty() {
        let buf = CellBuffer::new(10, 5);
        assert_eq!(buf.cells().len(), 50);
        assert!(buf.cells().iter().all(|c| c.is_empty()));
    }

    #[test]
    fn zero_size_buffer() {
        let buf = CellBuffer::new(0, 0);
        assert!(buf.cells().is_empty());
        assert!(buf.get(0, 0).is_none());
    }

    // ── Bounds ──────────────────────────────────────────────────────────

    #[test]
    fn in_bounds_edges() {
        let buf = CellBuffer::new(80, 24);
        assert!(buf.in_bounds(79, 23));
        assert!(!buf.in_bounds(80, 0));
        assert!(!buf.in_bounds(0, 24));
    }

    #[test]
    fn put_cell_out_of_bounds_fails() {
        let mut buf = CellBuffer::new(4, 2);
        let err = buf.put_cell(4, 0, 'x', D, D).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfBounds {
                x: 4,
                y: 0,
                width: 4,
                height: 2
            }
        ));
        assert!(buf.put_cell(0, 2, 'x', D, D).is_err());
    }

    #[test]
    fn put_cell_rejects_control_and_combining() {
        let mut buf = CellBuffer::new(4, 1);
        assert!(matches!(
            buf.put_cell(0, 0, '\n', D, D),
            Err(Error::InvalidArgument { what: "rune", .. })
        ));
        assert!(buf.put_cell(0, 0, '\u{0301}', D, D).is_err());
    }

    // ── put_cell ────────────────────────────────────────────────────────

    #[test]
    fn put_cell_stores_rune_and_attributes() {
        let mut buf = CellBuffer::new(10, 3);
        let fg = Attribute::new(Color::RED, Style::BOLD);
        let bg = Attribute::from(Color::BLUE);
        let span = buf.put_cell(2, 1, 'A', fg, bg).unwrap();
        assert_eq!(span, Span::at(2));
        assert_eq!(*buf.get(2, 1).unwrap(), Cell::new('A', fg, bg));
    }

    #[test]
    fn wide_rune_takes_two_cells() {
        let mut buf = CellBuffer::new(10, 1);
        let span = buf.put_cell(3, 0, '中', D, D).unwrap();
        assert_eq!(span, Span::at(3));
        assert_eq!(buf.get(3, 0).unwrap().character(), Some('中'));
        assert!(buf.get(4, 0).unwrap().is_continuation());
    }

    #[test]
    fn wide_rune_at_last_column_is_clipped() {
        let mut buf = CellBuffer::new(5, 1);
        let bg = Attribute::from(Color::GREEN);
        let span = buf.put_cell(4, 0, '中', D, bg).unwrap();
        assert_eq!(span, Span::at(4));
        assert_eq!(*buf.get(4, 0).unwrap(), Cell::blank(D, bg));
    }

    #[test]
    fn overwriting_continuation_breaks_lead() {
        let mut buf = CellBuffer::new(10, 1);
        buf.put_cell(2, 0, '中', D, D).unwrap();
        let span = buf.put_cell(3, 0, 'x', D, D).unwrap();
        assert_eq!(span, Span::new(2, 3));
        assert_eq!(text_of(&buf, 0), "   x      ");
    }

    #[test]
    fn overwriting_lead_clears_continuation() {
        let mut buf = CellBuffer::new(10, 1);
        buf.put_cell(2, 0, '中', D, D).unwrap();
        let span = buf.put_cell(2, 0, 'x', D, D).unwrap();
        assert_eq!(span, Span::new(2, 3));
        assert_eq!(text_of(&buf, 0), "  x       ");
    }

    #[test]
    fn wide_over_offset_wide_breaks_both() {
        let mut buf = CellBuffer::new(10, 1);
        buf.put_cell(0, 0, '中', D, D).unwrap();
        buf.put_cell(2, 0, '文', D, D).unwrap();
        // Lands on the continuation of the first and the lead of the second.
        let span = buf.put_cell(1, 0, '字', D, D).unwrap();
        assert_eq!(span, Span::new(0, 3));
        assert_eq!(text_of(&buf, 0), " 字·       ");
    }

    // ── print ───────────────────────────────────────────────────────────

    #[test]
    fn print_ascii() {
        let mut buf = CellBuffer::new(10, 1);
        let (cols, span) = buf.print(1, 0, D, D, "Hello").unwrap();
        assert_eq!(cols, 5);
        assert_eq!(span, Some(Span::new(1, 5)));
        assert_eq!(text_of(&buf, 0), " Hello    ");
    }

    #[test]
    fn print_clips_at_right_edge() {
        let mut buf = CellBuffer::new(5, 1);
        let (cols, _) = buf.print(2, 0, D, D, "abcdef").unwrap();
        assert_eq!(cols, 3);
        assert_eq!(text_of(&buf, 0), "  abc");
    }

    #[test]
    fn print_wide_clipped_at_edge_counts_one_column() {
        let mut buf = CellBuffer::new(4, 1);
        let (cols, _) = buf.print(0, 0, D, D, "ab中").unwrap();
        assert_eq!(cols, 4);
        assert_eq!(text_of(&buf, 0), "ab中·");

        let mut buf = CellBuffer::new(3, 1);
        let (cols, _) = buf.print(0, 0, D, D, "ab中").unwrap();
        assert_eq!(cols, 3);
        assert_eq!(text_of(&buf, 0), "ab ");
    }

    #[test]
    fn print_skips_zero_width() {
        let mut buf = CellBuffer::new(6, 1);
        let (cols, _) = buf.print(0, 0, D, D, "e\u{0301}x\ty").unwrap();
        assert_eq!(cols, 3);
        assert_eq!(text_of(&buf, 0), "exy   ");
    }

    #[test]
    fn print_outside_fails() {
        let mut buf = CellBuffer::new(5, 2);
        assert!(buf.print(5, 0, D, D, "x").is_err());
        assert!(buf.print(0, 2, D, D, "x").is_err());
    }

    #[test]
    fn print_empty_text() {
        let mut buf = CellBuffer::new(5, 1);
        assert_eq!(buf.print(0, 0, D, D, "").unwrap(), (0, None));
    }

    // ── fill / resize ───────────────────────────────────────────────────

    #[test]
    fn fill_reports_only_changed_rows() {
        let mut buf = CellBuffer::new(6, 3);
        buf.put_cell(1, 0, 'a', D, D).unwrap();
        buf.put_cell(4, 0, 'b', D, D).unwrap();
        buf.put_cell(2, 2, 'c', D, D).unwrap();

        let mut seen = Vec::new();
        buf.fill(Cell::EMPTY, |y, span| seen.push((y, span)));
        assert_eq!(seen, vec![(0, Span::new(1, 4)), (2, Span::at(2))]);
        assert!(buf.cells().iter().all(|c| c.is_empty()));
    }

    #[test]
    fn fill_with_attributes_touches_every_row() {
        let mut buf = CellBuffer::new(2, 2);
        let blank = Cell::blank(D, Color::BLUE.into());
        let mut rows = 0;
        buf.fill(blank, |_, span| {
            assert_eq!(span, Span::new(0, 1));
            rows += 1;
        });
        assert_eq!(rows, 2);
    }

    #[test]
    fn resize_discards_content() {
        let mut buf = CellBuffer::new(10, 5);
        buf.put_cell(0, 0, 'X', D, D).unwrap();
        buf.resize(20, 10);
        assert_eq!((buf.width(), buf.height()), (20, 10));
        assert_eq!(buf.cells().len(), 200);
        assert!(buf.get(0, 0).unwrap().is_empty());
    }

    // ── Width utilities ─────────────────────────────────────────────────

    #[test]
    fn char_width_mixed() {
        let widths: Vec<usize> = "a中\u{0301}".chars().map(char_width).collect();
        assert_eq!(widths, vec![1, 2, 0]);
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", CellBuffer::new(80, 24)), "CellBuffer(80x24)");
    }
}
