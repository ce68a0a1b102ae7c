// SPDX-License-Identifier: MIT
//
// Damage: which cells changed since the last present.
//
// One optional dirty column range per row. A range only ever grows until
// the renderer clears it, so marking is O(1) and the renderer walks at most
// `height` ranges. Ranges are coarse: a row with changes at column 2 and
// column 70 is dirty from 2 to 70, and the renderer skips the unchanged
// cells in between by comparing against the front buffer.
//
// `all` short-circuits everything: after a resize, an output-mode change or
// a failed write, the whole grid is redrawn regardless of per-row ranges.

// ─── Span ────────────────────────────────────────────────────────────────────

/// An inclusive column range on one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First dirty column.
    pub start: u16,
    /// Last dirty column (inclusive).
    pub end: u16,
}

impl Span {
    #[inline]
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A single column.
    #[inline]
    #[must_use]
    pub const fn at(x: u16) -> Self {
        Self { start: x, end: x }
    }

    /// Smallest span covering both.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            start: if self.start < other.start { self.start } else { other.start },
            end: if self.end > other.end { self.end } else { other.end },
        }
    }
}

// ─── Damage ──────────────────────────────────────────────────────────────────

/// Per-row dirty ranges plus a mark-all flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Damage {
    width: u16,
    rows: Vec<Option<Span>>,
    all: bool,
}

impl Damage {
    /// A tracker for a `width × height` grid, starting fully dirty so the
    /// first present paints everything.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            rows: vec![None; usize::from(height)],
            all: true,
        }
    }

    /// Mark a span of row `y` dirty. Coordinates past the grid are clamped
    /// away silently; the buffer is responsible for bounds errors.
    pub fn mark(&mut self, y: u16, span: Span) {
        if self.width == 0 || span.start >= self.width {
            return;
        }
        let span = Span::new(span.start, span.end.min(self.width - 1));
        if let Some(row) = self.rows.get_mut(usize::from(y)) {
            *row = Some(row.map_or(span, |cur| cur.union(span)));
        }
    }

    /// Mark every row dirty and force a full redraw.
    pub const fn mark_all(&mut self) {
        self.all = true;
    }

    /// Whether a full redraw is pending.
    #[inline]
    #[must_use]
    pub const fn is_all(&self) -> bool {
        self.all
    }

    /// Reset to new dimensions. The tracker becomes fully dirty.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.rows.clear();
        self.rows.resize(usize::from(height), None);
        self.all = true;
    }

    /// Forget all damage (after a successful present).
    pub fn clear(&mut self) {
        self.rows.fill(None);
        self.all = false;
    }

    /// No cell needs repainting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.all && self.rows.iter().all(Option::is_none)
    }

    /// Dirty span of one row. Under mark-all every row spans the full width.
    #[must_use]
    pub fn row(&self, y: u16) -> Option<Span> {
        if self.all {
            return (self.width > 0 && usize::from(y) < self.rows.len())
                .then(|| Span::new(0, self.width - 1));
        }
        self.rows.get(usize::from(y)).copied().flatten()
    }

    /// Dirty rows in top-to-bottom order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, Span)> + '_ {
        // Row count came from a u16 height.
        #[allow(clippy::cast_possible_truncation)]
        (0..self.rows.len() as u16).filter_map(|y| self.row(y).map(|span| (y, span)))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
