// Rebasing and extraction of position ranges
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of permlink.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Position ranges within program text.
//!
//! Compiled output carries position information alongside its text:
//!   statement boundaries (used to split a program into script chunks
//!   without breaking a statement in half) and per-type source ranges
//!   (used to build source maps).
//! Both are a sequence of [`Range`]s describing contiguous,
//!   non-overlapping `[start, end)` byte intervals with companion line
//!   numbers,
//!     in strictly ascending order.
//! A [`RangeMap`] is such a sequence together with the total byte and line
//!   length of the text it describes.
//! Statement ranges simply leave their line numbers at zero.
//!
//! Text is routinely concatenated and split apart again during a link,
//!   and its ranges must follow:
//!
//!   - [`RangeMapBuilder`] appends the ranges of successive chunks,
//!       rebasing each onto the end of everything appended before it; and
//!   - [`RangeMapExtractor`] does the reverse,
//!       pulling the sub-range for a window of the combined text and
//!       normalizing it to that window.
//!
//! Extraction windows must align with original range boundaries;
//!   a range is never split.
//! A range straddling a window boundary belongs to no window at all.

use std::collections::VecDeque;

/// A `[start, end)` byte interval and the lines it spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start: usize,
    pub end: usize,
    pub start_line: usize,
    pub end_line: usize,
}

impl Range {
    /// A range with no line information.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            start_line: 0,
            end_line: 0,
        }
    }

    /// A range with line information.
    pub fn with_lines(
        start: usize,
        end: usize,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            end_line,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Copy of this range moved forward by the given offsets.
    fn rebase(&self, bytes: usize, lines: usize) -> Self {
        Self {
            start: self.start + bytes,
            end: self.end + bytes,
            start_line: self.start_line + lines,
            end_line: self.end_line + lines,
        }
    }

    /// Copy of this range made relative to the given origin.
    ///
    /// Panics if the range begins before the origin.
    fn normalize(&self, bytes: usize, lines: usize) -> Self {
        assert!(
            self.start >= bytes && self.start_line >= lines,
            "range {:?} begins before its window (byte {}, line {})",
            self,
            bytes,
            lines,
        );

        Self {
            start: self.start - bytes,
            end: self.end - bytes,
            start_line: self.start_line - lines,
            end_line: self.end_line - lines,
        }
    }
}

/// Ranges within a body of text of known length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeMap {
    ranges: Vec<Range>,
    bytes: usize,
    lines: usize,
}

impl RangeMap {
    pub fn new(ranges: Vec<Range>, bytes: usize, lines: usize) -> Self {
        debug_assert!(
            ranges.windows(2).all(|w| w[0].end <= w[1].start),
            "ranges must be ascending and non-overlapping",
        );

        Self {
            ranges,
            bytes,
            lines,
        }
    }

    /// Ranges over `text`,
    ///   computing its byte and line length.
    pub fn for_text(text: &str, ranges: Vec<Range>) -> Self {
        Self::new(ranges, text.len(), count_lines(text))
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Byte length of the described text.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Number of line terminators in the described text.
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Number of line terminators (`\n`) in `text`.
pub fn count_lines(text: &str) -> usize {
    memchr::memchr_iter(b'\n', text.as_bytes()).count()
}

/// Combine the ranges of successively appended chunks of text.
///
/// Each appended range is shifted by the total byte and line length of
///   all chunks appended before it.
/// The totals then advance by the _full_ length of the chunk,
///   not the end of its last range,
///   so that gaps between or after ranges are preserved.
#[derive(Debug, Default)]
pub struct RangeMapBuilder {
    ranges: Vec<Range>,
    bytes: usize,
    lines: usize,
}

impl RangeMapBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Append the ranges of a chunk.
    pub fn append(&mut self, chunk: &RangeMap) -> &mut Self {
        let (bytes, lines) = (self.bytes, self.lines);

        self.ranges
            .extend(chunk.ranges.iter().map(|r| r.rebase(bytes, lines)));

        self.bytes += chunk.bytes;
        self.lines += chunk.lines;

        self
    }

    /// Append a chunk of text and its ranges,
    ///   measuring the text.
    pub fn append_text(&mut self, text: &str, ranges: &[Range]) -> &mut Self {
        self.append(&RangeMap::for_text(text, ranges.to_vec()))
    }

    /// Total byte length appended so far.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Total line length appended so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn build(self) -> RangeMap {
        RangeMap::new(self.ranges, self.bytes, self.lines)
    }
}

/// Extract the ranges of consecutive windows of a combined [`RangeMap`].
///
/// Windows must be requested in order;
///   the extractor only ever skips forward,
///   consuming ranges as it goes.
#[derive(Debug)]
pub struct RangeMapExtractor {
    remaining: VecDeque<Range>,
    last_end: usize,
}

impl RangeMapExtractor {
    pub fn new(map: RangeMap) -> Self {
        Self {
            remaining: map.ranges.into(),
            last_end: 0,
        }
    }

    /// Whether any ranges are left to extract.
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Extract the ranges lying within the window
    ///   `[type_start, type_end)` (lines `[line_start, line_end)`).
    ///
    /// Leading ranges that begin before `type_start` are discarded.
    /// Every following range that ends within the window is taken,
    ///   relative to the window's origin,
    ///   until a range that does not fit is encountered;
    ///     that range remains for a later window.
    ///
    /// Panics
    /// ======
    /// It is a contract violation to call this method with no ranges
    ///   remaining (see [`is_exhausted`](Self::is_exhausted)),
    ///   or with a `type_start` before the `type_end` of the previous call,
    ///   or with a `line_start` past the start line of a range that falls
    ///   within the window.
    /// Each indicates a bug in the caller.
    pub fn extract(
        &mut self,
        type_start: usize,
        type_end: usize,
        line_start: usize,
        line_end: usize,
    ) -> RangeMap {
        assert!(
            !self.remaining.is_empty(),
            "attempted to extract from exhausted ranges",
        );
        assert!(
            type_start >= self.last_end,
            "ranges may only be extracted moving forward \
             (window starts at {type_start}, previous ended at {})",
            self.last_end,
        );
        assert!(type_start <= type_end && line_start <= line_end);

        self.last_end = type_end;

        while matches!(self.remaining.front(), Some(r) if r.start < type_start)
        {
            self.remaining.pop_front();
        }

        let mut extracted = Vec::new();

        while let Some(range) = self.remaining.front() {
            if range.end > type_end {
                break;
            }

            extracted.push(range.normalize(type_start, line_start));
            self.remaining.pop_front();
        }

        RangeMap::new(extracted, type_end - type_start, line_end - line_start)
    }
}
