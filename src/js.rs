// JavaScript text utilities
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

//! JavaScript handled by the linker.
//!
//! The linker does not compile JavaScript,
//!   but it does generate some
//!     (the selection script and the wrappers around compiled programs),
//!   and it must check and optimize what it generates.
//! Optimization is delegated to a [`JsOptimizer`],
//!   which the host may replace with a full optimizing compiler;
//!     [`StandardOptimizer`] verifies that the script is well-formed
//!     and, for [`OutputMode::Obfuscated`], strips comments and
//!     indentation.

use std::error::Error;
use std::fmt::{self, Display};
use std::str::FromStr;

/// Style of generated JavaScript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// As small as possible.
    #[default]
    Obfuscated,

    /// Readable.
    Pretty,

    /// Readable,
    ///   with fully qualified names.
    Detailed,
}

impl OutputMode {
    /// Whether output should omit optional whitespace.
    pub fn is_compact(&self) -> bool {
        matches!(self, Self::Obfuscated)
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "obfuscated" | "obf" => Ok(Self::Obfuscated),
            "pretty" => Ok(Self::Pretty),
            "detailed" => Ok(Self::Detailed),
            _ => Err(format!("unknown output mode `{}`", s)),
        }
    }
}

impl Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Obfuscated => write!(f, "obfuscated"),
            Self::Pretty => write!(f, "pretty"),
            Self::Detailed => write!(f, "detailed"),
        }
    }
}

/// Transformation of generated JavaScript before it is emitted.
pub trait JsOptimizer: Send + Sync {
    /// Parse and optimize `js` for the given `mode`.
    ///
    /// An [`Err`] means that `js` is not a valid program.
    fn optimize(&self, js: &str, mode: OutputMode) -> Result<String, JsError>;
}

/// Structural check plus comment and whitespace removal.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardOptimizer;

impl JsOptimizer for StandardOptimizer {
    fn optimize(&self, js: &str, mode: OutputMode) -> Result<String, JsError> {
        let spans = scan(js)?;

        if !mode.is_compact() {
            return Ok(js.into());
        }

        Ok(compact(js, &spans))
    }
}

/// Byte spans found by [`scan`],
///   each in source order.
#[derive(Debug, Default, PartialEq, Eq)]
struct Spans {
    comments: Vec<(usize, usize)>,

    /// Template literals,
    ///   whose whitespace is part of their value.
    templates: Vec<(usize, usize)>,
}

/// Last significant token before the current position,
///   used to tell division from the start of a regex literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev<'a> {
    Punct(u8),
    Word(&'a str),
}

/// Keywords after which `/` begins a regular expression literal.
const REGEX_KEYWORDS: &[&str] = &[
    "await",
    "case",
    "delete",
    "do",
    "else",
    "in",
    "instanceof",
    "new",
    "of",
    "return",
    "throw",
    "typeof",
    "void",
    "yield",
];

/// Tokenize just enough of `js` to know where strings,
///   comments,
///   regular expressions,
///   and bracketed groups begin and end.
fn scan(js: &str) -> Result<Spans, JsError> {
    let bytes = js.as_bytes();
    let mut spans = Spans::default();
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut line = 1;
    let mut i = 0;
    let mut prev: Option<Prev> = None;

    while i < bytes.len() {
        let c = bytes[i];

        match c {
            b'\n' => line += 1,
            b' ' | b'\t' | b'\r' => {}

            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = js[i..].find('\n').map_or(js.len(), |n| i + n);
                spans.comments.push((i, end));
                i = end;
                continue;
            }

            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = js[i + 2..]
                    .find("*/")
                    .map(|n| i + 2 + n + 2)
                    .ok_or_else(|| JsError::new(line, "unterminated comment"))?;

                line += memchr::memchr_iter(b'\n', &bytes[i..end]).count();
                spans.comments.push((i, end));
                i = end;
                continue;
            }

            b'/' if starts_regex(prev) => {
                i = skip_regex(bytes, i, line)?;
                prev = Some(Prev::Punct(b'/'));
                continue;
            }

            b'\'' | b'"' | b'`' => {
                let (end, lines) = skip_string(bytes, i, line)?;

                if c == b'`' {
                    spans.templates.push((i, end));
                }

                line += lines;
                i = end;
                prev = Some(Prev::Punct(c));
                continue;
            }

            c if is_word_byte(c) => {
                let end = bytes[i..]
                    .iter()
                    .position(|&b| !is_word_byte(b))
                    .map_or(bytes.len(), |n| i + n);

                prev = Some(Prev::Word(&js[i..end]));
                i = end;
                continue;
            }

            b'(' | b'[' | b'{' => stack.push((c, line)),

            b')' | b']' | b'}' => {
                let open = match c {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };

                match stack.pop() {
                    Some((o, _)) if o == open => {}
                    _ => {
                        return Err(JsError::new(
                            line,
                            format!("unexpected `{}`", c as char),
                        ))
                    }
                }
            }

            _ => {}
        }

        if !c.is_ascii_whitespace() {
            prev = Some(Prev::Punct(c));
        }

        i += 1;
    }

    match stack.pop() {
        Some((open, open_line)) => Err(JsError::new(
            open_line,
            format!("unclosed `{}`", open as char),
        )),
        None => Ok(spans),
    }
}

/// Identifier, keyword, or numeric literal byte.
///
/// Non-ASCII bytes are treated as part of an identifier.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Whether a `/` following `prev` begins a regular expression literal.
fn starts_regex(prev: Option<Prev>) -> bool {
    match prev {
        None => true,
        Some(Prev::Word(word)) => REGEX_KEYWORDS.contains(&word),
        Some(Prev::Punct(c)) => b"(,=:[!&|?{};+-*%<>~^".contains(&c),
    }
}

/// Skip a string or template literal beginning at `start`,
///   returning the offset just past it and the number of newlines it
///   contained.
fn skip_string(
    bytes: &[u8],
    start: usize,
    line: usize,
) -> Result<(usize, usize), JsError> {
    let quote = bytes[start];
    let mut lines = 0;
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'\n' if quote != b'`' => break,
            b'\n' => lines += 1,
            c if c == quote => return Ok((i + 1, lines)),
            _ => {}
        }

        i += 1;
    }

    Err(JsError::new(line, "unterminated string literal"))
}

/// Skip a regular expression literal beginning at `start`.
fn skip_regex(bytes: &[u8], start: usize, line: usize) -> Result<usize, JsError> {
    let mut in_class = false;
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'\n' => break,
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => {
                i += 1;

                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }

                return Ok(i);
            }
            _ => {}
        }

        i += 1;
    }

    Err(JsError::new(line, "unterminated regular expression"))
}

/// Remove comments,
///   indentation,
///   and blank lines from `js`.
///
/// Line breaks are otherwise retained so that automatic semicolon
///   insertion is unaffected.
/// Template literals are copied through untouched.
fn compact(js: &str, spans: &Spans) -> String {
    let mut out = String::with_capacity(js.len());
    let mut code = String::new();
    let mut last = 0;

    let mut cuts: Vec<(usize, usize, bool)> = spans
        .comments
        .iter()
        .map(|&(start, end)| (start, end, false))
        .chain(spans.templates.iter().map(|&(start, end)| (start, end, true)))
        .collect();

    cuts.sort_unstable();

    for (start, end, template) in cuts {
        code.push_str(&js[last..start]);

        if template {
            push_trimmed(&mut out, &code, true);
            code.clear();
            out.push_str(&js[start..end]);
        } else if js[start..end].contains('\n') {
            // A multi-line comment may separate two statements.
            code.push('\n');
        }

        last = end;
    }

    code.push_str(&js[last..]);
    push_trimmed(&mut out, &code, false);

    out
}

/// Append the lines of `code` to `out` without indentation or blank
///   lines.
///
/// If `out` does not end a line,
///   `code` continues it.
/// If `more` is set,
///   the last line of `code` is left open for what follows.
fn push_trimmed(out: &mut String, code: &str, more: bool) {
    let continues = !out.is_empty() && !out.ends_with('\n');
    let lines: Vec<&str> = code.split('\n').collect();
    let last = lines.len() - 1;

    for (n, line) in lines.into_iter().enumerate() {
        let open_start = n == 0 && continues;
        let open_end = n == last && more;

        let line = match (open_start, open_end) {
            (true, true) => line,
            (true, false) => line.trim_end(),
            (false, true) => line.trim_start(),
            (false, false) => line.trim(),
        };

        if open_end {
            out.push_str(line);
        } else if !line.is_empty() || open_start {
            out.push_str(line);
            out.push('\n');
        }
    }
}

/// Generated JavaScript is not well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsError {
    /// One-based line number.
    pub line: usize,
    pub message: String,
}

impl JsError {
    pub fn new<S: Into<String>>(line: usize, message: S) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl Error for JsError {}

/// Text builder whose optional line breaks vanish in compact mode.
#[derive(Debug, Default)]
pub struct TextOutput {
    compact: bool,
    buf: String,
}

impl TextOutput {
    pub fn new(compact: bool) -> Self {
        Self {
            compact,
            buf: String::new(),
        }
    }

    pub fn print(&mut self, s: &str) -> &mut Self {
        self.buf.push_str(s);
        self
    }

    /// Line break omitted in compact mode.
    pub fn newline_opt(&mut self) -> &mut Self {
        if !self.compact {
            self.buf.push('\n');
        }
        self
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Quote `s` as a JavaScript string literal.
///
/// The quote character is whichever of `"` and `'` occurs less often in
///   `s`,
///     preferring `"`.
/// Characters that would terminate a `<script>` block or a line are
///   escaped.
pub fn string_literal(s: &str) -> String {
    let doubles = s.matches('"').count();
    let singles = s.matches('\'').count();
    let quote = if singles < doubles { '\'' } else { '"' };

    quoted(s, quote)
}

/// Quote `s` as a JavaScript string literal delimited by `quote`.
pub fn quoted(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);

    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            // Prevents `</script>` from ending an enclosing script block.
            '<' => out.push_str("\\x3C"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\x{:02X}", c as u32));
            }
            c => out.push(c),
        }
    }

    out.push(quote);
    out
}

#[cfg(test)]
mod test;
