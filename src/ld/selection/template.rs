// Selection script templates
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

//! Selection script templates with named insertion points.
//!
//! A template is ordinary JavaScript containing marker comments,
//!   one per [`Slot`].
//! Generated code is inserted immediately before the marker,
//!   which itself is retained;
//!     code inserted into the same slot appears in insertion order.
//! A template need not contain every marker;
//!   insertions into a missing slot are discarded.
//!
//! Literal tokens such as `__MODULE_FUNC__` are substituted throughout
//!   the template
//!     (including inserted code)
//!   when it is [rendered](Template::render).

use memchr::memmem;

/// Insertion point within a [`Template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// External stylesheet injectors.
    Styles,

    /// External script injectors.
    Scripts,

    /// Property providers and possible values.
    Properties,

    /// Permutation selection logic.
    Permutations,
}

impl Slot {
    pub const ALL: [Slot; 4] =
        [Self::Styles, Self::Scripts, Self::Properties, Self::Permutations];

    /// Comment marking this slot in template text.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Styles => "// __MODULE_STYLES_END__",
            Self::Scripts => "// __MODULE_SCRIPTS_END__",
            Self::Properties => "// __PROPERTIES_END__",
            Self::Permutations => "// __PERMUTATIONS_END__",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Slot, String),
}

/// Template text split at its insertion points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Locate the first occurrence of each slot marker in `text`.
    pub fn parse(text: &str) -> Self {
        let mut found: Vec<(usize, Slot)> = Slot::ALL
            .iter()
            .filter_map(|slot| {
                memmem::find(text.as_bytes(), slot.marker().as_bytes())
                    .map(|pos| (pos, *slot))
            })
            .collect();

        found.sort_by_key(|(pos, _)| *pos);

        let mut segments = Vec::with_capacity(found.len() * 2 + 1);
        let mut last = 0;

        for (pos, slot) in found {
            segments.push(Segment::Text(text[last..pos].into()));
            segments.push(Segment::Slot(slot, String::new()));
            last = pos;
        }

        segments.push(Segment::Text(text[last..].into()));

        Self { segments }
    }

    pub fn has_slot(&self, slot: Slot) -> bool {
        self.segments
            .iter()
            .any(|seg| matches!(seg, Segment::Slot(s, _) if *s == slot))
    }

    /// Append `code` to `slot`,
    ///   after anything previously inserted there.
    ///
    /// Returns `false` without modifying the template if the template
    ///   lacks `slot`.
    pub fn insert(&mut self, slot: Slot, code: &str) -> bool {
        for seg in &mut self.segments {
            if let Segment::Slot(s, buf) = seg {
                if *s == slot {
                    buf.push_str(code);
                    return true;
                }
            }
        }

        false
    }

    /// Concatenate all segments,
    ///   replacing every occurrence of each token with its value in
    ///   order.
    pub fn render<S: AsRef<str>>(&self, tokens: &[(&str, S)]) -> String {
        let mut out = String::new();

        for seg in &self.segments {
            match seg {
                Segment::Text(text) | Segment::Slot(_, text) => {
                    out.push_str(text)
                }
            }
        }

        for (token, value) in tokens {
            if memmem::find(out.as_bytes(), token.as_bytes()).is_some() {
                out = out.replace(token, value.as_ref());
            }
        }

        out
    }
}
