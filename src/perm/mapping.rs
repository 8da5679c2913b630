// Serialized permutation mappings
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

//! Plain-text permutation mappings.
//!
//! Browsers select a permutation with the generated selection script,
//!   but a server may wish to make the same decision itself
//!     (for example,
//!        to inline the right program into the host page).
//! For those consumers the linker writes the [`PermutationsMap`] in a
//!   simple line-oriented form;
//!     see [`PermutationsMap::serialize`].

use super::PermutationsMap;
use crate::property::PropertyMap;
use std::error::Error;
use std::fmt::{self, Display};

/// File name suffix of compiled programs in the mapping.
const PROGRAM_EXTENSION: &str = ".cache.js";

pub(super) fn serialize(map: &PermutationsMap) -> String {
    let mut out = String::new();

    for (key, maps) in map {
        for props in maps {
            out.push_str(&format!(
                "{}{}\n",
                key.strong_name(),
                PROGRAM_EXTENSION
            ));

            for (name, value) in props {
                out.push_str(&format!("{} {}\n", name, value));
            }

            out.push('\n');
        }
    }

    out
}

/// One block of a serialized mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub file: String,
    pub properties: PropertyMap,
}

/// A parsed mapping file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesMappingFile {
    entries: Vec<MappingEntry>,
}

impl PropertiesMappingFile {
    /// Parse the output of [`PermutationsMap::serialize`].
    ///
    /// Lines that do not belong to a block
    ///   (such as trailing annotations appended by some linkers)
    ///   are ignored only if they contain no space;
    ///     a `name value` line outside of a block is an error.
    pub fn parse(text: &str) -> Result<Self, MappingError> {
        let mut entries = Vec::new();
        let mut current: Option<MappingEntry> = None;

        for (i, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');

            if line.is_empty() {
                entries.extend(current.take());
                continue;
            }

            let pair = line.split_once(' ');

            if let Some(entry) = current.as_mut() {
                let (name, value) =
                    pair.ok_or(MappingError::MalformedProperty(i + 1))?;

                entry.properties.insert(name.into(), value.into());
            } else if pair.is_some() {
                return Err(MappingError::OrphanProperty(i + 1));
            } else if line.ends_with(PROGRAM_EXTENSION) {
                current = Some(MappingEntry {
                    file: line.into(),
                    properties: PropertyMap::new(),
                });
            }
        }

        entries.extend(current);

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// File of the first entry whose every property matches `props`.
    pub fn select(&self, props: &PropertyMap) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| {
                entry
                    .properties
                    .iter()
                    .all(|(name, value)| props.get(name) == Some(value))
            })
            .map(|entry| entry.file.as_str())
    }
}

/// Malformed mapping file.
///
/// Each variant carries the one-based line number of the problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// A `name value` line appeared before any program file line.
    OrphanProperty(usize),

    /// A line within a block is not of the form `name value`.
    MalformedProperty(usize),
}

impl Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OrphanProperty(line) => {
                write!(f, "line {}: property outside of a mapping block", line)
            }
            Self::MalformedProperty(line) => {
                write!(f, "line {}: expected `name value`", line)
            }
        }
    }
}

impl Error for MappingError {}
