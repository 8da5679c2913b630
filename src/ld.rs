// Permutation linker library
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

//! The linker is responsible for combining individually compiled
//!   permutations into a deployable module.
//!
//! Its user-facing binary is [`permld`][permld].
//!
//! [permld]: ../../permld
//!
//! Linking is performed by a stack of [`Linker`]s,
//!   orchestrated by a [`StandardLinkerContext`]:
//!
//!   1. Each distinct compiled program is linked on its own by every
//!        _shardable_ linker,
//!          which emits the files for that program alone;
//!   2. The results are gathered and passed through every linker in a
//!        final link,
//!          which produces the files describing the module as a whole
//!          (most notably the selection script);
//!   3. Every emitted file is written to its output directory.
//!
//! The order in which linkers run is governed by their [`LinkerOrder`].
//! Exactly one linker is [`LinkerOrder::Primary`];
//!   it is responsible for the module's overall output format and must be
//!   declared last.
//! See [`context`] for the precise ordering.
//!
//! The primary linker provided by this crate is
//!   [`CrossSiteIframeLinker`](xsiframe::CrossSiteIframeLinker),
//!     built atop the generic [`SelectionScriptLinker`](selection).

use crate::cache::CacheError;
use crate::js::JsError;
use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

pub mod context;
pub mod linker;
pub mod selection;
pub mod symbol_maps;
pub mod xsiframe;

pub use context::{LinkConfig, LinkerContext, OutputDirs, StandardLinkerContext};
pub use linker::{Linker, LinkerOrder, LinkerRegistration};

/// Failure to link a module.
///
/// There is no recovery from any of these errors;
///   the link is abandoned and nothing further is written.
#[derive(Debug)]
pub enum LinkError {
    /// A template resource could not be read.
    TemplateLoad { name: String, source: io::Error },

    /// Generated JavaScript is not well-formed.
    JsParse(JsError),

    /// A linker failed.
    ///
    /// The artifact set produced by the linker,
    ///   if any,
    ///   is discarded.
    Linker {
        linker: &'static str,
        source: Box<LinkError>,
    },

    /// Two artifacts resolved to the same output path,
    ///   or the path existed before the link began.
    OutputCollision(PathBuf),

    /// A linker was asked to perform an operation it does not implement.
    Unsupported {
        linker: &'static str,
        operation: &'static str,
    },

    /// The linker stack is not ordered correctly.
    InvalidLinkerOrder(String),

    /// A property required to generate selection logic is not in the
    ///   catalog.
    MissingProperty(String),

    /// Compiled program text could not be retrieved.
    Cache(CacheError),

    /// Output could not be written.
    Io(io::Error),

    /// A linker does not support external script references.
    ScriptTagsUnsupported { linker: &'static str, src: String },
}

impl From<JsError> for LinkError {
    fn from(e: JsError) -> Self {
        Self::JsParse(e)
    }
}

impl From<CacheError> for LinkError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e)
    }
}

impl From<io::Error> for LinkError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl Display for LinkError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TemplateLoad { name, .. } => {
                write!(fmt, "unable to load template `{}`", name)
            }
            Self::JsParse(e) => {
                write!(fmt, "generated JavaScript failed to parse: {}", e)
            }
            Self::Linker { linker, .. } => {
                write!(fmt, "linker `{}` failed", linker)
            }
            Self::OutputCollision(path) => write!(
                fmt,
                "output file `{}` already exists \
                 (this may be a linker bug!)",
                path.display(),
            ),
            Self::Unsupported { linker, operation } => write!(
                fmt,
                "linker `{}` does not support {}",
                linker, operation,
            ),
            Self::InvalidLinkerOrder(msg) => {
                write!(fmt, "invalid linker order: {}", msg)
            }
            Self::MissingProperty(name) => {
                write!(
                    fmt,
                    "selection property `{}` is unknown or has no value \
                     for some permutation",
                    name
                )
            }
            Self::Cache(e) => e.fmt(fmt),
            Self::Io(e) => e.fmt(fmt),
            Self::ScriptTagsUnsupported { linker, src } => write!(
                fmt,
                "linker `{}` does not support <script> references \
                 (found `{}`); set `xsiframe.failIfScriptTag` to `false` \
                 to ignore them",
                linker, src,
            ),
        }
    }
}

impl Error for LinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TemplateLoad { source, .. } => Some(source),
            Self::Linker { source, .. } => Some(source.as_ref()),
            Self::Cache(e) => e.source(),
            Self::Io(e) => e.source(),
            _ => None,
        }
    }
}
