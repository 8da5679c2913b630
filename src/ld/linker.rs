// Linker extensions
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

//! Linker extensions and their registration.

use super::symbol_maps::SymbolMapsLinker;
use super::xsiframe::CrossSiteIframeLinker;
use super::{LinkError, LinkerContext};
use crate::artifact::ArtifactSet;
use std::fmt::{self, Debug, Display};

/// Phase in which a [`Linker`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkerOrder {
    /// Before the primary linker,
    ///   in declaration order.
    Pre,

    /// The linker determining the module's output format.
    Primary,

    /// After the primary linker,
    ///   in reverse declaration order.
    Post,
}

impl LinkerOrder {
    /// Whether linkers of this order run while the linker stack is
    ///   being built,
    ///     rather than as it is unwound.
    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Pre | Self::Primary)
    }
}

impl Display for LinkerOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Primary => write!(f, "primary"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// A step of the link.
///
/// A linker is given a shared reference to the current artifacts and
///   returns the complete set of artifacts that should replace them.
/// It cannot modify its input;
///   to add to it,
///     clone the set
///       (which is cheap; see [`ArtifactSet`])
///     and return the modified clone.
pub trait Linker: Debug {
    /// Name identifying this linker in the manifest and in output paths
    ///   of its private artifacts.
    fn name(&self) -> &'static str;

    /// Human-readable description for diagnostics.
    fn description(&self) -> &'static str;

    /// Phase in which this linker runs.
    fn order(&self) -> LinkerOrder;

    /// Whether this linker can link each permutation independently via
    ///   [`link_permutation`](Linker::link_permutation).
    fn is_shardable(&self) -> bool {
        false
    }

    /// Link the module as a whole.
    fn link(
        &self,
        ctx: &LinkerContext,
        artifacts: &ArtifactSet,
    ) -> Result<ArtifactSet, LinkError>;

    /// Link artifacts belonging to a single permutation.
    ///
    /// Called only on shardable linkers.
    fn link_permutation(
        &self,
        _ctx: &LinkerContext,
        _artifacts: &ArtifactSet,
    ) -> Result<ArtifactSet, LinkError> {
        Err(LinkError::Unsupported {
            linker: self.name(),
            operation: "per-permutation linking",
        })
    }
}

/// A linker and the phase in which it runs.
///
/// The phase is normally that declared by the linker itself,
///   but may be overridden by the host.
#[derive(Debug)]
pub struct LinkerRegistration {
    linker: Box<dyn Linker>,
    order: LinkerOrder,
}

impl LinkerRegistration {
    pub fn new(linker: Box<dyn Linker>) -> Self {
        let order = linker.order();
        Self { linker, order }
    }

    pub fn with_order(linker: Box<dyn Linker>, order: LinkerOrder) -> Self {
        Self { linker, order }
    }

    /// Run the registered linker in `order` rather than its declared
    ///   phase.
    pub fn reorder(mut self, order: LinkerOrder) -> Self {
        self.order = order;
        self
    }

    /// The built-in linker registered under `name`,
    ///   if any.
    pub fn builtin(name: &str) -> Option<Self> {
        let linker: Box<dyn Linker> = match name {
            CrossSiteIframeLinker::NAME => Box::new(CrossSiteIframeLinker::new()),
            SymbolMapsLinker::NAME => Box::new(SymbolMapsLinker),
            _ => return None,
        };

        Some(Self::new(linker))
    }

    pub fn linker(&self) -> &dyn Linker {
        self.linker.as_ref()
    }

    pub fn order(&self) -> LinkerOrder {
        self.order
    }
}

/// Names of all linkers available via [`LinkerRegistration::builtin`].
pub const BUILTIN_LINKERS: &[&str] =
    &[CrossSiteIframeLinker::NAME, SymbolMapsLinker::NAME];
