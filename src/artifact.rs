// Link artifacts
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

//! Artifacts flowing through the linker stack.
//!
//! Everything a [`Linker`](crate::ld::Linker) consumes or produces is an
//!   [`Artifact`]:
//!     compiled programs,
//!     records of which property values select which program,
//!     references to external resources,
//!     records of where each compiled program was emitted
//!       ([`EmittedCompilation`]),
//!     and the files that will ultimately be written
//!       ([`EmittedArtifact`]).
//!
//! An [`ArtifactSet`] holds at most one artifact per [`ArtifactKey`].
//! Sets are copy-on-write:
//!   cloning is cheap,
//!   and the underlying collection is copied only when a shared set is
//!     modified.
//! A linker receives a shared reference to its input set,
//!   which it cannot modify,
//!   and returns a complete replacement set;
//!     the usual pattern is to clone the input and add to the clone.

use crate::digest::StrongName;
use crate::perm::{
    CompilationResult, PermutationKey, PermutationsMap, SelectionInformation,
};
use crate::property::PropertyMap;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::Arc;

/// Where an [`EmittedArtifact`] is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Visibility {
    /// Deployed with the module,
    ///   under the module output directory.
    Public,

    /// Kept for the linker that produced it,
    ///   under that linker's auxiliary directory.
    /// Never deployed.
    Private,

    /// Needed by the server but not served to browsers.
    Deploy,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Public
    }
}

/// A file to be written as part of the link output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedArtifact {
    /// Name of the linker that emitted this artifact.
    linker: &'static str,

    /// Path relative to the output directory implied by
    ///   [`Visibility`],
    ///   using `/` as a separator.
    partial_path: String,

    contents: Arc<[u8]>,
    visibility: Visibility,
}

impl EmittedArtifact {
    pub fn new<P, C>(linker: &'static str, partial_path: P, contents: C) -> Self
    where
        P: Into<String>,
        C: Into<Arc<[u8]>>,
    {
        Self {
            linker,
            partial_path: partial_path.into(),
            contents: contents.into(),
            visibility: Default::default(),
        }
    }

    /// An artifact whose contents are the UTF-8 encoding of `text`.
    pub fn from_text<P: Into<String>>(
        linker: &'static str,
        partial_path: P,
        text: &str,
    ) -> Self {
        Self::new(linker, partial_path, text.as_bytes())
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn linker(&self) -> &'static str {
        self.linker
    }

    pub fn partial_path(&self) -> &str {
        &self.partial_path
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }
}

/// Where the initial fragment of a compiled program was emitted.
///
/// A compilation with this record has been emitted and is not emitted
///   again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedCompilation {
    strong_name: StrongName,
    partial_path: String,

    /// Digest of the file exactly as emitted,
    ///   including the module prefix and suffix.
    digest: StrongName,
}

impl EmittedCompilation {
    /// Record `contents` as emitted at `partial_path` for the program
    ///   `strong_name`.
    pub fn new<P: Into<String>>(
        strong_name: StrongName,
        partial_path: P,
        contents: &[u8],
    ) -> Self {
        Self {
            strong_name,
            partial_path: partial_path.into(),
            digest: StrongName::digest([contents]),
        }
    }

    pub fn strong_name(&self) -> &StrongName {
        &self.strong_name
    }

    pub fn partial_path(&self) -> &str {
        &self.partial_path
    }

    pub fn digest(&self) -> &StrongName {
        &self.digest
    }
}

/// An external stylesheet or script to be loaded by the selection script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    /// Position in module declaration order.
    priority: usize,
    src: String,
}

impl ResourceReference {
    pub fn new<S: Into<String>>(priority: usize, src: S) -> Self {
        Self {
            priority,
            src: src.into(),
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }
}

/// The complete mapping from permutations to property values,
///   as recorded by a linker for consumers outside of the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertiesMapping {
    linker: &'static str,
    map: PermutationsMap,
}

impl PropertiesMapping {
    pub fn new(linker: &'static str, map: PermutationsMap) -> Self {
        Self { linker, map }
    }

    pub fn map(&self) -> &PermutationsMap {
        &self.map
    }

    /// Plain-text form of the mapping.
    ///
    /// See [`PermutationsMap::serialize`].
    pub fn serialize(&self) -> String {
        self.map.serialize()
    }
}

/// Anything produced or consumed by a linker.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Emitted(EmittedArtifact),
    Compilation(Arc<CompilationResult>),
    EmittedCompilation(EmittedCompilation),
    SelectionInformation(SelectionInformation),
    Stylesheet(ResourceReference),
    Script(ResourceReference),
    PropertiesMapping(PropertiesMapping),
}

impl Artifact {
    /// Identity of this artifact within an [`ArtifactSet`].
    pub fn key(&self) -> ArtifactKey {
        match self {
            Self::Emitted(a) => ArtifactKey::Emitted(a.partial_path.clone()),
            Self::Compilation(c) => {
                ArtifactKey::Compilation(c.strong_name().clone())
            }
            Self::EmittedCompilation(e) => {
                ArtifactKey::EmittedCompilation(e.strong_name.clone())
            }
            Self::SelectionInformation(si) => ArtifactKey::SelectionInformation(
                si.key().clone(),
                si.properties().clone(),
            ),
            Self::Stylesheet(r) => {
                ArtifactKey::Stylesheet(r.priority, r.src.clone())
            }
            Self::Script(r) => ArtifactKey::Script(r.priority, r.src.clone()),
            Self::PropertiesMapping(m) => {
                ArtifactKey::PropertiesMapping(m.linker)
            }
        }
    }
}

impl From<EmittedArtifact> for Artifact {
    fn from(a: EmittedArtifact) -> Self {
        Self::Emitted(a)
    }
}

impl From<Arc<CompilationResult>> for Artifact {
    fn from(c: Arc<CompilationResult>) -> Self {
        Self::Compilation(c)
    }
}

impl From<EmittedCompilation> for Artifact {
    fn from(e: EmittedCompilation) -> Self {
        Self::EmittedCompilation(e)
    }
}

impl From<SelectionInformation> for Artifact {
    fn from(si: SelectionInformation) -> Self {
        Self::SelectionInformation(si)
    }
}

impl From<PropertiesMapping> for Artifact {
    fn from(m: PropertiesMapping) -> Self {
        Self::PropertiesMapping(m)
    }
}

/// Identity of an [`Artifact`].
///
/// The order of keys is the iteration order of an [`ArtifactSet`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArtifactKey {
    Compilation(StrongName),
    EmittedCompilation(StrongName),
    SelectionInformation(PermutationKey, PropertyMap),
    Stylesheet(usize, String),
    Script(usize, String),
    PropertiesMapping(&'static str),
    Emitted(String),
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Compilation(name) => write!(f, "compilation {}", name),
            Self::EmittedCompilation(name) => {
                write!(f, "emission of compilation {}", name)
            }
            Self::SelectionInformation(key, _) => {
                write!(f, "selection information for {}", key)
            }
            Self::Stylesheet(_, src) => write!(f, "stylesheet `{}`", src),
            Self::Script(_, src) => write!(f, "script `{}`", src),
            Self::PropertiesMapping(linker) => {
                write!(f, "properties mapping of linker `{}`", linker)
            }
            Self::Emitted(path) => write!(f, "emitted file `{}`", path),
        }
    }
}

/// Copy-on-write collection of [`Artifact`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactSet {
    artifacts: Arc<BTreeMap<ArtifactKey, Artifact>>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add an artifact unless one with the same key is already present.
    ///
    /// Returns whether the artifact was added.
    pub fn add<A: Into<Artifact>>(&mut self, artifact: A) -> bool {
        let artifact = artifact.into();
        let key = artifact.key();

        if self.artifacts.contains_key(&key) {
            return false;
        }

        Arc::make_mut(&mut self.artifacts).insert(key, artifact);
        true
    }

    /// Add an artifact,
    ///   replacing any with the same key.
    ///
    /// Returns whether an artifact was replaced.
    pub fn replace<A: Into<Artifact>>(&mut self, artifact: A) -> bool {
        let artifact = artifact.into();

        Arc::make_mut(&mut self.artifacts)
            .insert(artifact.key(), artifact)
            .is_some()
    }

    /// Add every artifact of `other` not already present in this set.
    pub fn add_all(&mut self, other: &ArtifactSet) {
        if self.is_empty() {
            self.artifacts = Arc::clone(&other.artifacts);
            return;
        }

        for artifact in other.iter() {
            self.add(artifact.clone());
        }
    }

    pub fn remove(&mut self, key: &ArtifactKey) -> Option<Artifact> {
        if !self.artifacts.contains_key(key) {
            return None;
        }

        Arc::make_mut(&mut self.artifacts).remove(key)
    }

    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.artifacts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// All artifacts in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn emitted(&self) -> impl Iterator<Item = &EmittedArtifact> {
        self.iter().filter_map(|a| match a {
            Artifact::Emitted(e) => Some(e),
            _ => None,
        })
    }

    /// Compilation results ordered by strong name.
    pub fn compilations(
        &self,
    ) -> impl Iterator<Item = &Arc<CompilationResult>> {
        self.iter().filter_map(|a| match a {
            Artifact::Compilation(c) => Some(c),
            _ => None,
        })
    }

    /// Emission records ordered by strong name.
    pub fn emitted_compilations(
        &self,
    ) -> impl Iterator<Item = &EmittedCompilation> {
        self.iter().filter_map(|a| match a {
            Artifact::EmittedCompilation(e) => Some(e),
            _ => None,
        })
    }

    /// Whether the program `strong_name` has already been emitted.
    pub fn is_emitted(&self, strong_name: &StrongName) -> bool {
        self.contains(&ArtifactKey::EmittedCompilation(strong_name.clone()))
    }

    pub fn selection_information(
        &self,
    ) -> impl Iterator<Item = &SelectionInformation> {
        self.iter().filter_map(|a| match a {
            Artifact::SelectionInformation(si) => Some(si),
            _ => None,
        })
    }

    /// Stylesheets in declaration order.
    pub fn stylesheets(&self) -> impl Iterator<Item = &ResourceReference> {
        self.iter().filter_map(|a| match a {
            Artifact::Stylesheet(r) => Some(r),
            _ => None,
        })
    }

    /// Scripts in declaration order.
    pub fn scripts(&self) -> impl Iterator<Item = &ResourceReference> {
        self.iter().filter_map(|a| match a {
            Artifact::Script(r) => Some(r),
            _ => None,
        })
    }

    pub fn properties_mappings(
        &self,
    ) -> impl Iterator<Item = &PropertiesMapping> {
        self.iter().filter_map(|a| match a {
            Artifact::PropertiesMapping(m) => Some(m),
            _ => None,
        })
    }
}

impl FromIterator<Artifact> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = Artifact>>(iter: I) -> Self {
        let mut set = Self::new();

        for artifact in iter {
            set.add(artifact);
        }

        set
    }
}

#[cfg(test)]
mod test;
