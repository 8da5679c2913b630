// Compiled permutations
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

//! Compiled permutations and the selection of them.
//!
//! The compiler produces one [`PermutationResult`] per permutation it
//!   compiles.
//! Different permutations frequently compile to exactly the same
//!   program
//!     (for example,
//!        when a property affects only code that the optimizer removed),
//!   and so the [`PermutationRegistry`] collapses results by
//!   [`StrongName`] into [`CompilationResult`]s,
//!     each of which remembers every property assignment that produced
//!     it.
//!
//! A compilation may further be selected by _soft permutations_:
//!   properties that do not require a separate program,
//!   but that the program reads at runtime to adjust its behavior.
//! A compiled program together with one of its soft permutations is
//!   identified by a [`PermutationKey`].
//!
//! [`SelectionInformation`] records which property values select which
//!   [`PermutationKey`];
//!     linkers emit one record per (property assignment, soft permutation)
//!     pair and later gather them into a [`PermutationsMap`] to generate
//!     the runtime selection logic.

use crate::artifact::ArtifactSet;
use crate::cache::{BlobStore, BlobToken, CacheResult};
use crate::digest::StrongName;
use crate::property::{PropertyMap, PropertyValueSet};
use crate::range::RangeMap;
use fxhash::FxHashMap;
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

mod mapping;

pub use mapping::{MappingEntry, MappingError, PropertiesMappingFile};

/// Identity of a compiled program and one of its soft permutations.
///
/// Keys order by strong name and then numerically by soft permutation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermutationKey {
    strong_name: StrongName,
    soft_id: usize,
}

impl PermutationKey {
    pub fn new(strong_name: StrongName, soft_id: usize) -> Self {
        Self {
            strong_name,
            soft_id,
        }
    }

    pub fn strong_name(&self) -> &StrongName {
        &self.strong_name
    }

    pub fn soft_id(&self) -> usize {
        self.soft_id
    }
}

/// Renders as `<strong>` for soft permutation `0`,
///   and `<strong>:<id>` otherwise.
///
/// Selection code predating soft permutations knows only bare strong
///   names,
///     so the first soft permutation of every program keeps that form.
impl Display for PermutationKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.soft_id {
            0 => Display::fmt(&self.strong_name, f),
            id => write!(f, "{}:{}", self.strong_name, id),
        }
    }
}

/// A sub-variant of a compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftPermutation {
    id: usize,
    properties: PropertyMap,
}

impl SoftPermutation {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }
}

/// Output of the compiler for a single permutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermutationResult {
    /// Identifier assigned to the permutation by the compiler.
    pub id: usize,

    /// Program text,
    ///   one entry per code-splitting fragment.
    /// The first fragment is loaded initially;
    ///   the others are loaded on demand.
    pub fragments: Vec<String>,

    /// Statement ranges of each fragment,
    ///   if known.
    pub statement_ranges: Vec<RangeMap>,

    /// Serialized symbol table for debugging.
    pub symbol_map: Option<Vec<u8>>,

    /// Property assignments that compiled to this permutation.
    pub property_maps: Vec<PropertyMap>,

    /// Soft property assignments distinguishing sub-variants.
    pub soft_permutations: Vec<PropertyMap>,
}

impl PermutationResult {
    pub fn new(id: usize, fragments: Vec<String>) -> Self {
        Self {
            id,
            fragments,
            ..Default::default()
        }
    }

    pub fn with_property_map(mut self, map: PropertyMap) -> Self {
        self.property_maps.push(map);
        self
    }

    pub fn with_soft_permutation(mut self, map: PropertyMap) -> Self {
        self.soft_permutations.push(map);
        self
    }

    pub fn with_statement_ranges(mut self, ranges: Vec<RangeMap>) -> Self {
        self.statement_ranges = ranges;
        self
    }

    pub fn with_symbol_map(mut self, symbols: Vec<u8>) -> Self {
        self.symbol_map = Some(symbols);
        self
    }
}

/// A distinct compiled program.
///
/// The program text is held in a [`BlobStore`];
///   this object holds only tokens referencing it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationResult {
    strong_name: StrongName,

    /// Id of the first permutation that produced this program.
    permutation_id: usize,

    fragments: Vec<BlobToken>,
    statement_ranges: Vec<RangeMap>,
    symbol_map: Option<BlobToken>,
    property_maps: BTreeSet<PropertyValueSet>,
    soft_permutations: Vec<SoftPermutation>,
}

impl CompilationResult {
    /// Store the program text of `perm` and describe it.
    fn store(
        store: &dyn BlobStore,
        strong_name: StrongName,
        perm: PermutationResult,
    ) -> CacheResult<Self> {
        let fragments = perm
            .fragments
            .iter()
            .map(|frag| store.put(frag.as_bytes()))
            .collect::<CacheResult<Vec<_>>>()?;

        let symbol_map = match &perm.symbol_map {
            Some(symbols) => Some(store.put(symbols)?),
            None => None,
        };

        let mut result = Self {
            strong_name,
            permutation_id: perm.id,
            fragments,
            statement_ranges: perm.statement_ranges,
            symbol_map,
            property_maps: BTreeSet::new(),
            soft_permutations: Vec::new(),
        };

        result.merge(perm.property_maps, perm.soft_permutations);

        Ok(result)
    }

    /// Record additional property assignments producing this program.
    ///
    /// Soft permutations are identified by their properties;
    ///   new ones receive the next available id.
    /// A program always has at least the soft permutation `0`,
    ///   with no properties if none were provided.
    fn merge(&mut self, maps: Vec<PropertyMap>, softs: Vec<PropertyMap>) {
        self.property_maps
            .extend(maps.into_iter().map(PropertyValueSet::from));

        let softs = if softs.is_empty() {
            vec![PropertyMap::new()]
        } else {
            softs
        };

        for properties in softs {
            if self.soft_permutations.iter().any(|s| s.properties == properties)
            {
                continue;
            }

            self.soft_permutations.push(SoftPermutation {
                id: self.soft_permutations.len(),
                properties,
            });
        }
    }

    pub fn strong_name(&self) -> &StrongName {
        &self.strong_name
    }

    pub fn permutation_id(&self) -> usize {
        self.permutation_id
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Program text of the fragment at `index`.
    ///
    /// Panics if `index` is out of bounds.
    pub fn fragment(
        &self,
        store: &dyn BlobStore,
        index: usize,
    ) -> CacheResult<String> {
        store.get_text(self.fragments[index])
    }

    /// Program text of every fragment.
    pub fn javascript(&self, store: &dyn BlobStore) -> CacheResult<Vec<String>> {
        self.fragments
            .iter()
            .map(|token| store.get_text(*token))
            .collect()
    }

    /// Statement ranges of the fragment at `index`,
    ///   if the compiler provided them.
    pub fn statement_ranges(&self, index: usize) -> Option<&RangeMap> {
        self.statement_ranges.get(index)
    }

    pub fn symbol_map(&self) -> Option<BlobToken> {
        self.symbol_map
    }

    /// Property assignments producing this program,
    ///   in their deterministic order.
    pub fn property_maps(&self) -> impl Iterator<Item = &PropertyMap> {
        self.property_maps.iter().map(PropertyValueSet::as_map)
    }

    pub fn soft_permutations(&self) -> &[SoftPermutation] {
        &self.soft_permutations
    }

    /// Selection records for every property assignment of every soft
    ///   permutation of this program.
    ///
    /// Soft property values take precedence over those of the property
    ///   assignment.
    pub fn selection_information(&self) -> Vec<SelectionInformation> {
        let mut infos = Vec::new();

        for map in self.property_maps() {
            for soft in &self.soft_permutations {
                let mut properties = map.clone();

                properties.extend(
                    soft.properties
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );

                infos.push(SelectionInformation::new(
                    PermutationKey::new(self.strong_name.clone(), soft.id),
                    properties,
                ));
            }
        }

        infos
    }
}

/// Collapses permutation results by strong name.
#[derive(Debug, Default)]
pub struct PermutationRegistry {
    index: FxHashMap<StrongName, usize>,
    results: Vec<CompilationResult>,
}

impl PermutationRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register the output of a permutation.
    ///
    /// If a program with identical text has already been registered,
    ///   that compilation absorbs the property assignments of `perm` and
    ///   is returned;
    ///     nothing new is stored.
    /// Otherwise the program text is put into `store` and a new
    ///   compilation is returned.
    pub fn register(
        &mut self,
        store: &dyn BlobStore,
        perm: PermutationResult,
    ) -> CacheResult<&CompilationResult> {
        let strong_name = StrongName::digest(&perm.fragments);

        let index = match self.index.get(&strong_name) {
            Some(&index) => {
                tracing::debug!(
                    permutation = perm.id,
                    strong_name = %strong_name,
                    "permutation duplicates an existing compilation",
                );

                self.results[index]
                    .merge(perm.property_maps, perm.soft_permutations);
                index
            }
            None => {
                let index = self.results.len();
                let result =
                    CompilationResult::store(store, strong_name.clone(), perm)?;

                self.results.push(result);
                self.index.insert(strong_name, index);
                index
            }
        };

        Ok(&self.results[index])
    }

    pub fn get(&self, strong_name: &StrongName) -> Option<&CompilationResult> {
        self.index.get(strong_name).map(|&i| &self.results[i])
    }

    /// Number of distinct compilations.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Compilations in order of registration.
    pub fn iter(&self) -> impl Iterator<Item = &CompilationResult> {
        self.results.iter()
    }

    pub fn into_results(self) -> Vec<CompilationResult> {
        self.results
    }
}

/// A property assignment selecting a [`PermutationKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionInformation {
    key: PermutationKey,
    properties: PropertyMap,
}

impl SelectionInformation {
    pub fn new(key: PermutationKey, properties: PropertyMap) -> Self {
        Self { key, properties }
    }

    pub fn key(&self) -> &PermutationKey {
        &self.key
    }

    pub fn strong_name(&self) -> &StrongName {
        &self.key.strong_name
    }

    pub fn soft_id(&self) -> usize {
        self.key.soft_id
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }
}

/// Property assignments grouped by the permutation they select.
///
/// Keys iterate in [`PermutationKey`] order;
///   assignments under a key retain the order in which they were
///   encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermutationsMap {
    map: BTreeMap<PermutationKey, Vec<PropertyMap>>,
}

impl PermutationsMap {
    pub fn new() -> Self {
        Default::default()
    }

    /// Gather every [`SelectionInformation`] in `artifacts`.
    pub fn from_artifacts(artifacts: &ArtifactSet) -> Self {
        let mut map = Self::new();

        for info in artifacts.selection_information() {
            map.insert(info.key.clone(), info.properties.clone());
        }

        map
    }

    pub fn insert(&mut self, key: PermutationKey, properties: PropertyMap) {
        self.map.entry(key).or_default().push(properties);
    }

    /// Number of distinct permutation keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PermutationKey> {
        self.map.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, PermutationKey, Vec<PropertyMap>> {
        self.map.iter()
    }

    /// Plain-text form for server-side permutation selection.
    ///
    /// Each property assignment becomes one block:
    ///   the program file name on its own line,
    ///   one `name value` line per property,
    ///   and a blank line.
    ///
    /// ```text
    /// 0123456789ABCDEF0123456789ABCDEF.cache.js
    /// locale en
    /// user.agent safari
    ///
    /// ```
    pub fn serialize(&self) -> String {
        mapping::serialize(self)
    }
}

impl<'a> IntoIterator for &'a PermutationsMap {
    type Item = (&'a PermutationKey, &'a Vec<PropertyMap>);
    type IntoIter = btree_map::Iter<'a, PermutationKey, Vec<PropertyMap>>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

#[cfg(test)]
mod test;
