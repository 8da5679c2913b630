// Selection and configuration properties
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

//! Properties of a module.
//!
//! A module is compiled once per _permutation_:
//!   one complete assignment of values to its [`SelectionProperty`]s.
//! Some of those properties are resolved at compile time and some are
//!   evaluated in the browser by a _property provider_ to decide which
//!   compiled program to load.
//!
//! [`ConfigurationProperty`]s are not part of permutations at all;
//!   they are knobs read by linkers.
//!
//! Ordering
//! ========
//! The runtime selection code indexes into a multi-dimensional table with
//!   one dimension per runtime property,
//!     so every part of the link must agree on the order of properties.
//! [`PropertyCatalog`] therefore always iterates by property name,
//!   as does [`PropertyMap`].

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Assignment of values to property names.
pub type PropertyMap = BTreeMap<String, String>;

/// A property that distinguishes permutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionProperty {
    name: String,

    /// Possible values,
    ///   in declaration order.
    ///
    /// The position of a value is its index in the runtime answer table.
    values: Vec<String>,

    /// Value resolved at compile time,
    ///   if any.
    fixed: Option<String>,

    /// Whether the value is computed from other properties.
    derived: bool,

    /// JavaScript function body producing the runtime value.
    provider: String,
}

impl SelectionProperty {
    /// A property evaluated at runtime by `provider`.
    pub fn new<S: Into<String>>(
        name: S,
        values: Vec<String>,
        provider: S,
    ) -> Self {
        let mut dedup = Vec::with_capacity(values.len());

        for value in values {
            if !dedup.contains(&value) {
                dedup.push(value);
            }
        }

        Self {
            name: name.into(),
            values: dedup,
            fixed: None,
            derived: false,
            provider: provider.into(),
        }
    }

    /// Resolve this property at compile time.
    pub fn with_fixed<S: Into<String>>(mut self, value: S) -> Self {
        self.fixed = Some(value.into());
        self
    }

    /// Mark this property as derived from other properties.
    pub fn with_derived(mut self, derived: bool) -> Self {
        self.derived = derived;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn fixed(&self) -> Option<&str> {
        self.fixed.as_deref()
    }

    pub fn is_derived(&self) -> bool {
        self.derived
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Whether the browser must evaluate this property to select a
    ///   permutation.
    pub fn is_runtime(&self) -> bool {
        self.fixed.is_none() && !self.derived
    }
}

/// A linker configuration knob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationProperty {
    name: String,
    values: Vec<String>,
}

impl ConfigurationProperty {
    pub fn new<S: Into<String>>(name: S, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// The first value,
    ///   which is the value for single-valued properties.
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// All properties known to a module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyCatalog {
    selection: BTreeMap<String, SelectionProperty>,
    configuration: BTreeMap<String, ConfigurationProperty>,
}

impl PropertyCatalog {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a selection property,
    ///   replacing any of the same name.
    pub fn add_selection(&mut self, prop: SelectionProperty) -> &mut Self {
        self.selection.insert(prop.name.clone(), prop);
        self
    }

    /// Add a configuration property,
    ///   replacing any of the same name.
    pub fn add_configuration(
        &mut self,
        prop: ConfigurationProperty,
    ) -> &mut Self {
        self.configuration.insert(prop.name.clone(), prop);
        self
    }

    /// Selection properties ordered by name.
    pub fn selection(&self) -> impl Iterator<Item = &SelectionProperty> {
        self.selection.values()
    }

    /// Selection properties that must be evaluated at runtime,
    ///   ordered by name.
    pub fn runtime(&self) -> impl Iterator<Item = &SelectionProperty> {
        self.selection().filter(|p| p.is_runtime())
    }

    pub fn get_selection(&self, name: &str) -> Option<&SelectionProperty> {
        self.selection.get(name)
    }

    /// Configuration properties ordered by name.
    pub fn configuration(
        &self,
    ) -> impl Iterator<Item = &ConfigurationProperty> {
        self.configuration.values()
    }

    pub fn get_configuration(
        &self,
        name: &str,
    ) -> Option<&ConfigurationProperty> {
        self.configuration.get(name)
    }

    /// Single value of a configuration property,
    ///   or `default` if it is not set.
    pub fn string_config<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get_configuration(name)
            .and_then(ConfigurationProperty::value)
            .unwrap_or(default)
    }

    /// Boolean configuration property.
    ///
    /// Values other than `true` or `false` (case-insensitive) are treated
    ///   as if the property were not set.
    pub fn bool_config(&self, name: &str, default: bool) -> bool {
        match self.get_configuration(name).and_then(|p| p.value()) {
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    /// Integer configuration property.
    ///
    /// Unparseable values are treated as if the property were not set.
    pub fn int_config(&self, name: &str, default: i64) -> i64 {
        self.get_configuration(name)
            .and_then(|p| p.value())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}

/// A complete property assignment that produced a compiled program.
///
/// Ordered first by the number of properties,
///   then by the concatenation of values (in name order),
///   and finally by the full assignment to keep the order total.
/// This makes the enumeration of permutations reproducible between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValueSet(PropertyMap);

impl PropertyValueSet {
    pub fn as_map(&self) -> &PropertyMap {
        &self.0
    }

    pub fn into_map(self) -> PropertyMap {
        self.0
    }

    fn concat_values(&self) -> String {
        self.0.values().map(String::as_str).collect()
    }
}

impl From<PropertyMap> for PropertyValueSet {
    fn from(map: PropertyMap) -> Self {
        Self(map)
    }
}

impl Ord for PropertyValueSet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.concat_values().cmp(&other.concat_values()))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for PropertyValueSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod test;
