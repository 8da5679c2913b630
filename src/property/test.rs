// Tests for module properties
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

use super::*;
use std::collections::BTreeSet;

fn values(vals: &[&str]) -> Vec<String> {
    vals.iter().map(|s| s.to_string()).collect()
}

fn map(pairs: &[(&str, &str)]) -> PropertyMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn catalog_iterates_by_name() {
    let mut catalog = PropertyCatalog::new();

    catalog
        .add_selection(SelectionProperty::new("user.agent", values(&["a"]), "{}"))
        .add_selection(SelectionProperty::new("locale", values(&["en"]), "{}"))
        .add_selection(SelectionProperty::new("debug", values(&["on"]), "{}"));

    let names: Vec<_> = catalog.selection().map(|p| p.name()).collect();

    assert_eq!(vec!["debug", "locale", "user.agent"], names);
}

#[test]
fn runtime_excludes_fixed_and_derived() {
    let mut catalog = PropertyCatalog::new();

    catalog
        .add_selection(SelectionProperty::new("a", values(&["x"]), "{}"))
        .add_selection(
            SelectionProperty::new("b", values(&["x", "y"]), "{}")
                .with_fixed("y"),
        )
        .add_selection(
            SelectionProperty::new("c", values(&["x"]), "{}")
                .with_derived(true),
        );

    let names: Vec<_> = catalog.runtime().map(|p| p.name()).collect();

    assert_eq!(vec!["a"], names);
    assert_eq!(Some("y"), catalog.get_selection("b").unwrap().fixed());
}

#[test]
fn selection_values_are_an_ordered_set() {
    let prop =
        SelectionProperty::new("p", values(&["b", "a", "b", "c", "a"]), "{}");

    assert_eq!(&values(&["b", "a", "c"])[..], prop.values());
}

#[test]
fn configuration_lookups() {
    let mut catalog = PropertyCatalog::new();

    catalog
        .add_configuration(ConfigurationProperty::new(
            "installCode",
            values(&["FALSE"]),
        ))
        .add_configuration(ConfigurationProperty::new(
            "chunk",
            values(&[" 40 "]),
        ))
        .add_configuration(ConfigurationProperty::new(
            "bogus",
            values(&["maybe"]),
        ))
        .add_configuration(ConfigurationProperty::new("empty", vec![]));

    assert!(!catalog.bool_config("installCode", true));
    assert!(catalog.bool_config("bogus", true));
    assert!(catalog.bool_config("missing", true));
    assert_eq!(40, catalog.int_config("chunk", -1));
    assert_eq!(-1, catalog.int_config("bogus", -1));
    assert_eq!("dflt", catalog.string_config("empty", "dflt"));
    assert_eq!("maybe", catalog.string_config("bogus", "dflt"));
}

#[test]
fn value_sets_order_by_size_then_values() {
    let sets: BTreeSet<PropertyValueSet> = vec![
        map(&[("a", "z"), ("b", "a")]),
        map(&[("locale", "fr")]),
        map(&[("locale", "en")]),
        map(&[("a", "a"), ("b", "z")]),
        // Same concatenation ("az") as above; total order still holds.
        map(&[("x", "a"), ("y", "z")]),
    ]
    .into_iter()
    .map(PropertyValueSet::from)
    .collect();

    let ordered: Vec<_> = sets.into_iter().map(|s| s.into_map()).collect();

    assert_eq!(
        vec![
            map(&[("locale", "en")]),
            map(&[("locale", "fr")]),
            map(&[("a", "a"), ("b", "z")]),
            map(&[("x", "a"), ("y", "z")]),
            map(&[("a", "z"), ("b", "a")]),
        ],
        ordered,
    );
}
