// Tests for compiled permutations
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
use crate::artifact::Artifact;
use crate::cache::MemoryStore;
use crate::range::Range;

fn map(pairs: &[(&str, &str)]) -> PropertyMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn perm(id: usize, js: &[&str], props: &[(&str, &str)]) -> PermutationResult {
    PermutationResult::new(id, js.iter().map(|s| s.to_string()).collect())
        .with_property_map(map(props))
}

#[test]
fn register_stores_fragments() -> CacheResult<()> {
    let store = MemoryStore::new();
    let mut registry = PermutationRegistry::new();

    let result = registry.register(
        &store,
        perm(3, &["var a;", "var b;"], &[("locale", "en")])
            .with_statement_ranges(vec![RangeMap::new(
                vec![Range::new(0, 6)],
                6,
                0,
            )])
            .with_symbol_map(b"a,A".to_vec()),
    )?;

    assert_eq!(&StrongName::digest(["var a;var b;"]), result.strong_name());
    assert_eq!(3, result.permutation_id());
    assert_eq!(2, result.fragment_count());
    assert_eq!(vec!["var a;", "var b;"], result.javascript(&store)?);
    assert_eq!("var b;", result.fragment(&store, 1)?);
    assert_eq!(1, result.statement_ranges(0).unwrap().len());
    assert_eq!(None, result.statement_ranges(1));
    assert_eq!(
        b"a,A".to_vec(),
        store.get(result.symbol_map().unwrap())?,
    );

    Ok(())
}

// Two permutations compiling to identical text collapse into one
//   compilation that remembers both assignments.
#[test]
fn identical_output_collapses() -> CacheResult<()> {
    let store = MemoryStore::new();
    let mut registry = PermutationRegistry::new();

    let first = registry
        .register(&store, perm(0, &["X"], &[("locale", "fr")]))?
        .strong_name()
        .clone();
    let second = registry
        .register(&store, perm(1, &["X"], &[("locale", "en")]))?
        .strong_name()
        .clone();

    // Registering the same assignment again does not duplicate it.
    registry.register(&store, perm(2, &["X"], &[("locale", "en")]))?;

    assert_eq!(first, second);
    assert_eq!(StrongName::digest(["X"]), first);
    assert_eq!(1, registry.len());

    let result = registry.get(&first).unwrap();

    assert_eq!(0, result.permutation_id());
    assert_eq!(
        vec![&map(&[("locale", "en")]), &map(&[("locale", "fr")])],
        result.property_maps().collect::<Vec<_>>(),
    );

    // Only the first copy of the text was stored.
    assert_eq!(1, result.fragment_count());

    Ok(())
}

#[test]
fn distinct_output_distinct_compilations() -> CacheResult<()> {
    let store = MemoryStore::new();
    let mut registry = PermutationRegistry::new();

    registry.register(&store, perm(0, &["X"], &[("locale", "fr")]))?;
    registry.register(&store, perm(1, &["Y"], &[("locale", "en")]))?;

    assert_eq!(2, registry.len());
    assert_eq!(
        vec![0, 1],
        registry.iter().map(|r| r.permutation_id()).collect::<Vec<_>>(),
    );

    Ok(())
}

#[test]
fn default_soft_permutation() -> CacheResult<()> {
    let store = MemoryStore::new();
    let mut registry = PermutationRegistry::new();

    let result = registry.register(&store, perm(0, &["X"], &[]))?;

    assert_eq!(1, result.soft_permutations().len());
    assert_eq!(0, result.soft_permutations()[0].id());
    assert!(result.soft_permutations()[0].properties().is_empty());

    Ok(())
}

#[test]
fn soft_permutations_continue_ids_on_merge() -> CacheResult<()> {
    let store = MemoryStore::new();
    let mut registry = PermutationRegistry::new();

    registry.register(
        &store,
        perm(0, &["X"], &[("a", "1")])
            .with_soft_permutation(map(&[("ff", "desktop")]))
            .with_soft_permutation(map(&[("ff", "mobile")])),
    )?;

    let result = registry.register(
        &store,
        perm(1, &["X"], &[("a", "2")])
            .with_soft_permutation(map(&[("ff", "mobile")]))
            .with_soft_permutation(map(&[("ff", "tablet")])),
    )?;

    let softs: Vec<_> = result
        .soft_permutations()
        .iter()
        .map(|s| (s.id(), s.properties()["ff"].as_str()))
        .collect();

    assert_eq!(vec![(0, "desktop"), (1, "mobile"), (2, "tablet")], softs);

    Ok(())
}

#[test]
fn selection_information_merges_soft_properties() -> CacheResult<()> {
    let store = MemoryStore::new();
    let mut registry = PermutationRegistry::new();

    let result = registry.register(
        &store,
        perm(0, &["X"], &[("a", "1"), ("ff", "none")])
            .with_soft_permutation(map(&[("ff", "desktop")]))
            .with_soft_permutation(map(&[("ff", "mobile")])),
    )?;

    let name = result.strong_name().clone();
    let infos = result.selection_information();

    assert_eq!(
        vec![
            SelectionInformation::new(
                PermutationKey::new(name.clone(), 0),
                map(&[("a", "1"), ("ff", "desktop")]),
            ),
            SelectionInformation::new(
                PermutationKey::new(name, 1),
                map(&[("a", "1"), ("ff", "mobile")]),
            ),
        ],
        infos,
    );

    Ok(())
}

#[test]
fn permutation_key_display_omits_soft_zero() {
    let name = StrongName::digest(["X"]);

    assert_eq!(
        name.to_string(),
        PermutationKey::new(name.clone(), 0).to_string()
    );
    assert_eq!(
        format!("{}:3", name),
        PermutationKey::new(name, 3).to_string()
    );
}

#[test]
fn permutation_key_total_order() {
    let a = StrongName::digest(["a"]);
    let b = StrongName::digest(["b"]);
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };

    let mut keys = vec![
        PermutationKey::new(hi.clone(), 0),
        PermutationKey::new(lo.clone(), 10),
        PermutationKey::new(lo.clone(), 2),
    ];

    keys.sort();

    assert_eq!(
        vec![
            PermutationKey::new(lo.clone(), 2),
            PermutationKey::new(lo, 10),
            PermutationKey::new(hi, 0),
        ],
        keys,
    );
}

#[test]
fn permutations_map_groups_by_key() {
    let a = StrongName::digest(["a"]);
    let b = StrongName::digest(["b"]);

    let mut artifacts = ArtifactSet::new();

    for (name, soft, locale) in [
        (&b, 0, "fr"),
        (&a, 1, "en"),
        (&b, 0, "de"),
        (&a, 0, "en"),
    ] {
        artifacts.add(Artifact::SelectionInformation(
            SelectionInformation::new(
                PermutationKey::new(name.clone(), soft),
                map(&[("locale", locale)]),
            ),
        ));
    }

    let perms = PermutationsMap::from_artifacts(&artifacts);

    assert_eq!(3, perms.len());

    let mut expected = vec![
        PermutationKey::new(a.clone(), 0),
        PermutationKey::new(a, 1),
        PermutationKey::new(b.clone(), 0),
    ];
    expected.sort();

    assert_eq!(expected, perms.keys().cloned().collect::<Vec<_>>());

    let under_b: Vec<_> = perms
        .iter()
        .find(|(k, _)| k.strong_name() == &b)
        .map(|(_, maps)| maps.iter().map(|m| m["locale"].as_str()).collect())
        .unwrap();

    // Artifact sets order selection information by property map.
    assert_eq!(vec!["de", "fr"], under_b);
}

#[test]
fn serialize_mapping() {
    let name = StrongName::digest(["X"]);
    let mut perms = PermutationsMap::new();

    perms.insert(
        PermutationKey::new(name.clone(), 0),
        map(&[("locale", "en"), ("user.agent", "safari")]),
    );
    perms.insert(PermutationKey::new(name.clone(), 0), map(&[("locale", "fr")]));

    assert_eq!(
        format!(
            "{n}.cache.js\nlocale en\nuser.agent safari\n\n\
             {n}.cache.js\nlocale fr\n\n",
            n = name,
        ),
        perms.serialize(),
    );
}

#[test]
fn parse_mapping_and_select() -> Result<(), MappingError> {
    let text = "AAAA.cache.js\nlocale en\nuser.agent safari\n\n\
                BBBB.cache.js\nlocale fr\n\n\
                Devmode:devmode.js";

    let file = PropertiesMappingFile::parse(text)?;

    assert_eq!(2, file.entries().len());
    assert_eq!(
        Some("AAAA.cache.js"),
        file.select(&map(&[("locale", "en"), ("user.agent", "safari")])),
    );
    assert_eq!(
        Some("BBBB.cache.js"),
        file.select(&map(&[("locale", "fr"), ("user.agent", "gecko")])),
    );
    assert_eq!(
        None,
        file.select(&map(&[("locale", "en"), ("user.agent", "gecko")])),
    );

    Ok(())
}

#[test]
fn parse_mapping_round_trips_serialization() -> Result<(), MappingError> {
    let name = StrongName::digest(["X"]);
    let mut perms = PermutationsMap::new();

    perms.insert(PermutationKey::new(name.clone(), 0), map(&[("a", "1")]));
    perms.insert(PermutationKey::new(name.clone(), 1), map(&[("a", "2")]));

    let file = PropertiesMappingFile::parse(&perms.serialize())?;

    assert_eq!(
        vec![
            MappingEntry {
                file: format!("{}.cache.js", name),
                properties: map(&[("a", "1")]),
            },
            MappingEntry {
                file: format!("{}.cache.js", name),
                properties: map(&[("a", "2")]),
            },
        ],
        file.entries(),
    );

    Ok(())
}

#[test]
fn parse_mapping_errors() {
    assert_eq!(
        Err(MappingError::OrphanProperty(1)),
        PropertiesMappingFile::parse("locale en\n"),
    );
    assert_eq!(
        Err(MappingError::MalformedProperty(2)),
        PropertiesMappingFile::parse("A.cache.js\nlocale\n"),
    );
}
