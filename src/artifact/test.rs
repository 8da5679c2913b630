// Tests for link artifacts
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
use crate::cache::MemoryStore;
use crate::perm::{PermutationRegistry, PermutationResult};

const LINKER: &str = "test";

fn emitted(path: &str, text: &str) -> EmittedArtifact {
    EmittedArtifact::from_text(LINKER, path, text)
}

fn compilation(js: &str) -> Arc<CompilationResult> {
    let store = MemoryStore::new();
    let mut registry = PermutationRegistry::new();

    registry
        .register(&store, PermutationResult::new(0, vec![js.into()]))
        .map(|result| Arc::new(result.clone()))
        .unwrap()
}

#[test]
fn emitted_defaults_to_public() {
    let sut = emitted("a.js", "A");

    assert_eq!(Visibility::Public, sut.visibility());
    assert!(!sut.is_private());
    assert_eq!(b"A", sut.contents());
    assert_eq!("a.js", sut.partial_path());
    assert_eq!(LINKER, sut.linker());

    let private = sut.with_visibility(Visibility::Private);
    assert!(private.is_private());
}

#[test]
fn add_does_not_replace() {
    let mut sut = ArtifactSet::new();

    assert!(sut.add(emitted("a.js", "first")));
    assert!(!sut.add(emitted("a.js", "second")));

    assert_eq!(1, sut.len());
    assert_eq!(
        vec![b"first".as_slice()],
        sut.emitted().map(|e| e.contents()).collect::<Vec<_>>(),
    );
}

#[test]
fn replace_overwrites() {
    let mut sut = ArtifactSet::new();

    assert!(!sut.replace(emitted("a.js", "first")));
    assert!(sut.replace(emitted("a.js", "second")));

    assert_eq!(1, sut.len());
    assert_eq!(
        vec![b"second".as_slice()],
        sut.emitted().map(|e| e.contents()).collect::<Vec<_>>(),
    );
}

// A linker clones its input and modifies the clone;
//   the input must be unaffected.
#[test]
fn clone_is_copy_on_write() {
    let mut original = ArtifactSet::new();
    original.add(emitted("a.js", "A"));

    let mut copy = original.clone();
    copy.add(emitted("b.js", "B"));
    copy.remove(&ArtifactKey::Emitted("a.js".into()));

    assert_eq!(1, original.len());
    assert!(original.contains(&ArtifactKey::Emitted("a.js".into())));
    assert!(!original.contains(&ArtifactKey::Emitted("b.js".into())));

    assert_eq!(1, copy.len());
    assert!(copy.contains(&ArtifactKey::Emitted("b.js".into())));
}

#[test]
fn remove_missing_is_none() {
    let mut sut = ArtifactSet::new();

    assert_eq!(None, sut.remove(&ArtifactKey::Emitted("nope".into())));
}

#[test]
fn add_all_keeps_existing() {
    let mut sut = ArtifactSet::new();
    sut.add(emitted("a.js", "mine"));

    let other: ArtifactSet = [
        Artifact::from(emitted("a.js", "theirs")),
        Artifact::from(emitted("b.js", "B")),
    ]
    .into_iter()
    .collect();

    sut.add_all(&other);

    assert_eq!(2, sut.len());
    assert_eq!(
        vec![("a.js", b"mine".as_slice()), ("b.js", b"B".as_slice())],
        sut.emitted()
            .map(|e| (e.partial_path(), e.contents()))
            .collect::<Vec<_>>(),
    );
}

#[test]
fn add_all_into_empty_shares() {
    let mut sut = ArtifactSet::new();
    let other: ArtifactSet =
        [Artifact::from(emitted("a.js", "A"))].into_iter().collect();

    sut.add_all(&other);

    assert_eq!(other, sut);
}

#[test]
fn resources_iterate_in_declaration_order() {
    let mut sut = ArtifactSet::new();

    sut.add(Artifact::Stylesheet(ResourceReference::new(1, "a.css")));
    sut.add(Artifact::Script(ResourceReference::new(0, "z.js")));
    sut.add(Artifact::Stylesheet(ResourceReference::new(0, "z.css")));
    sut.add(Artifact::Script(ResourceReference::new(1, "a.js")));

    assert_eq!(
        vec!["z.css", "a.css"],
        sut.stylesheets().map(|r| r.src()).collect::<Vec<_>>(),
    );
    assert_eq!(
        vec!["z.js", "a.js"],
        sut.scripts().map(|r| r.src()).collect::<Vec<_>>(),
    );
}

#[test]
fn typed_iterators_filter_by_kind() {
    let comp = compilation("X");
    let name = comp.strong_name().clone();

    let mut sut = ArtifactSet::new();
    sut.add(emitted("a.js", "A"));
    sut.add(Arc::clone(&comp));
    sut.add(SelectionInformation::new(
        PermutationKey::new(name.clone(), 0),
        PropertyMap::new(),
    ));
    sut.add(PropertiesMapping::new(LINKER, PermutationsMap::new()));

    assert_eq!(4, sut.len());
    assert_eq!(1, sut.emitted().count());
    assert_eq!(1, sut.selection_information().count());
    assert_eq!(1, sut.properties_mappings().count());
    assert_eq!(
        vec![&name],
        sut.compilations()
            .map(|c| c.strong_name())
            .collect::<Vec<_>>(),
    );

    // The same compilation is only ever present once.
    assert!(!sut.add(comp));
}

#[test]
fn emission_record_marks_compilation_emitted() {
    let comp = compilation("X");
    let name = comp.strong_name().clone();

    let mut sut = ArtifactSet::new();
    sut.add(Arc::clone(&comp));
    assert!(!sut.is_emitted(&name));

    sut.add(EmittedCompilation::new(name.clone(), "X.cache.js", b"[X]"));
    assert!(sut.is_emitted(&name));

    let record = sut.emitted_compilations().next().unwrap();
    assert_eq!("X.cache.js", record.partial_path());
    assert_eq!(&StrongName::digest(["[X]"]), record.digest());

    // Not an emitted file itself.
    assert_eq!(0, sut.emitted().count());
}

#[test]
fn key_display() {
    assert_eq!(
        "emitted file `a/b.js`",
        ArtifactKey::Emitted("a/b.js".into()).to_string(),
    );
    assert_eq!(
        "properties mapping of linker `xsiframe`",
        ArtifactKey::PropertiesMapping("xsiframe").to_string(),
    );
}
